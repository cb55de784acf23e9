//! # DICOM windowing library
//!
//! This crate decodes DICOM Part 10 files, turns their 16-bit samples into
//! display-ready 8-bit images under a window/level model and stacks a
//! directory of slices into a volume.
//!
//! The decoder reads the element stream itself: explicit and implicit VR,
//! little and big endian, and deflated transfer syntaxes are understood.
//! Encapsulated (compressed) pixel data is parsed but not decompressed.
//! Series are decoded in parallel using rayon. A volume can be sliced in the
//! three different medical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//!  Coronal and Sagittal slices can be bilinearly resampled to preserve the
//!  aspect ratio between the images. Slices are assumed to be:
//!   - Single frame, single sample per pixel
//!   - From the same series with identical rows, columns and bit depth
//!
//! Window/level mapping runs on the CPU, or on the GPU through a wgpu compute
//! shader when one is attached to the [`WindowingEngine`] and the image is
//! large enough. Sample buffers can be recycled through a shared
//! [`BufferPool`], which a [`PressureMonitor`] shrinks when the system runs low
//! on memory.
//!
//! # Examples
//!
//! ## Reading a directory into a volume
//!
//! Load every slice from the dicom/ directory, ordered along the slice
//! normal. Then render the center of the volume in the Sagittal axis with a
//! soft tissue window.
//!
//! ```no_run
//! # use dicom_window::{SeriesAssembler, WindowingEngine, MedicalPreset, Orientation, Interpolation};
//! let volume = SeriesAssembler::new()
//!     .load_series("dicom")
//!     .expect("should have loaded files from directory");
//! let image = volume
//!     .get_image_from_axis(
//!         volume.width() / 2,
//!         Orientation::Sagittal,
//!         Interpolation::Bilinear,
//!         WindowingEngine::get_preset_values(MedicalPreset::SoftTissue),
//!         &WindowingEngine::new(),
//!     )
//!     .expect("should have returned image at center of volume");
//! image.save("result.png");
//! ```
//!
//! ## Windowing a single file
//!
//! The window stored in a file is in modality units, so it is mapped back to
//! stored values before being applied to the raw samples. Two's complement
//! samples are reinterpreted as `i16`.
//!
//! ```no_run
//! # use dicom_window::{BackendMode, DatasetDecoder, WindowSettings, WindowingEngine};
//! # use dicom_window::windowing::Sample;
//! fn window_for<S: Sample>(decoder: &DatasetDecoder, pixels: &[S]) -> WindowSettings {
//!     match decoder.window_settings() {
//!         Some(window) => decoder.rescale_parameters().window_to_stored(window),
//!         None => WindowingEngine::calculate_optimal_window_level(pixels),
//!     }
//! }
//!
//! let decoder = DatasetDecoder::open("image.dcm").expect("should have decoded file");
//! let stored = decoder.pixels_16().unwrap().expect("16-bit pixel data");
//! let engine = WindowingEngine::new();
//! let display = if decoder.pixel_representation() == 1 {
//!     let signed: Vec<i16> = stored.iter().map(|&v| v as i16).collect();
//!     engine.apply_window(&signed, window_for(&decoder, &signed), BackendMode::Auto)
//! } else {
//!     engine.apply_window(&stored, window_for(&decoder, &stored), BackendMode::Auto)
//! };
//! ```

pub mod binary_cursor;
pub mod buffer_pool;
pub mod decoder;
pub mod enums;
pub mod error;
pub mod gpu_windowing;
mod interpolator;
pub mod metadata;
pub mod pressure;
pub mod series_assembler;
pub mod volume;
pub mod windowing;

pub use binary_cursor::BinaryCursor;
pub use buffer_pool::{BufferKind, BufferPool, PoolStatistics, Poolable, PooledBuffer};
pub use decoder::{DatasetDecoder, Dataset, Element, LutChannel, TransferSyntax};
pub use enums::{BackendMode, Interpolation, Orientation, Processor, SortBy};
pub use error::DicomError;
pub use gpu_windowing::{GpuWindowBackend, WGPU};
pub use metadata::{PixelSpacing, RescaleParameters, SeriesMetadata, WindowSettings};
pub use pressure::{PressureHandler, PressureLevel, PressureMonitor, PressureSignal, PsiConfig};
pub use series_assembler::{SeriesAssembler, SeriesEvent, SeriesOptions, SeriesProgress};
pub use volume::Volume;
pub use windowing::{CpuBackend, MedicalPreset, QualityMetrics, WindowBackend, WindowingEngine};
