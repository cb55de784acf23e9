use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::metadata::{PixelSpacing, RescaleParameters, SeriesMetadata, WindowSettings};
use crate::windowing::WindowingEngine;

use image::ImageBuffer;
use image::Luma;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;

/// Row direction, column direction and slice normal, one per row.
pub type OrientationMatrix = [[f64; 3]; 3];

pub const IDENTITY_ORIENTATION: OrientationMatrix =
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// A stack of slices in stored sample units, indexed (depth, height, width).
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    data: Array3<i16>,
    spacing: PixelSpacing,
    orientation: OrientationMatrix,
    origin: [f64; 3],
    rescale: RescaleParameters,
    metadata: SeriesMetadata,
    interpolated_dim: (usize, usize, usize),
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Array3::zeros((0, 0, 0)), PixelSpacing::default())
    }
}

impl Volume {
    pub fn new(data: Array3<i16>, spacing: PixelSpacing) -> Self {
        let original_dim = data.dim();
        Self {
            data,
            spacing,
            orientation: IDENTITY_ORIENTATION,
            origin: [0.0; 3],
            rescale: RescaleParameters::IDENTITY,
            metadata: SeriesMetadata::default(),
            interpolated_dim: Interpolator::get_isotropic_dimensions(spacing, original_dim),
        }
    }

    pub fn with_orientation(mut self, orientation: OrientationMatrix) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_rescale(mut self, rescale: RescaleParameters) -> Self {
        self.rescale = rescale;
        self
    }

    pub fn with_metadata(mut self, metadata: SeriesMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn depth(&self) -> usize {
        self.data.dim().0
    }

    pub fn spacing(&self) -> PixelSpacing {
        self.spacing
    }

    pub fn orientation(&self) -> &OrientationMatrix {
        &self.orientation
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn rescale(&self) -> RescaleParameters {
        self.rescale
    }

    pub fn metadata(&self) -> &SeriesMetadata {
        &self.metadata
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<i16> {
        &mut self.data
    }

    /// All voxels, slice after slice, row-major within a slice.
    pub fn voxels(&self) -> &[i16] {
        // Volumes are always built in standard layout.
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Option<i16> {
        self.data.get((z, y, x)).copied()
    }

    /// Patient coordinates in millimeters of a voxel center.
    pub fn voxel_to_world(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        let [row, column, normal] = self.orientation;
        let (dx, dy, dz) = (x * self.spacing.x, y * self.spacing.y, z * self.spacing.z);
        std::array::from_fn(|i| self.origin[i] + row[i] * dx + column[i] * dy + normal[i] * dz)
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, i16>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    fn get_output_dimensions(&self, orientation: &Orientation) -> (usize, usize) {
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => (self.interpolated_dim.2, self.interpolated_dim.1),
            Orientation::Coronal => (self.interpolated_dim.2, self.interpolated_dim.0),
            Orientation::Sagittal => (self.interpolated_dim.1, self.interpolated_dim.0),
        }
    }

    /// Render one slice through `window`, given in modality units (after
    /// rescale). Coronal and sagittal slices are resampled to square pixels
    /// when `interpolation` is [`Interpolation::Bilinear`].
    ///
    /// Returns `None` for an out-of-range index or an invalid window.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: Interpolation,
        window: WindowSettings,
        engine: &WindowingEngine,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, &orientation)?;
        let stored_window = self.rescale.window_to_stored(window);
        if !stored_window.is_valid() {
            return None;
        }

        let (height, width) = slice.dim();
        let (width, height, samples) = match interpolation {
            // Axial doesn't need interpolation (already isotropic in-plane)
            Interpolation::Bilinear if !matches!(orientation, Orientation::Axial) => {
                let (width, height) = self.get_output_dimensions(&orientation);
                (width, height, Interpolator::resample(&slice, width, height))
            }
            _ => (width, height, slice.iter().copied().collect::<Vec<_>>()),
        };

        let pixel_data = engine.apply_window(&samples, stored_window, engine.backend_mode());
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}
