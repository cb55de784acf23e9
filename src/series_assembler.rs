//! Assemble a directory of single-frame files into one [`Volume`].

use std::{
    cmp::Ordering,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::channel::mpsc;
use rayon::prelude::*;
use tracing::{debug, info};
use web_time::Instant;

use crate::{
    buffer_pool::{BufferPool, Poolable},
    decoder::DatasetDecoder,
    enums::SortBy,
    error::DicomError,
    metadata::SeriesMetadata,
    volume::{IDENTITY_ORIENTATION, OrientationMatrix, Volume},
};

/// Builds a decoder for one file. Swappable for tests.
pub type DecoderFactory =
    Arc<dyn Fn(&Path) -> Result<DatasetDecoder, DicomError> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct SeriesOptions {
    pub sort_by: SortBy,
    /// Accept 8-bit slices next to the default 16-bit ones.
    pub allow_8bit: bool,
    /// Lowercase extensions to pick up. Files without an extension are
    /// always candidates.
    pub extensions: Vec<String>,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            allow_8bit: false,
            extensions: vec!["dcm".to_string(), "dicom".to_string()],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesProgress {
    pub slices_copied: usize,
    pub total_slices: usize,
    pub fraction_complete: f64,
}

#[derive(Debug)]
pub enum SeriesEvent {
    Progress(SeriesProgress),
    Finished(Volume),
}

#[derive(Clone)]
pub struct SeriesAssembler {
    factory: DecoderFactory,
    pool: Option<Arc<BufferPool>>,
    options: SeriesOptions,
}

impl fmt::Debug for SeriesAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesAssembler")
            .field("pool", &self.pool)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for SeriesAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Row, column and normal directions of a slice.
fn orientation_matrix(decoder: &DatasetDecoder) -> OrientationMatrix {
    match decoder.image_orientation() {
        Some([r0, r1, r2, c0, c1, c2]) => {
            let row = [r0, r1, r2];
            let column = [c0, c1, c2];
            [row, column, cross(row, column)]
        }
        None => IDENTITY_ORIENTATION,
    }
}

struct Slice {
    path: PathBuf,
    decoder: DatasetDecoder,
}

impl SeriesAssembler {
    pub fn new() -> Self {
        Self {
            factory: Arc::new(|path: &Path| DatasetDecoder::open(path)),
            pool: None,
            options: SeriesOptions::default(),
        }
    }

    /// Decode files with `factory` instead of [`DatasetDecoder::open`].
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Path) -> Result<DatasetDecoder, DicomError> + Send + Sync + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    /// Draw slice pixel buffers from `pool` and return them after copying.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_options(mut self, options: SeriesOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    /// Files in `directory` that look like slices, sorted by file name.
    /// Hidden files and `DICOMDIR` are skipped.
    pub fn candidate_files(&self, directory: impl AsRef<Path>) -> Result<Vec<PathBuf>, DicomError> {
        let directory = directory.as_ref();
        let mut paths: Vec<_> = fs::read_dir(directory)
            .map_err(|err| DicomError::from_io(err, directory))?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .map(|entry| entry.path())
            .filter(|path| self.is_candidate(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        if name.starts_with('.') || name.eq_ignore_ascii_case("DICOMDIR") {
            return false;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            None => true,
            Some(ext) => self
                .options
                .extensions
                .iter()
                .any(|wanted| ext.eq_ignore_ascii_case(wanted)),
        }
    }

    /// Load every slice of `directory` into one volume.
    pub fn load_series(&self, directory: impl AsRef<Path>) -> Result<Volume, DicomError> {
        self.load_series_with_progress(directory, |_| {})
    }

    /// [`load_series`](Self::load_series), reporting each copied slice.
    pub fn load_series_with_progress(
        &self,
        directory: impl AsRef<Path>,
        progress: impl FnMut(SeriesProgress),
    ) -> Result<Volume, DicomError> {
        let paths = self.candidate_files(directory)?;
        self.assemble(&paths, progress)
    }

    /// Load a volume from an explicit list of files.
    pub fn load_from_file_paths(&self, paths: &[impl AsRef<Path>]) -> Result<Volume, DicomError> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        self.assemble(&paths, |_| {})
    }

    /// [`load_series`](Self::load_series) on tokio's blocking pool.
    pub async fn load_series_async(
        &self,
        directory: impl AsRef<Path>,
    ) -> Result<Volume, DicomError> {
        let assembler = self.clone();
        let directory = directory.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || assembler.load_series(directory)).await?
    }

    /// Load on tokio's blocking pool, streaming progress events followed by
    /// either [`SeriesEvent::Finished`] or one error. Must be called from
    /// within a tokio runtime.
    pub fn load_series_stream(
        &self,
        directory: impl AsRef<Path>,
    ) -> mpsc::UnboundedReceiver<Result<SeriesEvent, DicomError>> {
        let (sender, receiver) = mpsc::unbounded();
        let assembler = self.clone();
        let directory = directory.as_ref().to_path_buf();

        let worker_sender = sender.clone();
        let task = tokio::task::spawn_blocking(move || {
            let result = assembler.load_series_with_progress(&directory, |progress| {
                let _ = worker_sender.unbounded_send(Ok(SeriesEvent::Progress(progress)));
            });
            let _ = worker_sender.unbounded_send(result.map(SeriesEvent::Finished));
        });
        tokio::spawn(async move {
            if let Err(err) = task.await {
                let _ = sender.unbounded_send(Err(err.into()));
            }
        });
        receiver
    }

    fn decode_all(&self, paths: &[PathBuf]) -> Result<Vec<Slice>, DicomError> {
        paths
            .par_iter()
            .map(|path| -> Result<Slice, DicomError> {
                let decoder = (self.factory)(path.as_path())?;
                let decoder = match &self.pool {
                    Some(pool) => decoder.with_pool(pool.clone()),
                    None => decoder,
                };
                Ok(Slice {
                    path: path.clone(),
                    decoder,
                })
            })
            .collect()
    }

    fn validate(&self, slices: &[Slice]) -> Result<(usize, usize, u16), DicomError> {
        let first = &slices[0].decoder;
        let bits = first.bits_allocated().unwrap_or(0);
        match bits {
            16 => {}
            8 if self.options.allow_8bit => {}
            _ => return Err(DicomError::UnsupportedBitDepth(bits)),
        }
        let (rows, columns) = match (first.rows(), first.columns()) {
            (Some(rows), Some(columns)) if rows > 0 && columns > 0 => (rows, columns),
            _ => {
                return Err(DicomError::InvalidPixelData(format!(
                    "{} has no image dimensions",
                    slices[0].path.display()
                )));
            }
        };

        for slice in slices {
            let decoder = &slice.decoder;
            if decoder.samples_per_pixel() != 1 {
                return Err(DicomError::InvalidPixelData(format!(
                    "{} has {} samples per pixel, only single-sample slices can be stacked",
                    slice.path.display(),
                    decoder.samples_per_pixel()
                )));
            }
            if decoder.rows() != Some(rows)
                || decoder.columns() != Some(columns)
                || decoder.bits_allocated() != Some(bits)
            {
                debug!(path = %slice.path.display(), "slice does not match the first slice");
                return Err(DicomError::InconsistentDimensions);
            }
        }
        Ok((rows, columns, bits))
    }

    /// Put slices in order, falling back along position, instance number and
    /// file name until a key is present on every slice.
    fn sort(&self, mut slices: Vec<Slice>) -> Vec<Slice> {
        let normal = orientation_matrix(&slices[0].decoder)[2];
        let mut sort_by = self.options.sort_by;
        loop {
            match sort_by {
                SortBy::ImagePositionPatient => {
                    let keys: Option<Vec<f64>> = slices
                        .iter()
                        .map(|s| s.decoder.image_position().map(|p| dot(p, normal)))
                        .collect();
                    if let Some(keys) = keys {
                        return sort_by_keys(slices, keys, f64::total_cmp);
                    }
                    sort_by = SortBy::InstanceNumber;
                }
                SortBy::InstanceNumber => {
                    let keys: Option<Vec<i64>> =
                        slices.iter().map(|s| s.decoder.instance_number()).collect();
                    if let Some(keys) = keys {
                        return sort_by_keys(slices, keys, i64::cmp);
                    }
                    sort_by = SortBy::FileName;
                }
                SortBy::FileName => {
                    slices.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
                    return slices;
                }
            }
            debug!(?sort_by, "sort key missing on some slices, falling back");
        }
    }

    fn assemble(
        &self,
        paths: &[PathBuf],
        mut progress: impl FnMut(SeriesProgress),
    ) -> Result<Volume, DicomError> {
        if paths.is_empty() {
            return Err(DicomError::NoDicomFiles);
        }
        let start = Instant::now();

        let slices = self.decode_all(paths)?;
        let (rows, columns, bits) = self.validate(&slices)?;
        let slices = self.sort(slices);

        let first = &slices[0].decoder;
        let spacing = first.pixel_spacing();
        let orientation = orientation_matrix(first);
        let origin = first.image_position().unwrap_or([0.0; 3]);
        let rescale = first.rescale_parameters();
        let metadata = SeriesMetadata {
            modality: first.modality(),
            body_part: first.body_part(),
            window: first.window_settings(),
        };

        let total_slices = slices.len();
        let (frame, total) = rows
            .checked_mul(columns)
            .and_then(|frame| Some((frame, frame.checked_mul(total_slices)?)))
            .ok_or_else(|| {
                DicomError::InvalidPixelData(format!(
                    "{total_slices} slices of {rows}x{columns} are too large to address"
                ))
            })?;
        let mut voxels = vec![0i16; total];
        for (index, (target, slice)) in voxels.chunks_mut(frame).zip(&slices).enumerate() {
            self.copy_slice(slice, bits, target)?;
            progress(SeriesProgress {
                slices_copied: index + 1,
                total_slices,
                fraction_complete: (index + 1) as f64 / total_slices as f64,
            });
        }

        let data = ndarray::Array3::from_shape_vec((total_slices, rows, columns), voxels)
            .map_err(|err| DicomError::Unknown(err.to_string()))?;
        info!(
            slices = total_slices,
            rows,
            columns,
            bits,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "assembled series"
        );
        Ok(Volume::new(data, spacing)
            .with_orientation(orientation)
            .with_origin(origin)
            .with_rescale(rescale)
            .with_metadata(metadata))
    }

    /// Convert one slice into signed voxels. Two's complement samples are
    /// reinterpreted, unsigned ones saturate at `i16::MAX`.
    fn copy_slice(&self, slice: &Slice, bits: u16, target: &mut [i16]) -> Result<(), DicomError> {
        let missing = || {
            DicomError::InvalidPixelData(format!("{} has no pixel data", slice.path.display()))
        };
        if bits == 8 {
            let pixels = slice.decoder.pixels_8()?.ok_or_else(missing)?;
            for (voxel, &v) in target.iter_mut().zip(&pixels) {
                *voxel = v as i16;
            }
            self.recycle(pixels);
            return Ok(());
        }

        let pixels = slice.decoder.pixels_16()?.ok_or_else(missing)?;
        if slice.decoder.pixel_representation() == 1 {
            for (voxel, &v) in target.iter_mut().zip(&pixels) {
                *voxel = v as i16;
            }
        } else {
            for (voxel, &v) in target.iter_mut().zip(&pixels) {
                *voxel = v.min(i16::MAX as u16) as i16;
            }
        }
        self.recycle(pixels);
        Ok(())
    }

    fn recycle<T: Poolable>(&self, buffer: Vec<T>) {
        if let Some(pool) = &self.pool {
            pool.release(buffer);
        }
    }
}

fn sort_by_keys<K>(
    slices: Vec<Slice>,
    keys: Vec<K>,
    compare: impl Fn(&K, &K) -> Ordering,
) -> Vec<Slice> {
    let mut keyed: Vec<(K, Slice)> = keys.into_iter().zip(slices).collect();
    keyed.sort_by(|a, b| compare(&a.0, &b.0));
    keyed.into_iter().map(|(_, slice)| slice).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::tests::{explicit_le, part10};
    use dicom_dictionary_std::tags;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct SliceFixture {
        rows: u16,
        columns: u16,
        bits: u16,
        samples: u16,
        instance: Option<i32>,
        z: Option<f64>,
        value: u16,
    }

    impl SliceFixture {
        fn ct(instance: i32, z: f64, value: u16) -> Self {
            Self {
                rows: 4,
                columns: 3,
                bits: 16,
                samples: 1,
                instance: Some(instance),
                z: Some(z),
                value,
            }
        }
    }

    fn slice_bytes(fixture: &SliceFixture) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend(explicit_le(tags::MODALITY, b"CS", b"CT"));
        if let Some(instance) = fixture.instance {
            body.extend(explicit_le(
                tags::INSTANCE_NUMBER,
                b"IS",
                instance.to_string().as_bytes(),
            ));
        }
        if let Some(z) = fixture.z {
            body.extend(explicit_le(
                tags::IMAGE_POSITION_PATIENT,
                b"DS",
                format!("-100\\-50\\{z}").as_bytes(),
            ));
        }
        body.extend(explicit_le(tags::IMAGE_ORIENTATION_PATIENT, b"DS", b"1\\0\\0\\0\\1\\0"));
        body.extend(explicit_le(tags::SAMPLES_PER_PIXEL, b"US", &fixture.samples.to_le_bytes()));
        body.extend(explicit_le(tags::ROWS, b"US", &fixture.rows.to_le_bytes()));
        body.extend(explicit_le(tags::COLUMNS, b"US", &fixture.columns.to_le_bytes()));
        body.extend(explicit_le(tags::PIXEL_SPACING, b"DS", b"0.8\\0.6"));
        body.extend(explicit_le(tags::SLICE_THICKNESS, b"DS", b"2"));
        body.extend(explicit_le(tags::BITS_ALLOCATED, b"US", &fixture.bits.to_le_bytes()));
        body.extend(explicit_le(tags::PIXEL_REPRESENTATION, b"US", &0u16.to_le_bytes()));
        body.extend(explicit_le(tags::RESCALE_INTERCEPT, b"DS", b"-1024"));
        let count =
            fixture.rows as usize * fixture.columns as usize * fixture.samples as usize;
        let pixels: Vec<u8> = if fixture.bits == 8 {
            vec![fixture.value as u8; count]
        } else {
            std::iter::repeat_n(fixture.value, count)
                .flat_map(u16::to_le_bytes)
                .collect()
        };
        body.extend(explicit_le(
            tags::PIXEL_DATA,
            if fixture.bits == 8 { b"OB" } else { b"OW" },
            &pixels,
        ));
        part10("1.2.840.10008.1.2.1", &body)
    }

    fn write_series(dir: &Path, slices: &[(&str, SliceFixture)]) {
        for (name, fixture) in slices {
            fs::write(dir.join(name), slice_bytes(fixture)).unwrap();
        }
    }

    #[test]
    fn stacks_slices_by_position() {
        let dir = tempfile::tempdir().unwrap();
        write_series(
            dir.path(),
            &[
                ("a.dcm", SliceFixture::ct(1, 10.0, 30)),
                ("b.dcm", SliceFixture::ct(2, -10.0, 10)),
                ("c.dcm", SliceFixture::ct(3, 0.0, 20)),
            ],
        );

        let volume = SeriesAssembler::new().load_series(dir.path()).unwrap();
        assert_eq!(volume.dim(), (3, 4, 3));
        assert_eq!(volume.voxels().len(), 36);
        assert_eq!(volume.voxel(0, 0, 0), Some(10));
        assert_eq!(volume.voxel(2, 3, 1), Some(20));
        assert_eq!(volume.voxel(1, 1, 2), Some(30));
        assert_eq!(volume.origin(), [-100.0, -50.0, -10.0]);
        assert_eq!(volume.orientation()[2], [0.0, 0.0, 1.0]);
        assert_eq!(volume.spacing(), crate::metadata::PixelSpacing::new(0.6, 0.8, 2.0));
        assert_eq!(volume.rescale().intercept, -1024.0);
        assert_eq!(volume.metadata().modality, "CT");
        assert_eq!(volume.metadata().window, None);
    }

    #[test]
    fn falls_back_to_instance_number_then_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut unplaced = SliceFixture::ct(1, 0.0, 30);
        unplaced.z = None;
        write_series(
            dir.path(),
            &[
                ("a.dcm", unplaced),
                ("b.dcm", SliceFixture::ct(0, 50.0, 10)),
            ],
        );
        let volume = SeriesAssembler::new().load_series(dir.path()).unwrap();
        assert_eq!(volume.voxel(0, 0, 0), Some(10));
        assert_eq!(volume.voxel(0, 0, 1), Some(30));

        let dir = tempfile::tempdir().unwrap();
        let mut first = SliceFixture::ct(9, 5.0, 1);
        first.instance = None;
        first.z = None;
        write_series(dir.path(), &[("b", SliceFixture::ct(1, 0.0, 2)), ("a", first)]);
        let volume = SeriesAssembler::new().load_series(dir.path()).unwrap();
        assert_eq!(volume.voxel(0, 0, 0), Some(1));
        assert_eq!(volume.voxel(0, 0, 1), Some(2));
    }

    #[test]
    fn rejects_mismatched_slices() {
        let dir = tempfile::tempdir().unwrap();
        let mut wide = SliceFixture::ct(2, 1.0, 0);
        wide.columns = 4;
        write_series(dir.path(), &[("a.dcm", SliceFixture::ct(1, 0.0, 0)), ("b.dcm", wide)]);
        let err = SeriesAssembler::new().load_series(dir.path()).unwrap_err();
        assert!(matches!(err, DicomError::InconsistentDimensions));
    }

    #[test]
    fn rejects_multi_sample_slices_after_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut color = SliceFixture::ct(2, 1.0, 0);
        color.samples = 3;
        write_series(dir.path(), &[("a.dcm", SliceFixture::ct(1, 0.0, 0)), ("b.dcm", color)]);
        let err = SeriesAssembler::new().load_series(dir.path()).unwrap_err();
        assert!(matches!(err, DicomError::InvalidPixelData(_)));
    }

    #[test]
    fn negative_rows_are_rejected_without_allocating() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dcm"), b"placeholder").unwrap();
        let assembler = SeriesAssembler::new().with_factory(|_| {
            let mut body = Vec::new();
            body.extend(explicit_le(tags::ROWS, b"SS", &(-1i16).to_le_bytes()));
            body.extend(explicit_le(tags::COLUMNS, b"US", &2u16.to_le_bytes()));
            body.extend(explicit_le(tags::BITS_ALLOCATED, b"US", &16u16.to_le_bytes()));
            body.extend(explicit_le(tags::PIXEL_DATA, b"OW", &[0u8; 4]));
            DatasetDecoder::from_bytes(&part10("1.2.840.10008.1.2.1", &body))
        });
        let err = assembler.load_series(dir.path()).unwrap_err();
        assert!(matches!(err, DicomError::InvalidPixelData(_)));
    }

    #[test]
    fn reports_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a slice").unwrap();
        fs::write(dir.path().join(".hidden"), b"").unwrap();
        fs::write(dir.path().join("DICOMDIR"), b"").unwrap();
        let assembler = SeriesAssembler::new();
        assert!(assembler.candidate_files(dir.path()).unwrap().is_empty());
        let err = assembler.load_series(dir.path()).unwrap_err();
        assert!(matches!(err, DicomError::NoDicomFiles));

        let err = assembler.load_series(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, DicomError::FileNotFound(_)));
    }

    #[test]
    fn eight_bit_slices_need_opting_in() {
        let dir = tempfile::tempdir().unwrap();
        let mut fixture = SliceFixture::ct(1, 0.0, 200);
        fixture.bits = 8;
        write_series(dir.path(), &[("a.dcm", fixture)]);

        let err = SeriesAssembler::new().load_series(dir.path()).unwrap_err();
        assert!(matches!(err, DicomError::UnsupportedBitDepth(8)));

        let options = SeriesOptions {
            allow_8bit: true,
            ..SeriesOptions::default()
        };
        let volume = SeriesAssembler::new()
            .with_options(options)
            .load_series(dir.path())
            .unwrap();
        assert_eq!(volume.voxel(0, 0, 0), Some(200));
    }

    #[test]
    fn unsigned_samples_saturate() {
        let dir = tempfile::tempdir().unwrap();
        write_series(dir.path(), &[("a.dcm", SliceFixture::ct(1, 0.0, 40_000))]);
        let volume = SeriesAssembler::new().load_series(dir.path()).unwrap();
        assert_eq!(volume.voxel(0, 0, 0), Some(i16::MAX));
    }

    #[test]
    fn uses_injected_decoder_factory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.dcm", "2.dcm"] {
            fs::write(dir.path().join(name), b"placeholder").unwrap();
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let assembler = SeriesAssembler::new().with_factory(move |path| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            let instance = if path.ends_with("1.dcm") { 2 } else { 1 };
            DatasetDecoder::from_bytes(&slice_bytes(&SliceFixture::ct(instance, 0.0, instance as u16)))
        });
        let volume = assembler.load_series(dir.path()).unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(volume.depth(), 2);

        let failing = SeriesAssembler::new()
            .with_factory(|_| Err(DicomError::InvalidDicomFormat("corrupt".to_string())));
        let err = failing.load_series(dir.path()).unwrap_err();
        assert!(matches!(err, DicomError::InvalidDicomFormat(_)));
    }

    #[test]
    fn progress_is_monotonic_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let slices: Vec<_> = (0..5)
            .map(|i| (format!("{i}.dcm"), SliceFixture::ct(i, i as f64, 0)))
            .collect();
        for (name, fixture) in &slices {
            fs::write(dir.path().join(name), slice_bytes(fixture)).unwrap();
        }

        let mut events = Vec::new();
        SeriesAssembler::new()
            .load_series_with_progress(dir.path(), |progress| events.push(progress))
            .unwrap();
        assert_eq!(events.len(), 5);
        for pair in events.windows(2) {
            assert!(pair[1].fraction_complete > pair[0].fraction_complete);
            assert_eq!(pair[1].slices_copied, pair[0].slices_copied + 1);
        }
        let last = events[4];
        assert_eq!((last.slices_copied, last.total_slices), (5, 5));
        assert_eq!(last.fraction_complete, 1.0);
    }

    #[test]
    fn returns_slice_buffers_to_the_pool() {
        let dir = tempfile::tempdir().unwrap();
        write_series(
            dir.path(),
            &[("a.dcm", SliceFixture::ct(1, 0.0, 1)), ("b.dcm", SliceFixture::ct(2, 1.0, 2))],
        );
        let pool = BufferPool::shared();
        let assembler = SeriesAssembler::new().with_pool(pool.clone());
        assembler.load_series(dir.path()).unwrap();
        assembler.load_series(dir.path()).unwrap();
        let stats = pool.statistics();
        assert_eq!(stats.hits + stats.misses, 4);
        assert!(stats.hits >= 2);
        assert!(stats.pooled >= 1);
    }

    #[tokio::test]
    async fn loads_in_the_background() {
        let dir = tempfile::tempdir().unwrap();
        write_series(dir.path(), &[("a.dcm", SliceFixture::ct(1, 0.0, 5))]);
        let volume = SeriesAssembler::new()
            .load_series_async(dir.path())
            .await
            .unwrap();
        assert_eq!(volume.depth(), 1);
    }

    #[tokio::test]
    async fn streams_progress_then_volume() {
        let dir = tempfile::tempdir().unwrap();
        write_series(
            dir.path(),
            &[("a.dcm", SliceFixture::ct(1, 0.0, 1)), ("b.dcm", SliceFixture::ct(2, 1.0, 2))],
        );
        let events: Vec<_> = SeriesAssembler::new()
            .load_series_stream(dir.path())
            .collect()
            .await;
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            Ok(SeriesEvent::Progress(SeriesProgress { slices_copied: 1, .. }))
        ));
        assert!(matches!(&events[2], Ok(SeriesEvent::Finished(v)) if v.depth() == 2));

        let empty = tempfile::tempdir().unwrap();
        let events: Vec<_> = SeriesAssembler::new()
            .load_series_stream(empty.path())
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(DicomError::NoDicomFiles)));
    }
}
