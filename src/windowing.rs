//! Window/level display transforms, presets and image statistics.
//!
//! The mapping itself runs on a [`WindowBackend`]. [`CpuBackend`] is always
//! available; a GPU backend can be attached to the engine and is chosen per
//! call through [`BackendMode`]. Nothing here returns an error: invalid input
//! produces an invalid [`WindowSettings`] (width <= 0) or an empty buffer.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    buffer_pool::BufferPool,
    enums::{BackendMode, Processor},
    error::DicomError,
    metadata::WindowSettings,
};

/// Samples per rayon work item.
const CHUNK: usize = 16 * 1024;

const HISTOGRAM_MAX_BINS: usize = 65_536;
const LOW_PERCENTILE: f64 = 0.001;
const HIGH_PERCENTILE: f64 = 0.999;

/// Default distance for [`WindowingEngine::get_preset_name`] matches.
pub const PRESET_MATCH_TOLERANCE: f64 = 50.0;

/// Borrowed pixel data of one of the supported sample types.
#[derive(Clone, Copy, Debug)]
pub enum Samples<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    I16(&'a [i16]),
}

impl Samples<'_> {
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(p) => p.len(),
            Samples::U16(p) => p.len(),
            Samples::I16(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Sample: Copy + Send + Sync + Into<f64> + 'static {
    fn samples(pixels: &[Self]) -> Samples<'_>;
}

impl Sample for u8 {
    fn samples(pixels: &[Self]) -> Samples<'_> {
        Samples::U8(pixels)
    }
}

impl Sample for u16 {
    fn samples(pixels: &[Self]) -> Samples<'_> {
        Samples::U16(pixels)
    }
}

impl Sample for i16 {
    fn samples(pixels: &[Self]) -> Samples<'_> {
        Samples::I16(pixels)
    }
}

/// One implementation of the window/level mapping. `out` has the same length
/// as `pixels` and `window` is valid.
pub trait WindowBackend: Send + Sync {
    fn processor(&self) -> Processor;

    fn apply(
        &self,
        pixels: Samples<'_>,
        window: WindowSettings,
        out: &mut [u8],
    ) -> Result<(), DicomError>;
}

/// `clamp(round((v - (center - width / 2)) / width * 255), 0, 255)`
#[inline]
pub fn map_sample(value: f64, lower_bound: f64, width: f64) -> u8 {
    ((value - lower_bound) / width * 255.0).round().clamp(0.0, 255.0) as u8
}

fn window_cpu<S: Sample>(pixels: &[S], window: WindowSettings, out: &mut [u8]) {
    let lower_bound = window.lower_bound();
    let width = window.width;
    out.par_chunks_mut(CHUNK)
        .zip(pixels.par_chunks(CHUNK))
        .for_each(|(out, pixels)| {
            for (o, &v) in out.iter_mut().zip(pixels) {
                *o = map_sample(v.into(), lower_bound, width);
            }
        });
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl WindowBackend for CpuBackend {
    fn processor(&self) -> Processor {
        Processor::Cpu
    }

    fn apply(
        &self,
        pixels: Samples<'_>,
        window: WindowSettings,
        out: &mut [u8],
    ) -> Result<(), DicomError> {
        match pixels {
            Samples::U8(p) => window_cpu(p, window, out),
            Samples::U16(p) => window_cpu(p, window, out),
            Samples::I16(p) => window_cpu(p, window, out),
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MedicalPreset {
    Lung,
    Bone,
    SoftTissue,
    Brain,
    Liver,
    Mediastinum,
    Abdomen,
    Spine,
    Angiography,
    Subdural,
    Stroke,
}

/// Preset table in reverse-lookup priority order.
static PRESETS: [(MedicalPreset, &str, WindowSettings); 11] = [
    (MedicalPreset::Lung, "Lung", WindowSettings::new(-600.0, 1500.0)),
    (MedicalPreset::Bone, "Bone", WindowSettings::new(400.0, 1800.0)),
    (MedicalPreset::SoftTissue, "Soft Tissue", WindowSettings::new(40.0, 400.0)),
    (MedicalPreset::Brain, "Brain", WindowSettings::new(40.0, 80.0)),
    (MedicalPreset::Liver, "Liver", WindowSettings::new(60.0, 160.0)),
    (MedicalPreset::Mediastinum, "Mediastinum", WindowSettings::new(50.0, 350.0)),
    (MedicalPreset::Abdomen, "Abdomen", WindowSettings::new(60.0, 400.0)),
    (MedicalPreset::Spine, "Spine", WindowSettings::new(50.0, 250.0)),
    (MedicalPreset::Angiography, "Angiography", WindowSettings::new(300.0, 600.0)),
    (MedicalPreset::Subdural, "Subdural", WindowSettings::new(75.0, 215.0)),
    (MedicalPreset::Stroke, "Stroke", WindowSettings::new(40.0, 40.0)),
];

impl MedicalPreset {
    pub fn all() -> impl Iterator<Item = MedicalPreset> {
        PRESETS.iter().map(|(preset, _, _)| *preset)
    }

    fn entry(self) -> &'static (MedicalPreset, &'static str, WindowSettings) {
        // Every variant has exactly one row.
        &PRESETS[PRESETS
            .iter()
            .position(|(preset, _, _)| *preset == self)
            .unwrap_or(0)]
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn window(self) -> WindowSettings {
        self.entry().2
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// (modality, body part keywords, presets). The first row whose modality is
/// contained in the modality and with a keyword contained in the body part
/// wins; an empty keyword list matches any body part.
static SUGGESTION_RULES: &[(&str, &[&str], &[MedicalPreset])] = &[
    (
        "CT",
        &["CHEST", "LUNG", "THORAX"],
        &[MedicalPreset::Lung, MedicalPreset::Mediastinum, MedicalPreset::Bone],
    ),
    (
        "CT",
        &["HEAD", "BRAIN", "SKULL"],
        &[
            MedicalPreset::Brain,
            MedicalPreset::Subdural,
            MedicalPreset::Stroke,
            MedicalPreset::Bone,
        ],
    ),
    (
        "CT",
        &["ABDOMEN", "LIVER", "PANCREAS", "KIDNEY"],
        &[MedicalPreset::Abdomen, MedicalPreset::Liver, MedicalPreset::SoftTissue],
    ),
    (
        "CT",
        &["SPINE"],
        &[MedicalPreset::Spine, MedicalPreset::Bone],
    ),
    (
        "CT",
        &["PELVIS", "HIP"],
        &[MedicalPreset::SoftTissue, MedicalPreset::Bone],
    ),
    (
        "CT",
        &["HEART", "AORTA", "ANGIO"],
        &[MedicalPreset::Angiography, MedicalPreset::Mediastinum],
    ),
    (
        "CT",
        &[],
        &[MedicalPreset::SoftTissue, MedicalPreset::Lung, MedicalPreset::Bone],
    ),
];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QualityMetrics {
    pub mean: f64,
    /// Population standard deviation.
    pub std_deviation: f64,
    pub min: f64,
    pub max: f64,
    /// `mean / std_deviation`, 0 for a constant image.
    pub snr: f64,
    /// Michelson-style `(max - min) / (|max| + |min|)`, 0 when both are 0.
    pub contrast: f64,
}

#[derive(Clone, Copy)]
struct Extent {
    min: f64,
    max: f64,
    sum: f64,
}

fn extent<S: Sample>(pixels: &[S]) -> Option<Extent> {
    // Chunk partials are combined in order so results do not depend on
    // thread scheduling.
    pixels
        .par_chunks(CHUNK)
        .map(|chunk| {
            chunk.iter().fold(
                Extent {
                    min: f64::INFINITY,
                    max: f64::NEG_INFINITY,
                    sum: 0.0,
                },
                |acc, &v| {
                    let v: f64 = v.into();
                    Extent {
                        min: acc.min.min(v),
                        max: acc.max.max(v),
                        sum: acc.sum + v,
                    }
                },
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
        .reduce(|a, b| Extent {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
            sum: a.sum + b.sum,
        })
}

#[derive(Clone, Default)]
pub struct WindowingEngine {
    pool: Option<Arc<BufferPool>>,
    gpu: Option<Arc<dyn WindowBackend>>,
    mode: BackendMode,
}

impl std::fmt::Debug for WindowingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowingEngine")
            .field("pool", &self.pool.is_some())
            .field("gpu", &self.gpu.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

impl WindowingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw output buffers from `pool`.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Attach the backend used when a call resolves to [`Processor::Gpu`].
    pub fn with_gpu(mut self, backend: impl WindowBackend + 'static) -> Self {
        self.gpu = Some(Arc::new(backend));
        self
    }

    /// Mode used by callers that do not pick one per call, such as
    /// [`Volume::get_image_from_axis`](crate::volume::Volume::get_image_from_axis).
    pub fn with_backend_mode(mut self, mode: BackendMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn backend_mode(&self) -> BackendMode {
        self.mode
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    /// Map 16-bit (or 8-bit) samples to display bytes.
    ///
    /// Returns an empty buffer for a window with width <= 0. A GPU request
    /// without an attached GPU backend, or a failing GPU, falls back to the
    /// CPU.
    pub fn apply_window_level<S: Sample>(
        &self,
        pixels: &[S],
        center: f64,
        width: f64,
        mode: BackendMode,
    ) -> Vec<u8> {
        self.apply_window(pixels, WindowSettings::new(center, width), mode)
    }

    pub fn apply_window<S: Sample>(
        &self,
        pixels: &[S],
        window: WindowSettings,
        mode: BackendMode,
    ) -> Vec<u8> {
        if !window.is_valid() {
            return Vec::new();
        }
        let count = pixels.len();
        let mut out = match &self.pool {
            Some(pool) => pool.acquire::<u8>(count),
            None => vec![0u8; count],
        };
        out.truncate(count);

        if mode.resolve_area(count) == Processor::Gpu {
            match &self.gpu {
                Some(gpu) => match gpu.apply(S::samples(pixels), window, &mut out) {
                    Ok(()) => return out,
                    Err(err) => warn!(%err, "GPU windowing failed, using CPU"),
                },
                None => debug!(count, "no GPU backend attached, using CPU"),
            }
        }
        window_cpu(pixels, window, &mut out);
        out
    }

    /// Window derived from the histogram with 0.1% of samples clipped at each
    /// tail. A constant (or empty) buffer yields width 0.
    pub fn calculate_optimal_window_level<S: Sample>(pixels: &[S]) -> WindowSettings {
        let Some(Extent { min, max, .. }) = extent(pixels) else {
            return WindowSettings::new(0.0, 0.0);
        };
        if max <= min {
            return WindowSettings::new(min, 0.0);
        }

        let range = max - min;
        let bins = ((range + 1.0) as usize).clamp(2, HISTOGRAM_MAX_BINS);
        let bin_scale = (bins - 1) as f64 / range;
        let histogram = pixels
            .par_chunks(CHUNK)
            .map(|chunk| {
                let mut counts = vec![0u64; bins];
                for &v in chunk {
                    let v: f64 = v.into();
                    counts[((v - min) * bin_scale).round() as usize] += 1;
                }
                counts
            })
            .reduce(
                || vec![0u64; bins],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
                    a
                },
            );

        let total = pixels.len() as f64;
        let low_target = total * LOW_PERCENTILE;
        let high_target = total * HIGH_PERCENTILE;
        let mut cumulative = 0u64;
        let mut low_bin = None;
        let mut high_bin = bins - 1;
        for (bin, &count) in histogram.iter().enumerate() {
            cumulative += count;
            if low_bin.is_none() && cumulative as f64 > low_target {
                low_bin = Some(bin);
            }
            if cumulative as f64 >= high_target {
                high_bin = bin;
                break;
            }
        }

        let value_of = |bin: usize| min + bin as f64 / bin_scale;
        let (low, high) = match low_bin {
            Some(low_bin) if high_bin > low_bin => (value_of(low_bin), value_of(high_bin)),
            _ => (min, max),
        };
        WindowSettings::new((low + high) / 2.0, high - low)
    }

    /// One independent optimal window per buffer.
    pub fn batch_calculate_optimal_window_level<S: Sample>(
        buffers: &[Vec<S>],
    ) -> Vec<WindowSettings> {
        buffers
            .par_iter()
            .map(|pixels| Self::calculate_optimal_window_level(pixels))
            .collect()
    }

    pub fn get_preset_values(preset: MedicalPreset) -> WindowSettings {
        preset.window()
    }

    /// Look a preset up by name, ignoring case, whitespace and punctuation.
    pub fn get_preset_values_by_name(name: &str) -> Option<WindowSettings> {
        Self::preset_by_name(name).map(MedicalPreset::window)
    }

    pub fn preset_by_name(name: &str) -> Option<MedicalPreset> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        PRESETS
            .iter()
            .find(|(_, preset_name, _)| normalize_name(preset_name) == wanted)
            .map(|(preset, _, _)| *preset)
    }

    /// Presets worth offering for a modality and body part, most relevant
    /// first. Only CT has calibrated presets.
    pub fn suggest_presets(modality: &str, body_part: &str) -> Vec<MedicalPreset> {
        let modality = modality.trim().to_uppercase();
        let body_part = body_part.trim().to_uppercase();
        SUGGESTION_RULES
            .iter()
            .find(|(rule_modality, keywords, _)| {
                modality.contains(rule_modality)
                    && (keywords.is_empty() || keywords.iter().any(|k| body_part.contains(k)))
            })
            .map(|(_, _, presets)| presets.to_vec())
            .unwrap_or_default()
    }

    /// Name of the first preset whose center and width are both within
    /// `tolerance` of `settings`.
    pub fn get_preset_name(settings: WindowSettings, tolerance: f64) -> Option<&'static str> {
        PRESETS
            .iter()
            .find(|(_, _, window)| {
                (window.center - settings.center).abs() <= tolerance
                    && (window.width - settings.width).abs() <= tolerance
            })
            .map(|(_, name, _)| *name)
    }

    /// [`get_preset_name`](Self::get_preset_name) with
    /// [`PRESET_MATCH_TOLERANCE`].
    pub fn preset_name(settings: WindowSettings) -> Option<&'static str> {
        Self::get_preset_name(settings, PRESET_MATCH_TOLERANCE)
    }

    pub fn calculate_quality_metrics<S: Sample>(pixels: &[S]) -> QualityMetrics {
        let Some(Extent { min, max, sum }) = extent(pixels) else {
            return QualityMetrics::default();
        };
        let count = pixels.len() as f64;
        let mean = sum / count;
        let squared: f64 = pixels
            .par_chunks(CHUNK)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|&v| {
                        let d = v.into() - mean;
                        d * d
                    })
                    .sum::<f64>()
            })
            .collect::<Vec<_>>()
            .into_iter()
            .sum();
        let std_deviation = (squared / count).sqrt();
        let snr = if std_deviation > 0.0 {
            mean / std_deviation
        } else {
            0.0
        };
        let magnitude = max.abs() + min.abs();
        let contrast = if magnitude > 0.0 {
            (max - min) / magnitude
        } else {
            0.0
        };
        QualityMetrics {
            mean,
            std_deviation,
            min,
            max,
            snr,
            contrast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGpu;

    impl WindowBackend for FailingGpu {
        fn processor(&self) -> Processor {
            Processor::Gpu
        }

        fn apply(&self, _: Samples<'_>, _: WindowSettings, _: &mut [u8]) -> Result<(), DicomError> {
            Err(DicomError::Unknown("device lost".to_string()))
        }
    }

    /// Writes a marker so tests can tell which backend ran.
    struct MarkerGpu;

    impl WindowBackend for MarkerGpu {
        fn processor(&self) -> Processor {
            Processor::Gpu
        }

        fn apply(&self, _: Samples<'_>, _: WindowSettings, out: &mut [u8]) -> Result<(), DicomError> {
            out.fill(42);
            Ok(())
        }
    }

    #[test]
    fn maps_window_linearly() {
        let engine = WindowingEngine::new();
        let pixels: Vec<u16> = vec![0, 500, 1000, 1500, 2000, 3000];
        let out = engine.apply_window_level(&pixels, 1000.0, 2000.0, BackendMode::Cpu);
        assert_eq!(out, vec![0, 64, 128, 191, 255, 255]);
    }

    #[test]
    fn engine_matches_cpu_backend() {
        let pixels: Vec<i16> = (-2048..2048).step_by(7).collect();
        let window = WindowSettings::new(40.0, 400.0);
        let mut expected = vec![0u8; pixels.len()];
        CpuBackend
            .apply(Samples::I16(&pixels), window, &mut expected)
            .unwrap();
        let out = WindowingEngine::new().apply_window(&pixels, window, BackendMode::Cpu);
        assert_eq!(out, expected);
    }

    #[test]
    fn output_stays_in_range_for_signed_samples() {
        let engine = WindowingEngine::new();
        let pixels: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
        for (center, width) in [(-600.0, 1500.0), (40.0, 1.0), (0.0, 65536.0)] {
            let out = engine.apply_window_level(&pixels, center, width, BackendMode::Cpu);
            assert_eq!(out.len(), pixels.len());
            assert_eq!(out[0], 0);
        }
    }

    #[test]
    fn invalid_width_yields_empty_output() {
        let engine = WindowingEngine::new();
        assert!(engine
            .apply_window_level(&[1u16, 2, 3], 0.0, 0.0, BackendMode::Cpu)
            .is_empty());
    }

    #[test]
    fn gpu_requests_fall_back_to_cpu() {
        let pixels = vec![2000u16; 16];
        let expected = vec![255u8; 16];

        let no_gpu = WindowingEngine::new();
        assert_eq!(
            no_gpu.apply_window_level(&pixels, 1000.0, 2000.0, BackendMode::Gpu),
            expected
        );

        let failing = WindowingEngine::new().with_gpu(FailingGpu);
        assert_eq!(
            failing.apply_window_level(&pixels, 1000.0, 2000.0, BackendMode::Gpu),
            expected
        );
    }

    #[test]
    fn auto_mode_dispatches_by_area() {
        let engine = WindowingEngine::new().with_gpu(MarkerGpu);
        let small = vec![0u16; 512 * 512];
        assert!(engine
            .apply_window_level(&small, 0.0, 10.0, BackendMode::Auto)
            .iter()
            .all(|&v| v == 128));

        let large = vec![0u16; 800 * 800];
        assert!(engine
            .apply_window_level(&large, 0.0, 10.0, BackendMode::Auto)
            .iter()
            .all(|&v| v == 42));
    }

    #[test]
    fn pooled_output_buffers_are_reused() {
        let pool = BufferPool::shared();
        let engine = WindowingEngine::new().with_pool(pool.clone());
        let pixels = vec![10u16; 100];
        let out = engine.apply_window_level(&pixels, 10.0, 20.0, BackendMode::Cpu);
        assert_eq!(out.len(), 100);
        pool.release(out);
        let again = engine.apply_window_level(&pixels, 10.0, 20.0, BackendMode::Cpu);
        assert!(again.iter().all(|&v| v == 128));
        assert_eq!(pool.statistics().hits, 1);
    }

    #[test]
    fn optimal_window_covers_distinct_values() {
        let two_values = [0u16, 1];
        assert!(WindowingEngine::calculate_optimal_window_level(&two_values).is_valid());

        let mut skewed = vec![0i16; 10_000];
        skewed[0] = 1;
        let window = WindowingEngine::calculate_optimal_window_level(&skewed);
        assert_eq!(window, WindowSettings::new(0.5, 1.0));

        let constant = vec![700u16; 100];
        let window = WindowingEngine::calculate_optimal_window_level(&constant);
        assert!(!window.is_valid());
        assert_eq!(window.center, 700.0);

        assert!(!WindowingEngine::calculate_optimal_window_level::<u16>(&[]).is_valid());
    }

    #[test]
    fn optimal_window_clips_outlier_tails() {
        let mut pixels: Vec<i16> = (0..10_000).map(|i| (i % 1000) as i16).collect();
        pixels[0] = -3000;
        pixels[1] = 3000;
        let window = WindowingEngine::calculate_optimal_window_level(&pixels);
        assert!(window.lower_bound() >= 0.0);
        assert!(window.upper_bound() <= 1000.0);
        assert!(window.width > 900.0);
    }

    #[test]
    fn batch_windows_are_independent() {
        let buffers = vec![vec![0u16, 100], vec![5u16; 4], vec![1000u16, 3000]];
        let windows = WindowingEngine::batch_calculate_optimal_window_level(&buffers);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], WindowingEngine::calculate_optimal_window_level(&buffers[0]));
        assert!(!windows[1].is_valid());
        assert_eq!(windows[2], WindowSettings::new(2000.0, 2000.0));
    }

    #[test]
    fn preset_literals() {
        assert_eq!(
            WindowingEngine::get_preset_values(MedicalPreset::Lung),
            WindowSettings::new(-600.0, 1500.0)
        );
        assert_eq!(
            WindowingEngine::get_preset_values(MedicalPreset::Bone),
            WindowSettings::new(400.0, 1800.0)
        );
        assert_eq!(MedicalPreset::all().count(), PRESETS.len());
        for preset in MedicalPreset::all() {
            assert!(preset.window().is_valid());
            assert_eq!(WindowingEngine::preset_by_name(preset.name()), Some(preset));
        }
    }

    #[test]
    fn preset_names_are_forgiving() {
        let soft = Some(WindowSettings::new(40.0, 400.0));
        assert_eq!(WindowingEngine::get_preset_values_by_name("soft tissue"), soft);
        assert_eq!(WindowingEngine::get_preset_values_by_name("  SoftTissue "), soft);
        assert_eq!(WindowingEngine::get_preset_values_by_name("SOFT-TISSUE"), soft);
        assert_eq!(
            WindowingEngine::get_preset_values_by_name(" lung\t"),
            Some(WindowSettings::new(-600.0, 1500.0))
        );
        assert_eq!(WindowingEngine::get_preset_values_by_name("kidney"), None);
        assert_eq!(WindowingEngine::get_preset_values_by_name("   "), None);
    }

    #[test]
    fn reverse_preset_lookup_honours_tolerance() {
        assert_eq!(
            WindowingEngine::get_preset_name(WindowSettings::new(-600.0, 1500.0), 50.0),
            Some("Lung")
        );
        assert_eq!(
            WindowingEngine::get_preset_name(WindowSettings::new(-595.0, 1510.0), 10.0),
            Some("Lung")
        );
        assert_eq!(
            WindowingEngine::get_preset_name(WindowSettings::new(-500.0, 1500.0), 10.0),
            None
        );
        assert_eq!(
            WindowingEngine::preset_name(WindowSettings::new(410.0, 1790.0)),
            Some("Bone")
        );
    }

    #[test]
    fn suggestions_follow_modality_and_body_part() {
        assert_eq!(
            WindowingEngine::suggest_presets("CT", "CHEST"),
            vec![MedicalPreset::Lung, MedicalPreset::Mediastinum, MedicalPreset::Bone]
        );
        assert_eq!(
            WindowingEngine::suggest_presets("ct", " head "),
            vec![
                MedicalPreset::Brain,
                MedicalPreset::Subdural,
                MedicalPreset::Stroke,
                MedicalPreset::Bone
            ]
        );
        assert_eq!(
            WindowingEngine::suggest_presets("CT", "LSPINE")[0],
            MedicalPreset::Spine
        );
        assert_eq!(
            WindowingEngine::suggest_presets("CT", ""),
            vec![MedicalPreset::SoftTissue, MedicalPreset::Lung, MedicalPreset::Bone]
        );
        assert!(WindowingEngine::suggest_presets("MR", "HEAD").is_empty());
    }

    #[test]
    fn quality_metrics_of_known_buffer() {
        let pixels = [2u16, 4, 4, 4, 5, 5, 7, 9];
        let metrics = WindowingEngine::calculate_quality_metrics(&pixels);
        assert_eq!(metrics.mean, 5.0);
        assert_eq!(metrics.std_deviation, 2.0);
        assert_eq!(metrics.min, 2.0);
        assert_eq!(metrics.max, 9.0);
        assert_eq!(metrics.snr, 2.5);
        assert!((metrics.contrast - 7.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn quality_metrics_of_degenerate_buffers() {
        let constant = WindowingEngine::calculate_quality_metrics(&[0i16; 10]);
        assert_eq!(constant.snr, 0.0);
        assert_eq!(constant.contrast, 0.0);
        assert_eq!(
            WindowingEngine::calculate_quality_metrics::<u8>(&[]),
            QualityMetrics::default()
        );
    }
}
