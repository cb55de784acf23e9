use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use futures::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use dicom_window::{
    BackendMode, BufferPool, DicomError, GpuWindowBackend, Interpolation, Orientation,
    PressureMonitor, PsiConfig, SeriesAssembler, SeriesEvent, SeriesOptions, SortBy, Volume,
    WGPU, WindowSettings, WindowingEngine,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Axis {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Auto,
    Cpu,
    Gpu,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Sort {
    Position,
    Instance,
    Name,
}

/// Load a DICOM series and write one windowed slice as PNG
#[derive(Parser, Debug)]
#[command(name = "dicom-window")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the slices of one series
    dir: PathBuf,

    /// Window preset by name (e.g. "lung", "soft tissue")
    #[arg(long, conflicts_with_all = ["center", "auto"])]
    preset: Option<String>,

    /// Window center in modality units
    #[arg(long, requires = "width", allow_hyphen_values = true)]
    center: Option<f64>,

    /// Window width in modality units
    #[arg(long, requires = "center")]
    width: Option<f64>,

    /// Derive the window from the slice histogram
    #[arg(long, conflicts_with = "center")]
    auto: bool,

    #[arg(long, value_enum, default_value_t = Axis::Axial)]
    axis: Axis,

    /// Slice index along the axis, defaults to the middle slice
    #[arg(long)]
    index: Option<usize>,

    /// Resample coronal and sagittal slices to square pixels
    #[arg(long)]
    bilinear: bool,

    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    backend: Backend,

    #[arg(long, value_enum, default_value_t = Sort::Position)]
    sort: Sort,

    /// Accept 8-bit slices
    #[arg(long = "allow-8bit")]
    allow_8bit: bool,

    #[arg(short, long, default_value = "slice.png")]
    output: PathBuf,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn load_volume(assembler: &SeriesAssembler, dir: &Path) -> Result<Volume, DicomError> {
    let mut events = assembler.load_series_stream(dir);
    while let Some(event) = events.next().await {
        match event? {
            SeriesEvent::Progress(progress) => debug!(
                copied = progress.slices_copied,
                total = progress.total_slices,
                "loading series"
            ),
            SeriesEvent::Finished(volume) => return Ok(volume),
        }
    }
    Err(DicomError::Unknown("series load ended without a volume".to_string()))
}

async fn build_engine(pool: std::sync::Arc<BufferPool>, backend: Backend) -> WindowingEngine {
    let mode = match backend {
        Backend::Auto => BackendMode::Auto,
        Backend::Cpu => BackendMode::Cpu,
        Backend::Gpu => BackendMode::Gpu,
    };
    let engine = WindowingEngine::new().with_pool(pool).with_backend_mode(mode);
    if mode == BackendMode::Cpu {
        return engine;
    }
    match WGPU::request().await {
        Ok(wgpu) => engine.with_gpu(GpuWindowBackend::new(wgpu)),
        Err(err) => {
            warn!(%err, "GPU unavailable, windowing on the CPU");
            engine
        }
    }
}

async fn run(args: Args) -> Result<(), DicomError> {
    let pool = BufferPool::shared();
    let monitor = PressureMonitor::new(pool.clone());
    monitor.start()?;
    let psi = PsiConfig::default();
    if psi.path.exists() {
        monitor.attach_psi_source(psi)?;
    }

    let sort_by = match args.sort {
        Sort::Position => SortBy::ImagePositionPatient,
        Sort::Instance => SortBy::InstanceNumber,
        Sort::Name => SortBy::FileName,
    };
    let assembler = SeriesAssembler::new()
        .with_pool(pool.clone())
        .with_options(SeriesOptions {
            sort_by,
            allow_8bit: args.allow_8bit,
            ..SeriesOptions::default()
        });
    let volume = load_volume(&assembler, &args.dir).await?;
    let (depth, height, width) = volume.dim();
    info!(depth, height, width, spacing = ?volume.spacing(), "volume loaded");

    let series = volume.metadata();
    let suggestions: Vec<_> = WindowingEngine::suggest_presets(&series.modality, &series.body_part)
            .into_iter()
            .map(|preset| preset.name())
            .collect();
    if !suggestions.is_empty() {
        info!(presets = ?suggestions, "suggested presets");
    }

    let orientation = match args.axis {
        Axis::Axial => Orientation::Axial,
        Axis::Coronal => Orientation::Coronal,
        Axis::Sagittal => Orientation::Sagittal,
    };
    let extent = match orientation {
        Orientation::Axial => depth,
        Orientation::Coronal => height,
        Orientation::Sagittal => width,
    };
    let index = args.index.unwrap_or(extent / 2);
    let slice: Vec<i16> = volume
        .get_slice_from_axis(index, &orientation)
        .ok_or_else(|| DicomError::Unknown(format!("slice {index} is outside 0..{extent}")))?
        .iter()
        .copied()
        .collect();

    let metrics = WindowingEngine::calculate_quality_metrics(&slice);
    info!(
        mean = metrics.mean,
        std_deviation = metrics.std_deviation,
        min = metrics.min,
        max = metrics.max,
        snr = metrics.snr,
        contrast = metrics.contrast,
        "slice statistics (stored values)"
    );

    let rescale = volume.rescale();
    let optimal = || {
        let stored = WindowingEngine::calculate_optimal_window_level(&slice);
        WindowSettings::new(rescale.apply(stored.center), stored.width * rescale.slope.abs())
    };
    let window = match (&args.preset, args.center.zip(args.width)) {
        (Some(name), _) => WindowingEngine::get_preset_values_by_name(name)
            .ok_or_else(|| DicomError::Unknown(format!("unknown preset {name:?}")))?,
        (None, Some((center, width))) => WindowSettings::new(center, width),
        _ if args.auto => optimal(),
        _ => series.window.unwrap_or_else(optimal),
    };
    info!(
        center = window.center,
        width = window.width,
        preset = WindowingEngine::preset_name(window).unwrap_or("custom"),
        "window"
    );

    let interpolation = if args.bilinear {
        Interpolation::Bilinear
    } else {
        Interpolation::None
    };
    let engine = build_engine(pool.clone(), args.backend).await;
    let image = volume
        .get_image_from_axis(index, orientation, interpolation, window, &engine)
        .ok_or_else(|| DicomError::Unknown(format!("window {window:?} is not usable")))?;
    image
        .save(&args.output)
        .map_err(|err| DicomError::Unknown(err.to_string()))?;
    info!(path = %args.output.display(), "image written");

    monitor.stop();
    pool.shutdown();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    setup_logging(args.verbose, args.quiet);
    if let Err(err) = run(args).await {
        error!(%err, "failed");
        std::process::exit(1);
    }
}
