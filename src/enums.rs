#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Resample coronal and sagittal slices to isotropic pixels.
    Bilinear,
    #[default]
    None,
}

/// How slices of a series are put in order. When the chosen key is missing
/// on any slice the next one in declaration order is tried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Ascending position along the slice normal.
    #[default]
    ImagePositionPatient,
    InstanceNumber,
    /// Directory enumeration order (file name).
    FileName,
}

/// Area in pixels from which [`BackendMode::Auto`] prefers the GPU.
pub const GPU_MIN_AREA: usize = 800 * 800;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendMode {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Processor {
    Cpu,
    Gpu,
}

impl BackendMode {
    /// Pick the processor for a `width` x `height` image.
    pub fn resolve(self, width: usize, height: usize) -> Processor {
        self.resolve_area(width.saturating_mul(height))
    }

    pub fn resolve_area(self, area: usize) -> Processor {
        match self {
            BackendMode::Cpu => Processor::Cpu,
            BackendMode::Gpu => Processor::Gpu,
            BackendMode::Auto if area >= GPU_MIN_AREA => Processor::Gpu,
            BackendMode::Auto => Processor::Cpu,
        }
    }
}
