//! Typed metadata derived from a data set.

/// A linear display window in modality units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSettings {
    pub center: f64,
    pub width: f64,
}

impl WindowSettings {
    pub const fn new(center: f64, width: f64) -> Self {
        Self { center, width }
    }

    /// A window is usable only with a positive width.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0
    }

    pub fn lower_bound(&self) -> f64 {
        self.center - self.width / 2.0
    }

    pub fn upper_bound(&self) -> f64 {
        self.center + self.width / 2.0
    }
}

/// Physical voxel size in millimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSpacing {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PixelSpacing {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_valid(&self) -> bool {
        self.x > 0.0 && self.y > 0.0 && self.z > 0.0
    }
}

impl Default for PixelSpacing {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Stored sample to modality unit transform (`stored * slope + intercept`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RescaleParameters {
    pub slope: f64,
    pub intercept: f64,
}

impl RescaleParameters {
    pub const IDENTITY: RescaleParameters = RescaleParameters {
        slope: 1.0,
        intercept: 0.0,
    };

    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn is_identity(&self) -> bool {
        self.slope == 1.0 && self.intercept == 0.0
    }

    #[inline]
    pub fn apply(&self, stored: f64) -> f64 {
        stored * self.slope + self.intercept
    }

    /// Express a modality-unit window in stored sample units so it can be
    /// applied directly to raw pixels. A zero slope yields an invalid window.
    pub fn window_to_stored(&self, window: WindowSettings) -> WindowSettings {
        if self.slope == 0.0 {
            return WindowSettings::new(window.center, 0.0);
        }
        WindowSettings::new(
            (window.center - self.intercept) / self.slope,
            window.width / self.slope.abs(),
        )
    }
}

impl Default for RescaleParameters {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Descriptive attributes of a series, taken from its first slice in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesMetadata {
    pub modality: String,
    pub body_part: String,
    /// Window stored in the file, in modality units.
    pub window: Option<WindowSettings>,
}
