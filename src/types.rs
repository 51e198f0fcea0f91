use serde::{Deserialize, Serialize};

/// Valid latitude range in degrees
pub const LAT_MIN: f64 = -90.0;
pub const LAT_MAX: f64 = 90.0;

/// Valid longitude range in degrees
pub const LON_MIN: f64 = -180.0;
pub const LON_MAX: f64 = 180.0;

/// Geodetic position in degrees.
///
/// A position is invalid when either coordinate is NaN; there is no separate
/// validity flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The invalid sentinel
    pub fn invalid() -> Self {
        Self {
            lat: f64::NAN,
            lon: f64::NAN,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.lat.is_nan() && !self.lon.is_nan()
    }

    pub fn set_invalid(&mut self) {
        self.lat = f64::NAN;
        self.lon = f64::NAN;
    }
}

impl Default for GeoPos {
    fn default() -> Self {
        Self::invalid()
    }
}

impl std::fmt::Display for GeoPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(lat={:.6}, lon={:.6})", self.lat, self.lon)
    }
}

/// Image position in pixel coordinates; pixel (i, j) is centered at (i + 0.5, j + 0.5).
///
/// Same NaN-invalid convention as [`GeoPos`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn invalid() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }

    pub fn set_invalid(&mut self) {
        self.x = f64::NAN;
        self.y = f64::NAN;
    }
}

impl Default for PixelPos {
    fn default() -> Self {
        Self::invalid()
    }
}

impl std::fmt::Display for PixelPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(x={:.3}, y={:.3})", self.x, self.y)
    }
}

/// A geolocated sample extracted from the lon/lat rasters for fitting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub lat: f64,
    pub lon: f64,
    pub x: f64,
    pub y: f64,
}

/// Integer pixel rectangle (tile bounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Last column inside the rectangle
    pub fn max_x(&self) -> usize {
        self.x + self.width.saturating_sub(1)
    }

    /// Last row inside the rectangle
    pub fn max_y(&self) -> usize {
        self.y + self.height.saturating_sub(1)
    }

    /// Whether a continuous pixel position lies inside `[x, x + width) × [y, y + height)`
    pub fn contains(&self, pos: &PixelPos) -> bool {
        pos.x >= self.x as f64
            && pos.x < (self.x + self.width) as f64
            && pos.y >= self.y as f64
            && pos.y < (self.y + self.height) as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Normalize a longitude to [-180, 180]
pub fn normalize_lon(lon: f64) -> f64 {
    if (LON_MIN..=LON_MAX).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps +180 onto -180; keep the sign of the input there
    if wrapped == LON_MIN && lon > 0.0 {
        LON_MAX
    } else {
        wrapped
    }
}

/// Whether a (lat, lon) pair read from the rasters is usable
pub fn is_valid_lat_lon(lat: f64, lon: f64) -> bool {
    (LAT_MIN..=LAT_MAX).contains(&lat) && lon.is_finite()
}

/// Error types for geo-coding construction
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Raster size mismatch: {name} is {actual_width}x{actual_height}, expected {width}x{height}")]
    SizeMismatch {
        name: String,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for geo-coding operations
pub type GeoResult<T> = Result<T, GeoError>;
