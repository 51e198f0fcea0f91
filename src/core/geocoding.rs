use crate::core::estimator::{EstimatorParams, PixelPosEstimator};
use crate::core::pixel_dimension::estimate_pixel_dimension;
use crate::core::pixel_finder::DefaultPixelFinder;
use crate::io::{is_mask_valid, SharedSource};
use crate::types::{normalize_lon, GeoPos, GeoResult, PixelPos, LAT_MAX, LAT_MIN, LON_MAX, LON_MIN};
use serde::{Deserialize, Serialize};

/// Geo-coding parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoCodingParams {
    /// Parameters of the underlying pixel position estimator
    pub estimator: EstimatorParams,
    /// Interpolate pixel → geo bilinearly between pixel centers instead of
    /// returning the geolocation of the containing pixel
    pub fraction_accuracy: bool,
}

/// Geo-coding of a raster geolocated by per-pixel longitude/latitude bands.
///
/// Geo → pixel goes through the [`PixelPosEstimator`] for a first guess which the
/// [`DefaultPixelFinder`] then refines on the rasters. Pixel → geo reads the rasters
/// directly and falls back to the estimator where they hold no valid location.
///
/// When the pixel size cannot be measured from the rasters there is no finder and
/// geo → pixel queries are not answered.
pub struct PixelGeoCoding {
    lon_source: SharedSource,
    lat_source: SharedSource,
    mask_source: Option<SharedSource>,
    estimator: PixelPosEstimator,
    finder: Option<DefaultPixelFinder>,
    fraction_accuracy: bool,
    width: usize,
    height: usize,
}

impl PixelGeoCoding {
    pub fn new(
        lon_source: SharedSource,
        lat_source: SharedSource,
        mask_source: Option<SharedSource>,
        params: &GeoCodingParams,
    ) -> GeoResult<Self> {
        let estimator = PixelPosEstimator::new(
            lon_source.as_ref(),
            lat_source.as_ref(),
            mask_source.as_deref(),
            &params.estimator,
        )?;

        let dimension =
            estimate_pixel_dimension(lon_source.as_ref(), lat_source.as_ref(), mask_source.as_deref());
        let finder = match dimension {
            Some(dimension) => Some(DefaultPixelFinder::new(
                lon_source.clone(),
                lat_source.clone(),
                mask_source.clone(),
                dimension.diagonal_squared(),
            )),
            None => {
                log::warn!("Pixel size could not be measured, geo to pixel queries are disabled");
                None
            }
        };

        let width = lon_source.width();
        let height = lon_source.height();
        log::info!(
            "Pixel geo-coding ready for {}x{} raster (estimator available: {}, finder available: {})",
            width,
            height,
            estimator.can_estimate(),
            finder.is_some()
        );

        Ok(Self {
            lon_source,
            lat_source,
            mask_source,
            estimator,
            finder,
            fraction_accuracy: params.fraction_accuracy,
            width,
            height,
        })
    }

    pub fn estimator(&self) -> &PixelPosEstimator {
        &self.estimator
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn can_get_pixel_pos(&self) -> bool {
        self.estimator.can_estimate() && self.finder.is_some()
    }

    pub fn can_get_geo_pos(&self) -> bool {
        true
    }

    /// Pixel position of a geo position: estimator guess refined by the pixel finder
    pub fn get_pixel_pos(&self, geo_pos: &GeoPos) -> PixelPos {
        let Some(finder) = self.finder.as_ref() else {
            return PixelPos::invalid();
        };
        if !geo_pos.is_valid() {
            return PixelPos::invalid();
        }
        let guess = self.estimator.get_pixel_pos(geo_pos);
        if !guess.is_valid() {
            return guess;
        }
        finder.find_pixel_pos(geo_pos, &guess)
    }

    /// Geo position of a pixel position inside the raster
    pub fn get_geo_pos(&self, pixel_pos: &PixelPos) -> GeoPos {
        if !pixel_pos.is_valid() || !self.is_inside(pixel_pos) {
            return GeoPos::invalid();
        }

        let x0 = pixel_pos.x.floor() as usize;
        let y0 = pixel_pos.y.floor() as usize;
        let mut geo_pos = GeoPos::invalid();
        if self.fraction_accuracy && !is_pixel_center(pixel_pos) {
            geo_pos = self.interpolated_geo_pos(pixel_pos, x0, y0);
        }
        if !geo_pos.is_valid() {
            geo_pos = self.geo_pos_at(x0, y0);
        }

        if geo_pos.is_valid() {
            geo_pos
        } else {
            self.estimator.get_geo_pos(pixel_pos)
        }
    }

    fn is_inside(&self, pixel_pos: &PixelPos) -> bool {
        pixel_pos.x >= 0.0
            && pixel_pos.x < self.width as f64
            && pixel_pos.y >= 0.0
            && pixel_pos.y < self.height as f64
    }

    fn is_valid(&self, x: usize, y: usize) -> bool {
        is_mask_valid(self.mask_source.as_deref(), x, y)
    }

    /// Geolocation stored for pixel (x, y), invalid when masked or out of range
    fn geo_pos_at(&self, x: usize, y: usize) -> GeoPos {
        if !self.is_valid(x, y) {
            return GeoPos::invalid();
        }
        let lat = self.lat_source.sample(x, y);
        let lon = self.lon_source.sample(x, y);
        if in_range(lat, LAT_MIN, LAT_MAX) && in_range(lon, LON_MIN, LON_MAX) {
            GeoPos::new(lat, lon)
        } else {
            GeoPos::invalid()
        }
    }

    /// Bilinear interpolation between the 2×2 pixel centers around `pixel_pos`
    fn interpolated_geo_pos(&self, pixel_pos: &PixelPos, x0: usize, y0: usize) -> GeoPos {
        // choose the pair of columns/rows whose centers enclose the position
        let mut x0 = x0;
        let mut y0 = y0;
        if (x0 > 0 && pixel_pos.x - (x0 as f64) < 0.5) || x0 == self.width - 1 {
            x0 -= 1;
        }
        if (y0 > 0 && pixel_pos.y - (y0 as f64) < 0.5) || y0 == self.height - 1 {
            y0 -= 1;
        }
        let wx = pixel_pos.x - (x0 as f64 + 0.5);
        let wy = pixel_pos.y - (y0 as f64 + 0.5);

        let corners = [(x0, y0), (x0 + 1, y0), (x0, y0 + 1), (x0 + 1, y0 + 1)];
        let mut lats = [0.0; 4];
        let mut lons = [0.0; 4];
        for (k, &(x, y)) in corners.iter().enumerate() {
            let geo_pos = self.geo_pos_at(x, y);
            if !geo_pos.is_valid() {
                return GeoPos::invalid();
            }
            lats[k] = geo_pos.lat;
            lons[k] = geo_pos.lon;
        }

        let lat = interpolate_2d(wx, wy, lats[0], lats[1], lats[2], lats[3]);
        let lon = interpolate_lon(wx, wy, lons[0], lons[1], lons[2], lons[3]);
        GeoPos::new(lat, lon)
    }
}

fn is_pixel_center(pixel_pos: &PixelPos) -> bool {
    pixel_pos.x.fract() == 0.5 && pixel_pos.y.fract() == 0.5
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

/// Bilinear interpolation with weights `wx`, `wy` relative to the `d00` corner
fn interpolate_2d(wx: f64, wy: f64, d00: f64, d10: f64, d01: f64, d11: f64) -> f64 {
    d00 + wx * (d10 - d00) + wy * (d01 - d00) + wx * wy * (d11 + d00 - d01 - d10)
}

/// Bilinear longitude interpolation across the antimeridian.
///
/// Corners are unwrapped onto the same side as `d00` before interpolating.
fn interpolate_lon(wx: f64, wy: f64, d00: f64, d10: f64, d01: f64, d11: f64) -> f64 {
    let unwrap = |lon: f64| {
        let delta = lon - d00;
        if delta > 180.0 {
            lon - 360.0
        } else if delta < -180.0 {
            lon + 360.0
        } else {
            lon
        }
    };
    normalize_lon(interpolate_2d(wx, wy, d00, unwrap(d10), unwrap(d01), unwrap(d11)))
}
