use crate::core::distance::SinusoidalDistance;
use crate::io::{is_mask_valid, SharedSource};
use crate::types::{is_valid_lat_lon, GeoPos, PixelPos};

/// Maximum number of neighbourhood refinement cycles
pub const MAX_SEARCH_CYCLE_COUNT: usize = 30;

/// Half size of the window the search may move within, in pixels
pub const SEARCH_RADIUS: i64 = 2 * MAX_SEARCH_CYCLE_COUNT as i64;

/// Half size of the neighbourhood examined per cycle
const NEIGHBOURHOOD_RADIUS: i64 = 2;

/// Refines an approximate pixel position to the pixel whose geolocation is
/// nearest to a geo position, by greedy local search over the lon/lat rasters.
///
/// Masked pixels are never chosen. When the mask blanks out runs of pixels along a
/// row (duplicated scan geometry), the neighbourhood is widened along x until a
/// valid pixel is reached so the search can step over the run.
pub struct DefaultPixelFinder {
    lon_source: SharedSource,
    lat_source: SharedSource,
    mask_source: Option<SharedSource>,
    pixel_diagonal_squared: f64,
    width: i64,
    height: i64,
}

impl DefaultPixelFinder {
    /// `pixel_diagonal_squared` is the acceptance threshold, in degrees², for the
    /// squared sinusoidal distance between the target and the pixel found.
    pub fn new(
        lon_source: SharedSource,
        lat_source: SharedSource,
        mask_source: Option<SharedSource>,
        pixel_diagonal_squared: f64,
    ) -> Self {
        let width = lon_source.width() as i64;
        let height = lon_source.height() as i64;
        Self {
            lon_source,
            lat_source,
            mask_source,
            pixel_diagonal_squared,
            width,
            height,
        }
    }

    pub fn pixel_diagonal_squared(&self) -> f64 {
        self.pixel_diagonal_squared
    }

    /// Search around `pixel_pos` for the pixel nearest to `geo_pos`.
    ///
    /// Returns the center of that pixel, or the invalid sentinel when the start is
    /// too far outside the image or the best pixel found is further than a pixel
    /// diagonal from the target.
    pub fn find_pixel_pos(&self, geo_pos: &GeoPos, pixel_pos: &PixelPos) -> PixelPos {
        if !geo_pos.is_valid() || !pixel_pos.is_valid() || self.width == 0 || self.height == 0 {
            return PixelPos::invalid();
        }

        let mut x0 = pixel_pos.x.floor() as i64;
        let mut y0 = pixel_pos.y.floor() as i64;
        if x0 + SEARCH_RADIUS < 0
            || x0 - SEARCH_RADIUS >= self.width
            || y0 + SEARCH_RADIUS < 0
            || y0 - SEARCH_RADIUS >= self.height
        {
            return PixelPos::invalid();
        }
        x0 = x0.clamp(0, self.width - 1);
        y0 = y0.clamp(0, self.height - 1);

        let x1 = (x0 - SEARCH_RADIUS).max(0);
        let x2 = (x0 + SEARCH_RADIUS).min(self.width - 1);
        let y1 = (y0 - SEARCH_RADIUS).max(0);
        let y2 = (y0 + SEARCH_RADIUS).min(self.height - 1);

        let measure = SinusoidalDistance::new(geo_pos.lon, geo_pos.lat);
        let mut min_distance = self.distance_at(&measure, x0, y0);

        for cycle in 0..MAX_SEARCH_CYCLE_COUNT {
            let (x, y) = (x0, y0);

            let mut min_x = (x - NEIGHBOURHOOD_RADIUS).max(x1);
            let mut max_x = (x + NEIGHBOURHOOD_RADIUS).min(x2);
            let min_y = (y - NEIGHBOURHOOD_RADIUS).max(y1);
            let max_y = (y + NEIGHBOURHOOD_RADIUS).min(y2);

            if self.mask_source.is_some() {
                while min_x > x1 && !self.is_valid(min_x, y) {
                    min_x -= 1;
                }
                while max_x < x2 && !self.is_valid(max_x, y) {
                    max_x += 1;
                }
            }

            for j in min_y..=max_y {
                for i in min_x..=max_x {
                    if i == x && j == y {
                        continue;
                    }
                    let d = self.distance_at(&measure, i, j);
                    if d < min_distance {
                        x0 = i;
                        y0 = j;
                        min_distance = d;
                    }
                }
            }

            if x0 == x && y0 == y {
                log::trace!("Pixel search settled after {} cycle(s)", cycle + 1);
                break;
            }
        }

        if min_distance < self.pixel_diagonal_squared {
            PixelPos::new(x0 as f64 + 0.5, y0 as f64 + 0.5)
        } else {
            PixelPos::invalid()
        }
    }

    fn is_valid(&self, x: i64, y: i64) -> bool {
        is_mask_valid(self.mask_source.as_deref(), x as usize, y as usize)
    }

    /// Distance of pixel (x, y) to the target; infinite for masked or unlocated pixels
    fn distance_at(&self, measure: &SinusoidalDistance, x: i64, y: i64) -> f64 {
        if !self.is_valid(x, y) {
            return f64::INFINITY;
        }
        let (xu, yu) = (x as usize, y as usize);
        let lat = self.lat_source.sample(xu, yu);
        let lon = self.lon_source.sample(xu, yu);
        if !is_valid_lat_lon(lat, lon) {
            return f64::INFINITY;
        }
        measure.distance(lon, lat)
    }
}
