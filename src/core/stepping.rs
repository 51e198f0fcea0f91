use crate::io::{is_mask_valid, SampleSource};
use crate::types::{is_valid_lat_lon, normalize_lon, Rectangle, SamplePoint};

/// Default cap on the number of sample points extracted per tile
pub const MAX_POINT_COUNT_PER_TILE: usize = 1000;

/// Subsampling grid for one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stepping {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
    pub point_count_x: usize,
    pub point_count_y: usize,
    pub step_x: usize,
    pub step_y: usize,
}

impl Stepping {
    /// Nominal number of grid points, before invalid samples are dropped
    pub fn point_count(&self) -> usize {
        self.point_count_x * self.point_count_y
    }

    /// Column of the i-th grid point; the last one lands exactly on `max_x`
    pub fn x(&self, i: usize) -> usize {
        (self.min_x + i * self.step_x).min(self.max_x)
    }

    /// Row of the j-th grid point; the last one lands exactly on `max_y`
    pub fn y(&self, j: usize) -> usize {
        (self.min_y + j * self.step_y).min(self.max_y)
    }
}

/// Number of distinct samples along an axis of `size` pixels with the given
/// stride, the border sample included.
fn axis_point_count(size: usize, step: usize) -> usize {
    if size <= 1 {
        return size;
    }
    let span = size - 1;
    let count = span / step + 1;
    if span % step != 0 {
        count + 1
    } else {
        count
    }
}

/// Choose strides for `rectangle` so that at most `max_point_count` points are sampled.
///
/// Strides start at 1 and grow alternately in x and y until the budget is met or
/// both strides span their axis. The border row and column are always sampled,
/// so a tile at least 2 pixels wide and high never drops below a 2×2 corner grid.
pub fn create_stepping(rectangle: &Rectangle, max_point_count: usize) -> Stepping {
    let width = rectangle.width;
    let height = rectangle.height;
    let max_point_count = max_point_count.max(1);

    let mut step_x = 1;
    let mut step_y = 1;
    let mut point_count_x = axis_point_count(width, step_x);
    let mut point_count_y = axis_point_count(height, step_y);

    let mut adjust_step_x = true;
    while point_count_x * point_count_y > max_point_count {
        let x_saturated = step_x >= width.saturating_sub(1).max(1);
        let y_saturated = step_y >= height.saturating_sub(1).max(1);
        if x_saturated && y_saturated {
            break;
        }
        if (adjust_step_x && !x_saturated) || y_saturated {
            step_x += 1;
            point_count_x = axis_point_count(width, step_x);
        } else {
            step_y += 1;
            point_count_y = axis_point_count(height, step_y);
        }
        adjust_step_x = !adjust_step_x;
    }

    Stepping {
        min_x: rectangle.x,
        min_y: rectangle.y,
        max_x: rectangle.max_x(),
        max_y: rectangle.max_y(),
        point_count_x,
        point_count_y,
        step_x,
        step_y,
    }
}

/// Read the geolocated samples on the stepped grid.
///
/// Samples are dropped when masked, when the latitude is outside [-90, 90] or the
/// longitude is not finite; longitudes are normalised to [-180, 180]. Pixel
/// coordinates refer to pixel centers. The result may be empty.
pub fn extract_sample_points(
    lon_source: &dyn SampleSource,
    lat_source: &dyn SampleSource,
    mask_source: Option<&dyn SampleSource>,
    stepping: &Stepping,
) -> Vec<SamplePoint> {
    let mut points = Vec::with_capacity(stepping.point_count());

    for j in 0..stepping.point_count_y {
        let y = stepping.y(j);
        for i in 0..stepping.point_count_x {
            let x = stepping.x(i);
            if !is_mask_valid(mask_source, x, y) {
                continue;
            }
            let lat = lat_source.sample(x, y);
            let lon = lon_source.sample(x, y);
            if !is_valid_lat_lon(lat, lon) {
                continue;
            }
            points.push(SamplePoint {
                lat,
                lon: normalize_lon(lon),
                x: x as f64 + 0.5,
                y: y as f64 + 0.5,
            });
        }
    }

    points
}
