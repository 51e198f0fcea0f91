use crate::core::distance::SinusoidalDistance;
use crate::io::{is_mask_valid, SampleSource};
use crate::types::is_valid_lat_lon;

/// Number of sample locations per axis
const LATTICE_SIZE: usize = 10;

/// Nominal size of one pixel step, in degrees on a local sinusoidal projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelDimension {
    pub width: f64,
    pub height: f64,
}

impl PixelDimension {
    /// Squared length of the pixel diagonal, in degrees²
    pub fn diagonal_squared(&self) -> f64 {
        self.width * self.width + self.height * self.height
    }
}

/// Estimate the pixel size from the lon/lat rasters.
///
/// Measures one-pixel steps in x and y at a lattice of locations spread over the
/// raster and returns the medians. When no lattice location has valid neighbours
/// in one direction, every pixel is tried instead. `None` when the raster is
/// smaller than 2×2 or no pixel has valid neighbours.
pub fn estimate_pixel_dimension(
    lon_source: &dyn SampleSource,
    lat_source: &dyn SampleSource,
    mask_source: Option<&dyn SampleSource>,
) -> Option<PixelDimension> {
    let width = lon_source.width();
    let height = lon_source.height();
    if width < 2 || height < 2 {
        return None;
    }

    let sampler = StepSampler {
        lon_source,
        lat_source,
        mask_source,
    };

    let (mut widths, mut heights) = sampler.measure(&lattice(width - 1), &lattice(height - 1));
    if widths.is_empty() || heights.is_empty() {
        log::debug!("Pixel size lattice found no valid neighbours, scanning the whole raster");
        let all_x: Vec<usize> = (0..width - 1).collect();
        let all_y: Vec<usize> = (0..height - 1).collect();
        (widths, heights) = sampler.measure(&all_x, &all_y);
    }

    let dimension = PixelDimension {
        width: median(&mut widths)?,
        height: median(&mut heights)?,
    };
    log::debug!(
        "Estimated pixel dimension: {:.6} x {:.6} degrees",
        dimension.width,
        dimension.height
    );
    Some(dimension)
}

struct StepSampler<'a> {
    lon_source: &'a dyn SampleSource,
    lat_source: &'a dyn SampleSource,
    mask_source: Option<&'a dyn SampleSource>,
}

impl StepSampler<'_> {
    fn geo_at(&self, x: usize, y: usize) -> Option<(f64, f64)> {
        if !is_mask_valid(self.mask_source, x, y) {
            return None;
        }
        let lat = self.lat_source.sample(x, y);
        let lon = self.lon_source.sample(x, y);
        is_valid_lat_lon(lat, lon).then_some((lon, lat))
    }

    /// Step lengths to the right and lower neighbours at every (x, y) combination
    fn measure(&self, xs: &[usize], ys: &[usize]) -> (Vec<f64>, Vec<f64>) {
        let mut widths = Vec::new();
        let mut heights = Vec::new();
        for &y in ys {
            for &x in xs {
                let Some((lon0, lat0)) = self.geo_at(x, y) else {
                    continue;
                };
                let measure = SinusoidalDistance::new(lon0, lat0);
                if let Some((lon, lat)) = self.geo_at(x + 1, y) {
                    let d = measure.distance(lon, lat).sqrt();
                    if d > 0.0 && d.is_finite() {
                        widths.push(d);
                    }
                }
                if let Some((lon, lat)) = self.geo_at(x, y + 1) {
                    let d = measure.distance(lon, lat).sqrt();
                    if d > 0.0 && d.is_finite() {
                        heights.push(d);
                    }
                }
            }
        }
        (widths, heights)
    }
}

/// Up to `LATTICE_SIZE` distinct positions spread over `0..count`
fn lattice(count: usize) -> Vec<usize> {
    if count <= LATTICE_SIZE {
        return (0..count).collect();
    }
    (0..LATTICE_SIZE)
        .map(|i| i * (count - 1) / (LATTICE_SIZE - 1))
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FnSampleSource;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_regular_grid_at_equator() {
        let lon = FnSampleSource::new(200, 100, |x, _| x as f64 * 0.01);
        let lat = FnSampleSource::new(200, 100, |_, y| y as f64 * -0.02);
        let dimension = estimate_pixel_dimension(&lon, &lat, None).unwrap();

        assert_abs_diff_eq!(dimension.width, 0.01, epsilon = 1e-5);
        assert_abs_diff_eq!(dimension.height, 0.02, epsilon = 1e-9);
        assert_abs_diff_eq!(dimension.diagonal_squared(), 5e-4, epsilon = 1e-7);
    }

    #[test]
    fn test_narrow_valid_strip_between_lattice_columns() {
        let lon = FnSampleSource::new(200, 100, |x, _| x as f64 * 0.01);
        let lat = FnSampleSource::new(200, 100, |_, y| y as f64 * -0.02);
        // lattice columns are 0, 22, 44, ...; none falls inside 30..=40
        let mask = FnSampleSource::new(200, 100, |x, _| if (30..=40).contains(&x) { 1.0 } else { 0.0 });
        let dimension = estimate_pixel_dimension(&lon, &lat, Some(&mask)).unwrap();

        assert_abs_diff_eq!(dimension.width, 0.01, epsilon = 1e-5);
        assert_abs_diff_eq!(dimension.height, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_masked_and_degenerate_rasters() {
        let lon = FnSampleSource::new(20, 20, |x, _| x as f64);
        let lat = FnSampleSource::new(20, 20, |_, y| y as f64);
        let mask = FnSampleSource::new(20, 20, |_, _| 0.0);
        assert!(estimate_pixel_dimension(&lon, &lat, Some(&mask)).is_none());

        let lon = FnSampleSource::new(1, 20, |x, _| x as f64);
        let lat = FnSampleSource::new(1, 20, |_, y| y as f64);
        assert!(estimate_pixel_dimension(&lon, &lat, None).is_none());
    }
}
