use crate::core::approximation::{find_by_pixel, find_most_suitable, Approximation, InverseModels, INVERSE_ACCURACY};
use crate::core::pixel_dimension::estimate_pixel_dimension;
use crate::core::stepping::{create_stepping, extract_sample_points, MAX_POINT_COUNT_PER_TILE};
use crate::io::{check_same_extent, SampleSource};
use crate::types::{normalize_lon, GeoError, GeoPos, GeoResult, PixelPos, Rectangle};
use serde::{Deserialize, Serialize};

/// How the image is partitioned into approximation tiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tiling {
    /// One approximation for the whole image
    Single,
    /// One approximation per native tile of the longitude source (single tile if untiled)
    Native,
    /// Fixed tile size in pixels
    Fixed { tile_width: usize, tile_height: usize },
    /// Tiles sized so each spans at most `max_extent_deg` degrees, from the
    /// estimated pixel size
    AngularExtent { max_extent_deg: f64 },
}

/// Pixel position estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorParams {
    /// RMSE goal of the forward models, in pixels
    pub accuracy: f64,
    /// RMSE goal of the inverse models, in degrees
    pub inverse_accuracy: f64,
    /// Cap on sample points extracted per tile
    pub max_points_per_tile: usize,
    /// Tile partition strategy
    pub tiling: Tiling,
    /// Inverse model policy
    pub inverse: InverseModels,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            accuracy: 0.5,                          // half a pixel
            inverse_accuracy: INVERSE_ACCURACY,     // degrees
            max_points_per_tile: MAX_POINT_COUNT_PER_TILE,
            tiling: Tiling::Native,
            inverse: InverseModels::Required,
        }
    }
}

/// Piecewise rational-function estimator of the pixel ↔ geo mapping of a raster
/// geolocated by per-pixel longitude/latitude.
///
/// Construction never fails for lack of accuracy: when some tile cannot be
/// approximated the estimator has no approximations, [`can_estimate`] is false and
/// every query yields the invalid sentinel.
///
/// [`can_estimate`]: PixelPosEstimator::can_estimate
#[derive(Debug, Clone)]
pub struct PixelPosEstimator {
    approximations: Option<Vec<Approximation>>,
    width: usize,
    height: usize,
}

impl PixelPosEstimator {
    /// Build the approximation set for the given sources
    pub fn new(
        lon_source: &dyn SampleSource,
        lat_source: &dyn SampleSource,
        mask_source: Option<&dyn SampleSource>,
        params: &EstimatorParams,
    ) -> GeoResult<Self> {
        validate_params(params)?;

        let width = lon_source.width();
        let height = lon_source.height();
        if width < 2 || height < 2 {
            return Err(GeoError::InvalidRaster(format!(
                "Raster size {}x{} is too small, at least 2x2 is required",
                width, height
            )));
        }
        check_same_extent(lon_source, &[("latitude", lat_source)])?;
        if let Some(mask) = mask_source {
            check_same_extent(lon_source, &[("mask", mask)])?;
        }

        let rectangles = tile_rectangles(lon_source, lat_source, mask_source, &params.tiling);
        log::info!(
            "Building pixel position estimator for {}x{} raster with {} tile(s)",
            width,
            height,
            rectangles.len()
        );

        let approximations =
            create_approximations(lon_source, lat_source, mask_source, &rectangles, params);
        match &approximations {
            Some(approximations) => log::info!("Created {} approximation(s)", approximations.len()),
            None => log::warn!("No pixel position estimator available for this raster"),
        }

        Ok(Self {
            approximations,
            width,
            height,
        })
    }

    /// Whether the approximation set could be built
    pub fn can_estimate(&self) -> bool {
        self.approximations.is_some()
    }

    pub fn can_get_pixel_pos(&self) -> bool {
        self.can_estimate()
    }

    /// Whether pixel → geo queries can be answered (inverse models present in every tile)
    pub fn can_get_geo_pos(&self) -> bool {
        self.approximations
            .as_ref()
            .map_or(false, |approximations| approximations.iter().all(Approximation::has_inverse))
    }

    /// The approximation set, `None` if it could not be built
    pub fn approximations(&self) -> Option<&[Approximation]> {
        self.approximations.as_deref()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Approximate pixel position of a geo position.
    ///
    /// Invalid when the input is invalid, no approximation covers the position, or
    /// the estimate falls outside `[0, width] × [0, height]`.
    pub fn get_pixel_pos(&self, geo_pos: &GeoPos) -> PixelPos {
        let Some(approximations) = self.approximations.as_deref() else {
            return PixelPos::invalid();
        };
        if !geo_pos.is_valid() {
            return PixelPos::invalid();
        }

        let lat = geo_pos.lat;
        let lon = normalize_lon(geo_pos.lon);
        let Some(approximation) = find_most_suitable(approximations, lat, lon) else {
            return PixelPos::invalid();
        };

        let (rotated_lon, rotated_lat) = approximation.rotator().transform(lon, lat);
        let x = approximation.fx().value(rotated_lat, rotated_lon);
        if !(0.0..=self.width as f64).contains(&x) {
            return PixelPos::invalid();
        }
        let y = approximation.fy().value(rotated_lat, rotated_lon);
        if !(0.0..=self.height as f64).contains(&y) {
            return PixelPos::invalid();
        }
        PixelPos::new(x, y)
    }

    /// Approximate geo position of a pixel position, from the inverse models of the
    /// tile containing it.
    pub fn get_geo_pos(&self, pixel_pos: &PixelPos) -> GeoPos {
        let Some(approximations) = self.approximations.as_deref() else {
            return GeoPos::invalid();
        };
        if !pixel_pos.is_valid() {
            return GeoPos::invalid();
        }
        let Some(approximation) = find_by_pixel(approximations, pixel_pos) else {
            return GeoPos::invalid();
        };
        let (Some(flon), Some(flat)) = (approximation.flon(), approximation.flat()) else {
            return GeoPos::invalid();
        };

        let rotated_lon = flon.value(pixel_pos.x, pixel_pos.y);
        let rotated_lat = flat.value(pixel_pos.x, pixel_pos.y);
        let (lon, lat) = approximation.rotator().transform_inversely(rotated_lon, rotated_lat);
        GeoPos::new(lat, normalize_lon(lon))
    }
}

fn validate_params(params: &EstimatorParams) -> GeoResult<()> {
    if !(params.accuracy > 0.0) || !(params.inverse_accuracy > 0.0) {
        return Err(GeoError::InvalidParameter(format!(
            "Accuracy goals must be positive, got {} and {}",
            params.accuracy, params.inverse_accuracy
        )));
    }
    if params.max_points_per_tile == 0 {
        return Err(GeoError::InvalidParameter(
            "Point budget per tile must be at least 1".to_string(),
        ));
    }
    match params.tiling {
        Tiling::Fixed { tile_width, tile_height } if tile_width == 0 || tile_height == 0 => {
            Err(GeoError::InvalidParameter(format!(
                "Tile size {}x{} is empty",
                tile_width, tile_height
            )))
        }
        Tiling::AngularExtent { max_extent_deg } if !(max_extent_deg > 0.0) => {
            Err(GeoError::InvalidParameter(format!(
                "Maximum tile extent must be positive, got {}",
                max_extent_deg
            )))
        }
        _ => Ok(()),
    }
}

/// Partition the raster into tile rectangles in raster order
pub fn tile_rectangles(
    lon_source: &dyn SampleSource,
    lat_source: &dyn SampleSource,
    mask_source: Option<&dyn SampleSource>,
    tiling: &Tiling,
) -> Vec<Rectangle> {
    let width = lon_source.width();
    let height = lon_source.height();

    let (tile_width, tile_height) = match *tiling {
        Tiling::Single => (width, height),
        Tiling::Native => lon_source.tile_size().unwrap_or((width, height)),
        Tiling::Fixed { tile_width, tile_height } => (tile_width, tile_height),
        Tiling::AngularExtent { max_extent_deg } => {
            match estimate_pixel_dimension(lon_source, lat_source, mask_source) {
                Some(dimension) => (
                    tile_size_for_extent(max_extent_deg, dimension.width),
                    tile_size_for_extent(max_extent_deg, dimension.height),
                ),
                None => {
                    log::warn!("Pixel size unknown, using a single approximation tile");
                    (width, height)
                }
            }
        }
    };

    partition(width, height, tile_width, tile_height)
}

/// Tile size in pixels spanning at most `extent` degrees, never below 2 pixels
fn tile_size_for_extent(extent: f64, pixel_size: f64) -> usize {
    let size = (extent / pixel_size).floor();
    if size.is_finite() && size >= 2.0 {
        size as usize
    } else {
        2
    }
}

/// Split `width × height` into tiles of at most `tile_width × tile_height`, row by row
pub fn partition(width: usize, height: usize, tile_width: usize, tile_height: usize) -> Vec<Rectangle> {
    let tile_width = tile_width.clamp(1, width.max(1));
    let tile_height = tile_height.clamp(1, height.max(1));

    let mut rectangles = Vec::new();
    let mut y = 0;
    while y < height {
        let h = tile_height.min(height - y);
        let mut x = 0;
        while x < width {
            let w = tile_width.min(width - x);
            rectangles.push(Rectangle::new(x, y, w, h));
            x += w;
        }
        y += h;
    }
    rectangles
}

/// Build one approximation per rectangle; `None` as soon as any tile fails.
///
/// With the `parallel` feature the tiles are fitted concurrently; the result keeps
/// raster order either way.
pub fn create_approximations(
    lon_source: &dyn SampleSource,
    lat_source: &dyn SampleSource,
    mask_source: Option<&dyn SampleSource>,
    rectangles: &[Rectangle],
    params: &EstimatorParams,
) -> Option<Vec<Approximation>> {
    let build = |rectangle: &Rectangle| {
        let approximation = create_approximation(lon_source, lat_source, mask_source, rectangle, params);
        if approximation.is_none() {
            log::debug!("Approximation failed for tile {:?}", rectangle);
        }
        approximation
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        rectangles.par_iter().map(build).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        rectangles.iter().map(build).collect()
    }
}

/// Sample, then fit, a single tile
pub fn create_approximation(
    lon_source: &dyn SampleSource,
    lat_source: &dyn SampleSource,
    mask_source: Option<&dyn SampleSource>,
    rectangle: &Rectangle,
    params: &EstimatorParams,
) -> Option<Approximation> {
    let stepping = create_stepping(rectangle, params.max_points_per_tile);
    let points = extract_sample_points(lon_source, lat_source, mask_source, &stepping);
    Approximation::create(
        &points,
        params.accuracy,
        params.inverse_accuracy,
        params.inverse,
        *rectangle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FnSampleSource;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_partition_covers_raster() {
        let rectangles = partition(100, 70, 32, 32);
        assert_eq!(rectangles.len(), 4 * 3);
        assert_eq!(rectangles[0], Rectangle::new(0, 0, 32, 32));
        assert_eq!(rectangles[3], Rectangle::new(96, 0, 4, 32));
        assert_eq!(rectangles[11], Rectangle::new(96, 64, 4, 6));
        let area: usize = rectangles.iter().map(|r| r.width * r.height).sum();
        assert_eq!(area, 100 * 70);

        assert_eq!(partition(10, 10, 0, 100), partition(10, 10, 1, 10));
    }

    #[test]
    fn test_native_tiling_uses_source_tiles() {
        let lon = FnSampleSource::new(100, 100, |x, _| x as f64 * 0.01).with_tile_size(50, 25);
        let lat = FnSampleSource::new(100, 100, |_, y| y as f64 * 0.01);

        assert_eq!(tile_rectangles(&lon, &lat, None, &Tiling::Native).len(), 8);
        assert_eq!(tile_rectangles(&lon, &lat, None, &Tiling::Single).len(), 1);
    }

    #[test]
    fn test_angular_extent_tiling() {
        let lon = FnSampleSource::new(100, 100, |x, _| x as f64 * 0.01);
        let lat = FnSampleSource::new(100, 100, |_, y| y as f64 * 0.01);

        // 0.255 degrees spans 25 whole pixels of 0.01 degrees
        let rectangles = tile_rectangles(&lon, &lat, None, &Tiling::AngularExtent { max_extent_deg: 0.255 });
        assert_eq!(rectangles.len(), 16);
        assert!(rectangles.iter().all(|r| r.width <= 25 && r.height <= 25));
    }

    #[test]
    fn test_forward_and_inverse_queries() {
        let lon = FnSampleSource::new(60, 40, |x, y| 20.0 + (x as f64 + 0.5) * 0.02 + y as f64 * 0.001);
        let lat = FnSampleSource::new(60, 40, |_, y| -30.0 - (y as f64 + 0.5) * 0.02);
        let params = EstimatorParams {
            accuracy: 1e-3,
            tiling: Tiling::Fixed { tile_width: 30, tile_height: 20 },
            ..Default::default()
        };
        let estimator = PixelPosEstimator::new(&lon, &lat, None, &params).unwrap();
        assert!(estimator.can_estimate());
        assert!(estimator.can_get_geo_pos());
        assert_eq!(estimator.approximations().unwrap().len(), 4);

        let geo = GeoPos::new(-30.0 - 12.5 * 0.02, 20.0 + 40.5 * 0.02 + 12.0 * 0.001);
        let pixel = estimator.get_pixel_pos(&geo);
        assert_abs_diff_eq!(pixel.x, 40.5, epsilon = 0.01);
        assert_abs_diff_eq!(pixel.y, 12.5, epsilon = 0.01);

        let back = estimator.get_geo_pos(&PixelPos::new(40.5, 12.5));
        assert_abs_diff_eq!(back.lat, geo.lat, epsilon = 1e-3);
        assert_abs_diff_eq!(back.lon, geo.lon, epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_queries() {
        let lon = FnSampleSource::new(20, 20, |x, _| x as f64 * 0.1);
        let lat = FnSampleSource::new(20, 20, |_, y| y as f64 * 0.1);
        let estimator = PixelPosEstimator::new(&lon, &lat, None, &EstimatorParams::default()).unwrap();

        assert!(!estimator.get_pixel_pos(&GeoPos::new(f64::NAN, 1.0)).is_valid());
        assert!(!estimator.get_pixel_pos(&GeoPos::new(60.0, 60.0)).is_valid());
        assert!(!estimator.get_geo_pos(&PixelPos::invalid()).is_valid());
        assert!(!estimator.get_geo_pos(&PixelPos::new(-1.0, 5.0)).is_valid());
        assert!(!estimator.get_geo_pos(&PixelPos::new(5.0, 20.0)).is_valid());
    }

    #[test]
    fn test_failing_tile_fails_the_set() {
        let lon = FnSampleSource::new(40, 20, |x, _| x as f64 * 0.1);
        let lat = FnSampleSource::new(40, 20, |_, y| y as f64 * 0.1);
        // the right half is masked out entirely
        let mask = FnSampleSource::new(40, 20, |x, _| if x < 20 { 1.0 } else { 0.0 });
        let params = EstimatorParams {
            tiling: Tiling::Fixed { tile_width: 20, tile_height: 20 },
            ..Default::default()
        };

        let estimator = PixelPosEstimator::new(&lon, &lat, Some(&mask), &params).unwrap();
        assert!(!estimator.can_estimate());
        assert!(!estimator.can_get_geo_pos());
        assert!(!estimator.get_pixel_pos(&GeoPos::new(1.0, 1.0)).is_valid());
        assert!(!estimator.get_geo_pos(&PixelPos::new(1.0, 1.0)).is_valid());
    }

    #[test]
    fn test_construction_errors() {
        let lon = FnSampleSource::new(1, 20, |x, _| x as f64);
        let lat = FnSampleSource::new(1, 20, |_, y| y as f64);
        assert!(matches!(
            PixelPosEstimator::new(&lon, &lat, None, &EstimatorParams::default()),
            Err(GeoError::InvalidRaster(_))
        ));

        let lon = FnSampleSource::new(10, 10, |x, _| x as f64);
        let lat = FnSampleSource::new(10, 12, |_, y| y as f64);
        assert!(matches!(
            PixelPosEstimator::new(&lon, &lat, None, &EstimatorParams::default()),
            Err(GeoError::SizeMismatch { .. })
        ));

        let lat = FnSampleSource::new(10, 10, |_, y| y as f64);
        let params = EstimatorParams {
            accuracy: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            PixelPosEstimator::new(&lon, &lat, None, &params),
            Err(GeoError::InvalidParameter(_))
        ));
    }
}
