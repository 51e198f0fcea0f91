use crate::types::{GeoError, GeoResult};
use ndarray::Array2;
use num_traits::ToPrimitive;
use std::sync::Arc;

/// Random-access reader over a longitude, latitude or mask raster.
///
/// Mask sources report non-zero for valid pixels. Implementations must be
/// `Sync`: the same source is read by tile fits and by queries.
pub trait SampleSource: Sync + Send {
    /// Raster width in pixels
    fn width(&self) -> usize;

    /// Raster height in pixels
    fn height(&self) -> usize;

    /// Sample value at integer pixel (x, y); callers stay inside the raster
    fn sample(&self, x: usize, y: usize) -> f64;

    /// Native tile size of the backing image, if it is tiled
    fn tile_size(&self) -> Option<(usize, usize)> {
        None
    }
}

/// Shared handle to a sample source
pub type SharedSource = Arc<dyn SampleSource>;

/// Whether pixel (x, y) is usable according to an optional mask
pub fn is_mask_valid(mask: Option<&dyn SampleSource>, x: usize, y: usize) -> bool {
    match mask {
        Some(mask) => mask.sample(x, y) != 0.0,
        None => true,
    }
}

/// Check that every source covers the same raster extent
pub fn check_same_extent(
    reference: &dyn SampleSource,
    others: &[(&str, &dyn SampleSource)],
) -> GeoResult<()> {
    let (width, height) = (reference.width(), reference.height());
    for (name, source) in others {
        if source.width() != width || source.height() != height {
            return Err(GeoError::SizeMismatch {
                name: name.to_string(),
                width,
                height,
                actual_width: source.width(),
                actual_height: source.height(),
            });
        }
    }
    Ok(())
}

/// Sample source over an in-memory ndarray raster, indexed `[[row, col]]`
#[derive(Debug, Clone)]
pub struct ArraySampleSource {
    data: Array2<f64>,
    tile_size: Option<(usize, usize)>,
}

impl ArraySampleSource {
    /// Wrap a raster of any primitive numeric type; unconvertible values become NaN
    pub fn new<T: ToPrimitive>(data: &Array2<T>) -> Self {
        Self {
            data: data.map(|value| value.to_f64().unwrap_or(f64::NAN)),
            tile_size: None,
        }
    }

    /// Wrap an `f64` raster without copying
    pub fn from_array(data: Array2<f64>) -> Self {
        Self {
            data,
            tile_size: None,
        }
    }

    /// Mask source from a boolean raster (true = valid)
    pub fn from_mask(mask: &Array2<bool>) -> Self {
        Self {
            data: mask.mapv(|valid| if valid { 1.0 } else { 0.0 }),
            tile_size: None,
        }
    }

    /// Declare a native tiling of the raster
    pub fn with_tile_size(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile_size = Some((tile_width.max(1), tile_height.max(1)));
        self
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_shared(self) -> SharedSource {
        Arc::new(self)
    }
}

impl SampleSource for ArraySampleSource {
    fn width(&self) -> usize {
        self.data.ncols()
    }

    fn height(&self) -> usize {
        self.data.nrows()
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        self.data[[y, x]]
    }

    fn tile_size(&self) -> Option<(usize, usize)> {
        self.tile_size
    }
}

/// Synthetic sample source computing each sample from its pixel indices
pub struct FnSampleSource<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    width: usize,
    height: usize,
    tile_size: Option<(usize, usize)>,
    function: F,
}

impl<F> FnSampleSource<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    pub fn new(width: usize, height: usize, function: F) -> Self {
        Self {
            width,
            height,
            tile_size: None,
            function,
        }
    }

    pub fn with_tile_size(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile_size = Some((tile_width.max(1), tile_height.max(1)));
        self
    }
}

impl<F> SampleSource for FnSampleSource<F>
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        (self.function)(x, y)
    }

    fn tile_size(&self) -> Option<(usize, usize)> {
        self.tile_size
    }
}
