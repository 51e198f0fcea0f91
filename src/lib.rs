//! swathgeo: pixel ↔ geo mapping for swath rasters geolocated by per-pixel
//! longitude/latitude bands.
//!
//! The image is split into tiles and each tile gets a local rational-function
//! approximation fitted in a rotated frame centered on the tile. Approximate pixel
//! positions from these models are refined to the nearest pixel by a bounded local
//! search over the lon/lat rasters.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{GeoError, GeoPos, GeoResult, PixelPos, Rectangle, SamplePoint};

pub use io::{ArraySampleSource, FnSampleSource, SampleSource, SharedSource};

pub use crate::core::{
    DefaultPixelFinder, EstimatorParams, GeoCodingParams, InverseModels, PixelGeoCoding,
    PixelPosEstimator, Tiling,
};
