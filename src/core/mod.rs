//! Geolocation modules: rotation, model fitting, tiling and queries

pub mod rotator;
pub mod distance;
pub mod rational;
pub mod stepping;
pub mod approximation;
pub mod pixel_dimension;
pub mod estimator;
pub mod pixel_finder;
pub mod geocoding;

// Re-export main types
pub use rotator::{calculate_center, Rotator};
pub use distance::{CosineDistance, SinusoidalDistance};
pub use rational::{find_best_model, RationalFunctionModel};
pub use stepping::{create_stepping, extract_sample_points, Stepping, MAX_POINT_COUNT_PER_TILE};
pub use approximation::{find_by_pixel, find_most_suitable, Approximation, InverseModels, INVERSE_ACCURACY};
pub use pixel_dimension::{estimate_pixel_dimension, PixelDimension};
pub use estimator::{EstimatorParams, PixelPosEstimator, Tiling};
pub use pixel_finder::DefaultPixelFinder;
pub use geocoding::{GeoCodingParams, PixelGeoCoding};
