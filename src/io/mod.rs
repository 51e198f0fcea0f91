//! Raster access for longitude, latitude and mask samples

pub mod sample_source;

pub use sample_source::{
    check_same_extent, is_mask_valid, ArraySampleSource, FnSampleSource, SampleSource,
    SharedSource,
};
