// private sub-module defined in other files
mod gaussian_filter;
mod outlier_clip;
mod resample;

// exports identifiers from private sub-modules in the current module namespace
pub use self::gaussian_filter::GaussianFilter;
pub use self::outlier_clip::{quartiles, OutlierClip};
pub use self::resample::{Resample, ResampleMethod, TargetResolution};
