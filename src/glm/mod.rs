//! Linear model fitting for per-feature scans

mod design;
pub mod linalg;
mod ols;

pub use design::CovariateDesign;
pub use ols::{fit_feature_ols, ols, FeatureFit, OlsFit};
