//! Cox proportional hazards fitting for per-feature survival scans

mod cox;

pub use cox::{cox_ph, fit_feature_cox, CoxFit};
