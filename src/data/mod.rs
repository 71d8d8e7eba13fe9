//! Input data structures: feature matrix, outcome table, gene sets

mod align;
mod feature_matrix;
mod gene_set;
mod outcome;

pub use align::align_samples;
pub(crate) use feature_matrix::ensure_unique;
pub use feature_matrix::FeatureMatrix;
pub use gene_set::GeneSet;
pub use outcome::{Covariate, CovariateKind, OutcomeRecord, OutcomeTable};
