//! Multiple-testing correction and p-value helpers

mod fdr;
mod pvalue;

pub use fdr::{adjust, benjamini_hochberg, bonferroni, AdjustMethod};
pub use pvalue::{normal_two_sided, student_t_two_sided};
