//! Input/output adapters for tab-separated files

mod results;
mod tsv;

pub use results::ScanSummary;
pub use tsv::{
    read_annotations, read_feature_matrix, read_gene_list, read_outcome_table, write_enrichment_results, write_gene_list,
    write_scan_results, CovariateSpec, CovariateType,
};
