//! Command-line interface for rust_genescan

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_genescan")]
#[command(version)]
#[command(about = "Per-feature association scans and gene set enrichment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit one model per feature against an outcome
    #[command(
        about = "Fit one model per feature against an outcome",
        long_about = "Fit one model per feature against an outcome\n\n\
            Each row of the feature matrix is tested independently: either\n\
            time ~ covariates + feature by least squares, or a Cox proportional\n\
            hazards model on (time, event). P-values are adjusted across all\n\
            fitted features. Features whose fit fails are reported with NA values\n\
            and a status message.",
        after_long_help = "\
Examples:
  # Linear scan of every feature against the outcome time column
  rust_genescan scan -m expression.tsv -u outcome.tsv -o scan.tsv

  # Cox scan adjusted for age and tumour grade (G1 as reference)
  rust_genescan scan -m expression.tsv -u outcome.tsv --model cox \\
    --covariate age:continuous --covariate grade:categorical:G1,G2,G3

  # Also write the features with |log HR| >= 0.5 and padj <= 0.05 as a gene list
  rust_genescan scan -m expression.tsv -u outcome.tsv --model cox \\
    --threshold 0.5 --max-padj 0.05 --gene-set foreground.txt"
    )]
    Scan {
        /// Feature matrix TSV (features x samples)
        #[arg(short, long,
            long_help = "Feature matrix TSV.\n\
                Format: first column = feature IDs, header row = sample IDs.\n\
                NA, NaN or empty cells are treated as missing.")]
        matrix: String,

        /// Outcome table TSV
        #[arg(short = 'u', long,
            long_help = "Outcome table TSV with sample_id, time and event columns.\n\
                event accepts 1/0, true/false or yes/no; NA marks a missing value.\n\
                Additional columns are only used when declared with --covariate.")]
        outcome: String,

        /// Covariate declaration (NAME:KIND)
        #[arg(long, value_name = "NAME:KIND",
            long_help = "Covariate column to adjust for. Can be given multiple times.\n\
                Formats: age:continuous, grade:categorical, grade:categorical:G1,G2,G3\n\
                The first listed level is the reference; without a list the levels\n\
                are sorted and the first is the reference.")]
        covariate: Vec<String>,

        /// Model: linear or cox [default: linear]
        #[arg(long, default_value = "linear")]
        model: String,

        /// Tie handling for the Cox model: efron or breslow
        #[arg(long)]
        ties: Option<String>,

        /// Multiple-testing correction: BH, bonferroni or none
        #[arg(long)]
        adjust: Option<String>,

        /// Adjusted p-value cutoff used in the printed summary
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        /// Output file path [default: scan_results.tsv]
        #[arg(short, long, default_value = "scan_results.tsv")]
        output: String,

        /// Effect-size cutoff for the derived gene set
        #[arg(long)]
        threshold: Option<f64>,

        /// Direction for --threshold: positive, negative or absolute
        #[arg(long, default_value = "absolute")]
        direction: String,

        /// Additional adjusted p-value cutoff for --threshold
        #[arg(long)]
        max_padj: Option<f64>,

        /// Write the thresholded features to this gene list
        #[arg(long, value_name = "PATH")]
        gene_set: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Stop starting new fits after this many seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },

    /// Test annotation terms for overrepresentation in a gene list
    #[command(
        about = "Test annotation terms for overrepresentation in a gene list",
        long_about = "Test annotation terms for overrepresentation in a gene list\n\n\
            Each term is scored with the hypergeometric upper tail of its overlap\n\
            with the foreground, relative to the universe. P-values are adjusted\n\
            across all tested terms and only terms passing both cutoffs are written.",
        after_long_help = "\
Examples:
  rust_genescan enrich -f foreground.txt -U universe.txt -a go_annotations.tsv \\
    --category BP -o enrichment.tsv"
    )]
    Enrich {
        /// Foreground gene list (one ID per line)
        #[arg(short, long)]
        foreground: String,

        /// Universe gene list (one ID per line)
        #[arg(short = 'U', long)]
        universe: String,

        /// Annotation table TSV
        #[arg(short, long,
            long_help = "Annotation table TSV with columns term_id, category,\n\
                description and feature_id, one row per term member.\n\
                category is one of BP, MF, CC or KEGG.")]
        annotations: String,

        /// Category: BP, MF, CC, KEGG or ALL [default: ALL]
        #[arg(long, default_value = "ALL")]
        category: String,

        /// Raw p-value cutoff
        #[arg(long)]
        p_threshold: Option<f64>,

        /// Adjusted p-value cutoff
        #[arg(long)]
        q_threshold: Option<f64>,

        /// Smallest term size (members in the universe) tested
        #[arg(long)]
        min_term_size: Option<usize>,

        /// Largest term size (members in the universe) tested
        #[arg(long)]
        max_term_size: Option<usize>,

        /// Multiple-testing correction: BH, bonferroni or none
        #[arg(long)]
        adjust: Option<String>,

        /// Output file path [default: enrichment_results.tsv]
        #[arg(short, long, default_value = "enrichment_results.tsv")]
        output: String,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Stop starting new term tests after this many seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },
}
