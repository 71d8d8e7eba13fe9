//! rust_genescan command-line interface

use clap::Parser;
use log::{info, warn, LevelFilter};

use rust_genescan::cli::{Cli, Commands};
use rust_genescan::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Scan {
            matrix,
            outcome,
            covariate,
            model,
            ties,
            adjust,
            alpha,
            output,
            threshold,
            direction,
            max_padj,
            gene_set,
            config,
            timeout,
            threads,
        }) => {
            configure_threads(threads);
            run_scan(ScanArgs {
                matrix_path: &matrix,
                outcome_path: &outcome,
                covariates: &covariate,
                model: &model,
                ties: ties.as_deref(),
                adjust: adjust.as_deref(),
                alpha,
                output_path: &output,
                threshold,
                direction: &direction,
                max_padj,
                gene_set_path: gene_set.as_deref(),
                config_path: config.as_deref(),
                timeout,
            })
        }
        Some(Commands::Enrich {
            foreground,
            universe,
            annotations,
            category,
            p_threshold,
            q_threshold,
            min_term_size,
            max_term_size,
            adjust,
            output,
            config,
            timeout,
            threads,
        }) => {
            configure_threads(threads);
            run_enrich(EnrichArgs {
                foreground_path: &foreground,
                universe_path: &universe,
                annotations_path: &annotations,
                category: &category,
                p_threshold,
                q_threshold,
                min_term_size,
                max_term_size,
                adjust: adjust.as_deref(),
                output_path: &output,
                config_path: config.as_deref(),
                timeout,
            })
        }
        None => {
            println!("rust_genescan v{}", VERSION);
            println!("Run `rust_genescan --help` for usage.");
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }
}

fn load_config(path: Option<&str>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            AnalysisConfig::from_json_file(path)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn parse_ties(s: &str) -> Result<TieMethod> {
    match s.to_ascii_lowercase().as_str() {
        "efron" => Ok(TieMethod::Efron),
        "breslow" => Ok(TieMethod::Breslow),
        _ => Err(GenescanError::InvalidInput {
            reason: format!("Unknown tie method '{}'. Use 'efron' or 'breslow'.", s),
        }),
    }
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s.to_ascii_lowercase().as_str() {
        "positive" | "up" => Ok(Direction::Positive),
        "negative" | "down" => Ok(Direction::Negative),
        "absolute" | "both" => Ok(Direction::Absolute),
        _ => Err(GenescanError::InvalidInput {
            reason: format!("Unknown direction '{}'. Use positive, negative or absolute.", s),
        }),
    }
}

struct ScanArgs<'a> {
    matrix_path: &'a str,
    outcome_path: &'a str,
    covariates: &'a [String],
    model: &'a str,
    ties: Option<&'a str>,
    adjust: Option<&'a str>,
    alpha: f64,
    output_path: &'a str,
    threshold: Option<f64>,
    direction: &'a str,
    max_padj: Option<f64>,
    gene_set_path: Option<&'a str>,
    config_path: Option<&'a str>,
    timeout: Option<f64>,
}

fn run_scan(args: ScanArgs<'_>) -> Result<()> {
    let mut config = load_config(args.config_path)?;
    if let Some(ties) = args.ties {
        config.scan.ties = parse_ties(ties)?;
    }
    if let Some(adjust) = args.adjust {
        config.adjust_method = adjust.parse()?;
    }
    if args.timeout.is_some() {
        config.scan.timeout_secs = args.timeout;
    }
    if let Some(value) = args.threshold {
        config.thresholds = vec![ThresholdSpec {
            name: "foreground".to_string(),
            value,
            direction: parse_direction(args.direction)?,
            max_padj: args.max_padj,
        }];
    }

    let specs = args
        .covariates
        .iter()
        .map(|s| s.parse::<CovariateSpec>())
        .collect::<Result<Vec<_>>>()?;
    let covariate_names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();

    info!("Loading feature matrix from: {}", args.matrix_path);
    let matrix = read_feature_matrix(args.matrix_path)?;
    info!("Loading outcome table from: {}", args.outcome_path);
    let outcome = read_outcome_table(args.outcome_path, &specs)?;

    let control = RunControl::from_timeout_secs(config.scan.timeout_secs);
    let scanned = match args.model.to_ascii_lowercase().as_str() {
        "linear" | "ols" => scan(&outcome, &matrix, &covariate_names, &config.scan, &control)?,
        "cox" | "coxph" => scan_survival(&outcome, &matrix, &covariate_names, &config.scan, &control)?,
        other => {
            return Err(GenescanError::InvalidInput {
                reason: format!("Unknown model '{}'. Use 'linear' or 'cox'.", other),
            })
        }
    };

    let adjusted = adjust_results(&scanned.results, config.adjust_method);
    let ranked = rank(&adjusted, RankBy::PValue);

    info!("Writing results to: {}", args.output_path);
    write_scan_results(args.output_path, &ranked, scanned.model)?;

    for spec in &config.thresholds {
        let set = threshold(&adjusted, spec);
        match args.gene_set_path {
            Some(path) if config.thresholds.len() == 1 => {
                info!("Writing gene set '{}' to: {}", set.name(), path);
                write_gene_list(path, &set)?;
            }
            Some(path) => {
                let path = format!("{}.{}", path, set.name());
                info!("Writing gene set '{}' to: {}", set.name(), path);
                write_gene_list(&path, &set)?;
            }
            None => info!("Gene set '{}': {} features", set.name(), set.len()),
        }
    }

    let summary = ScanSummary::new(&scanned, &adjusted, args.alpha);
    println!("\n{}", summary);

    if scanned.interrupted {
        warn!("Results are partial: the run was interrupted before every feature was fitted");
    }
    Ok(())
}

struct EnrichArgs<'a> {
    foreground_path: &'a str,
    universe_path: &'a str,
    annotations_path: &'a str,
    category: &'a str,
    p_threshold: Option<f64>,
    q_threshold: Option<f64>,
    min_term_size: Option<usize>,
    max_term_size: Option<usize>,
    adjust: Option<&'a str>,
    output_path: &'a str,
    config_path: Option<&'a str>,
    timeout: Option<f64>,
}

fn run_enrich(args: EnrichArgs<'_>) -> Result<()> {
    let mut params = load_config(args.config_path)?.enrichment;
    if let Some(p) = args.p_threshold {
        params.p_threshold = p;
    }
    if let Some(q) = args.q_threshold {
        params.q_threshold = q;
    }
    if let Some(min) = args.min_term_size {
        params.min_term_size = min;
    }
    if args.max_term_size.is_some() {
        params.max_term_size = args.max_term_size;
    }
    if let Some(adjust) = args.adjust {
        params.adjust_method = adjust.parse()?;
    }
    if args.timeout.is_some() {
        params.timeout_secs = args.timeout;
    }

    let foreground = read_gene_list(args.foreground_path, "foreground")?;
    let universe = read_gene_list(args.universe_path, "universe")?;
    info!("Loading annotations from: {}", args.annotations_path);
    let annotations = read_annotations(args.annotations_path)?;
    let cache = AnnotationCache::new(annotations);

    let control = RunControl::from_timeout_secs(params.timeout_secs);
    let outcome = run_enrichment(&foreground, &universe, &cache, args.category, &params, &control)?;

    info!("Writing results to: {}", args.output_path);
    write_enrichment_results(args.output_path, &outcome.results)?;

    println!(
        "\n{} of {} tested terms enriched (p <= {}, padj <= {})",
        outcome.results.len(),
        outcome.n_tested,
        params.p_threshold,
        params.q_threshold
    );
    for r in outcome.results.iter().take(10) {
        println!(
            "  {}\t{}\t{}/{}\tpadj={:.3e}\t{}",
            r.term_id, r.category, r.overlap, r.term_size, r.padj, r.description
        );
    }

    if outcome.interrupted {
        warn!(
            "Results are partial: {} terms were not tested before the run was interrupted",
            outcome.not_run.len()
        );
    }
    Ok(())
}
