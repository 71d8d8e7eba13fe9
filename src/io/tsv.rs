//! Tab-separated readers and writers for matrices, outcome tables, gene lists,
//! annotations and results

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::{debug, info, warn};

use crate::data::{FeatureMatrix, GeneSet, OutcomeTable};
use crate::enrichment::{AnnotationTerm, Category, EnrichmentResult, InMemoryAnnotations};
use crate::error::{GenescanError, Result};
use crate::ranking::AdjustedResult;
use crate::scan::ModelKind;

const MISSING: &str = "NA";

fn tsv_reader(file: File) -> csv::Reader<File> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(file)
}

fn is_missing(field: &str) -> bool {
    field.is_empty() || field.eq_ignore_ascii_case("NA") || field.eq_ignore_ascii_case("NaN")
}

fn parse_value(field: &str, what: &str) -> Result<f64> {
    if is_missing(field) {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|_| GenescanError::InvalidInput {
        reason: format!("Invalid {} value: '{}'", what, field),
    })
}

fn parse_event(field: &str) -> Result<Option<bool>> {
    if is_missing(field) {
        return Ok(None);
    }
    match field.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "dead" | "event" => Ok(Some(true)),
        "0" | "false" | "no" | "alive" | "censored" => Ok(Some(false)),
        _ => Err(GenescanError::InvalidInput {
            reason: format!("Invalid event indicator: '{}'", field),
        }),
    }
}

fn column_index(headers: &StringRecord, name: &str, file_kind: &str) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| GenescanError::InvalidInput {
        reason: format!("{} is missing required column '{}'", file_kind, name),
    })
}

/// Read a feature matrix: first column feature ids, header row sample ids.
/// `NA`, `NaN` and empty cells are missing.
pub fn read_feature_matrix<P: AsRef<Path>>(path: P) -> Result<FeatureMatrix> {
    let mut reader = tsv_reader(File::open(path)?);
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(GenescanError::InvalidInput {
            reason: "Feature matrix header needs an id column and at least one sample".to_string(),
        });
    }
    let sample_ids: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let feature_id = record.get(0).unwrap_or_default().to_string();
        let values = record
            .iter()
            .skip(1)
            .map(|field| parse_value(field, "feature"))
            .collect::<Result<Vec<f64>>>()?;
        rows.push((feature_id, values));
    }

    if rows.is_empty() {
        return Err(GenescanError::EmptyData {
            reason: "No features found in matrix".to_string(),
        });
    }

    let matrix = FeatureMatrix::from_rows(rows, sample_ids)?;
    info!(
        "Loaded feature matrix: {} features x {} samples",
        matrix.n_features(),
        matrix.n_samples()
    );
    Ok(matrix)
}

/// How an outcome-table column enters the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CovariateType {
    Continuous,
    /// Levels in reference-first order. `None` takes the sorted distinct values.
    Categorical(Option<Vec<String>>),
}

/// Declaration of one covariate column, written `name:continuous` or
/// `name:categorical[:ref,level2,...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovariateSpec {
    pub name: String,
    pub kind: CovariateType,
}

impl FromStr for CovariateSpec {
    type Err = GenescanError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        let kind = parts.next().map(str::trim);
        let levels = parts.next();

        if name.is_empty() {
            return Err(GenescanError::InvalidInput {
                reason: format!("Covariate declaration '{}' has no name", s),
            });
        }
        let Some(kind) = kind else {
            return Err(GenescanError::InvalidInput {
                reason: format!(
                    "Covariate '{}' has no type. Use {}:continuous or {}:categorical",
                    name, name, name
                ),
            });
        };

        let kind = match (kind.to_ascii_lowercase().as_str(), levels) {
            ("continuous" | "numeric", None) => CovariateType::Continuous,
            ("categorical" | "factor", None) => CovariateType::Categorical(None),
            ("categorical" | "factor", Some(levels)) => {
                CovariateType::Categorical(Some(levels.split(',').map(|l| l.trim().to_string()).collect()))
            }
            _ => {
                return Err(GenescanError::InvalidInput {
                    reason: format!(
                        "Invalid covariate declaration '{}'. Use name:continuous or name:categorical[:ref,level,...]",
                        s
                    ),
                })
            }
        };

        Ok(Self {
            name: name.to_string(),
            kind,
        })
    }
}

/// Read an outcome table with `sample_id`, `time` and `event` columns.
/// Only the declared covariate columns are loaded; others are ignored.
pub fn read_outcome_table<P: AsRef<Path>>(path: P, covariates: &[CovariateSpec]) -> Result<OutcomeTable> {
    let mut reader = tsv_reader(File::open(path)?);
    let headers = reader.headers()?.clone();

    let id_col = column_index(&headers, "sample_id", "Outcome table")?;
    let time_col = column_index(&headers, "time", "Outcome table")?;
    let event_col = column_index(&headers, "event", "Outcome table")?;
    let cov_cols = covariates
        .iter()
        .map(|spec| column_index(&headers, &spec.name, "Outcome table"))
        .collect::<Result<Vec<usize>>>()?;

    let ignored: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| ![id_col, time_col, event_col].contains(i) && !cov_cols.contains(i))
        .map(|(_, h)| h)
        .collect();
    if !ignored.is_empty() {
        debug!("Ignoring undeclared outcome columns: {:?}", ignored);
    }

    let mut sample_ids = Vec::new();
    let mut times = Vec::new();
    let mut events = Vec::new();
    let mut raw_covariates: Vec<Vec<String>> = vec![Vec::new(); covariates.len()];

    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default();
        sample_ids.push(field(id_col).to_string());
        times.push(parse_value(field(time_col), "time")?);
        events.push(parse_event(field(event_col))?);
        for (values, &col) in raw_covariates.iter_mut().zip(&cov_cols) {
            values.push(field(col).to_string());
        }
    }

    if sample_ids.is_empty() {
        return Err(GenescanError::EmptyData {
            reason: "No samples found in outcome table".to_string(),
        });
    }

    let mut table = OutcomeTable::new(sample_ids, times, events)?;
    for (spec, raw) in covariates.iter().zip(raw_covariates) {
        match &spec.kind {
            CovariateType::Continuous => {
                let values = raw
                    .iter()
                    .map(|v| parse_value(v, &spec.name))
                    .collect::<Result<Vec<f64>>>()?;
                table.add_continuous(&spec.name, values)?;
            }
            CovariateType::Categorical(levels) => {
                let values: Vec<Option<String>> =
                    raw.into_iter().map(|v| if is_missing(&v) { None } else { Some(v) }).collect();
                let levels = match levels {
                    Some(levels) => levels.clone(),
                    None => values.iter().flatten().cloned().collect::<BTreeSet<_>>().into_iter().collect(),
                };
                debug!("Covariate '{}' levels {:?} (reference '{}')", spec.name, levels, levels.first().map(String::as_str).unwrap_or(""));
                table.add_categorical(&spec.name, levels, values)?;
            }
        }
    }

    info!(
        "Loaded outcome table: {} samples, {} covariates",
        table.n_samples(),
        covariates.len()
    );
    Ok(table)
}

/// Read a gene list, one identifier per line. Blank lines and `#` comments are skipped.
pub fn read_gene_list<P: AsRef<Path>>(path: P, name: &str) -> Result<GeneSet> {
    let reader = BufReader::new(File::open(path)?);
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        ids.push(id.to_string());
    }

    let n_lines = ids.len();
    let set = GeneSet::new(name, ids);
    if set.len() < n_lines {
        warn!(
            "Gene list '{}': {} duplicate identifiers collapsed",
            name,
            n_lines - set.len()
        );
    }
    Ok(set)
}

/// Write a gene set, one identifier per line in sorted order.
pub fn write_gene_list<P: AsRef<Path>>(path: P, set: &GeneSet) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "# {}", set.name())?;
    for id in set.iter() {
        writeln!(file, "{}", id)?;
    }
    Ok(())
}

/// Read an annotation table with one `term_id, category, description,
/// feature_id` row per term membership.
pub fn read_annotations<P: AsRef<Path>>(path: P) -> Result<InMemoryAnnotations> {
    let mut reader = tsv_reader(File::open(path)?);
    let headers = reader.headers()?.clone();

    let term_col = column_index(&headers, "term_id", "Annotation table")?;
    let category_col = column_index(&headers, "category", "Annotation table")?;
    let description_col = column_index(&headers, "description", "Annotation table")?;
    let feature_col = column_index(&headers, "feature_id", "Annotation table")?;

    let mut terms: Vec<AnnotationTerm> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default();
        let term_id = field(term_col);
        let category: Category = field(category_col).parse()?;
        let feature_id = field(feature_col);

        match index.get(term_id) {
            Some(&i) => {
                let term = &mut terms[i];
                if term.category != category {
                    return Err(GenescanError::InvalidInput {
                        reason: format!(
                            "Term '{}' listed under both {} and {}",
                            term_id, term.category, category
                        ),
                    });
                }
                if !feature_id.is_empty() {
                    term.features.insert(feature_id.to_string());
                }
            }
            None => {
                index.insert(term_id.to_string(), terms.len());
                let features: Vec<&str> = if feature_id.is_empty() { vec![] } else { vec![feature_id] };
                terms.push(AnnotationTerm::new(term_id, field(description_col), category, features));
            }
        }
    }

    info!("Loaded {} annotation terms", terms.len());
    InMemoryAnnotations::new(terms)
}

fn format_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.6e}", v),
        None => MISSING.to_string(),
    }
}

/// Write adjusted scan results, one row per feature.
pub fn write_scan_results<P: AsRef<Path>>(path: P, results: &[AdjustedResult], model: ModelKind) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let effect = match model {
        ModelKind::LinearRegression => "slope",
        ModelKind::CoxPh => "log_hazard_ratio",
    };
    writer.write_record([
        "feature_id",
        effect,
        "std_error",
        "statistic",
        "pvalue",
        "padj",
        "n_obs",
        "status",
    ])?;

    for r in results {
        let status = match &r.result.failure {
            Some(failure) => failure.to_string(),
            None => "ok".to_string(),
        };
        writer.write_record([
            r.result.feature_id.clone(),
            format_opt(r.result.slope),
            format_opt(r.result.std_error),
            format_opt(r.result.statistic),
            format_opt(r.result.pvalue),
            format_opt(r.padj),
            r.result.n_obs.to_string(),
            status,
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write enrichment results in their reported order.
pub fn write_enrichment_results<P: AsRef<Path>>(path: P, results: &[EnrichmentResult]) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    writer.write_record([
        "term_id",
        "category",
        "description",
        "overlap",
        "term_size",
        "foreground_size",
        "universe_size",
        "expected",
        "fold_enrichment",
        "pvalue",
        "ln_pvalue",
        "padj",
        "genes",
    ])?;

    for r in results {
        writer.write_record([
            r.term_id.clone(),
            r.category.to_string(),
            r.description.clone(),
            r.overlap.to_string(),
            r.term_size.to_string(),
            r.foreground_size.to_string(),
            r.universe_size.to_string(),
            format!("{:.4}", r.expected),
            format!("{:.4}", r.fold_enrichment),
            format!("{:.6e}", r.pvalue),
            format!("{:.6}", r.ln_pvalue),
            format!("{:.6e}", r.padj),
            r.genes.join(","),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
