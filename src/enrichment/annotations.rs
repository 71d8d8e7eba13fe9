//! Annotation terms and the sources that supply them

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{ensure_unique, GeneSet};
use crate::error::{GenescanError, Result};

/// Annotation vocabulary a term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// GO biological process
    #[serde(rename = "BP")]
    BiologicalProcess,
    /// GO molecular function
    #[serde(rename = "MF")]
    MolecularFunction,
    /// GO cellular component
    #[serde(rename = "CC")]
    CellularComponent,
    #[serde(rename = "KEGG")]
    Kegg,
}

impl Category {
    pub fn code(&self) -> &'static str {
        match self {
            Category::BiologicalProcess => "BP",
            Category::MolecularFunction => "MF",
            Category::CellularComponent => "CC",
            Category::Kegg => "KEGG",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = GenescanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BP" => Ok(Category::BiologicalProcess),
            "MF" => Ok(Category::MolecularFunction),
            "CC" => Ok(Category::CellularComponent),
            "KEGG" => Ok(Category::Kegg),
            _ => Err(GenescanError::UnsupportedCategory { name: s.to_string() }),
        }
    }
}

/// Which categories an enrichment run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn accepts(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("ALL"),
            CategoryFilter::Only(c) => c.fmt(f),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = GenescanError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// A named group of features from an annotation vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationTerm {
    pub id: String,
    pub description: String,
    pub category: Category,
    pub features: BTreeSet<String>,
}

impl AnnotationTerm {
    pub fn new<I, S>(id: impl Into<String>, description: impl Into<String>, category: Category, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            description: description.into(),
            category,
            features: features.into_iter().map(Into::into).collect(),
        }
    }
}

/// Supplies annotation terms for an enrichment run.
pub trait AnnotationSource: Send + Sync {
    /// Terms accepted by `filter` that share at least one feature with `universe`.
    fn lookup_terms(&self, filter: CategoryFilter, universe: &GeneSet) -> Result<Vec<AnnotationTerm>>;
}

/// Annotation terms held in memory, e.g. loaded from an annotation table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnnotations {
    terms: Vec<AnnotationTerm>,
}

impl InMemoryAnnotations {
    /// Rejects repeated term identifiers.
    pub fn new(terms: Vec<AnnotationTerm>) -> Result<Self> {
        let ids: Vec<String> = terms.iter().map(|t| t.id.clone()).collect();
        ensure_unique(&ids, "term")?;
        Ok(Self { terms })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[AnnotationTerm] {
        &self.terms
    }
}

impl AnnotationSource for InMemoryAnnotations {
    fn lookup_terms(&self, filter: CategoryFilter, universe: &GeneSet) -> Result<Vec<AnnotationTerm>> {
        Ok(self
            .terms
            .iter()
            .filter(|t| filter.accepts(t.category))
            .filter(|t| t.features.iter().any(|f| universe.contains(f)))
            .cloned()
            .collect())
    }
}

type CacheKey = (CategoryFilter, BTreeSet<String>);

/// Memoizes [`AnnotationSource::lookup_terms`] per (filter, universe) for the
/// lifetime of the cache.
pub struct AnnotationCache {
    source: Box<dyn AnnotationSource>,
    entries: Mutex<HashMap<CacheKey, Arc<Vec<AnnotationTerm>>>>,
}

impl AnnotationCache {
    pub fn new(source: impl AnnotationSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Terms for `filter` and `universe`, fetched from the source at most once.
    pub fn terms(&self, filter: CategoryFilter, universe: &GeneSet) -> Result<Arc<Vec<AnnotationTerm>>> {
        let key = (filter, universe.ids().clone());
        if let Some(hit) = self.lock().get(&key) {
            debug!("Annotation cache hit for {}", filter);
            return Ok(Arc::clone(hit));
        }

        let terms = Arc::new(self.source.lookup_terms(filter, universe)?);
        debug!("Loaded {} annotation terms for {}", terms.len(), filter);
        self.lock().insert(key, Arc::clone(&terms));
        Ok(terms)
    }

    /// Number of distinct lookups held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<Vec<AnnotationTerm>>>> {
        // a poisoned map still holds only complete entries
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
