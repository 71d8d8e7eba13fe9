//! Named, unordered collections of feature identifiers

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A named set of feature identifiers. Iteration order is sorted and stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSet {
    name: String,
    ids: BTreeSet<String>,
}

impl GeneSet {
    pub fn new<I, S>(name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    /// Identifiers in `self` that are absent from `other`, sorted.
    pub fn missing_from(&self, other: &GeneSet) -> Vec<String> {
        self.ids.difference(&other.ids).cloned().collect()
    }

    pub fn is_subset_of(&self, other: &GeneSet) -> bool {
        self.ids.is_subset(&other.ids)
    }

    /// Members of `self` that also appear in `ids`.
    pub fn intersect<'a, I>(&self, ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        ids.into_iter().filter(|id| self.ids.contains(*id)).cloned().collect()
    }
}
