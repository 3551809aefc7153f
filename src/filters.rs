use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::DashboardError;
use crate::models::Record;

/// The eight fields a predicate set may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    EndYear,
    Topic,
    Sector,
    Region,
    Pest,
    Source,
    Country,
    City,
}

impl FilterField {
    pub const ALL: [FilterField; 8] = [
        FilterField::EndYear,
        FilterField::Topic,
        FilterField::Sector,
        FilterField::Region,
        FilterField::Pest,
        FilterField::Source,
        FilterField::Country,
        FilterField::City,
    ];

    /// Query-string key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            FilterField::EndYear => "end_year",
            FilterField::Topic => "topic",
            FilterField::Sector => "sector",
            FilterField::Region => "region",
            FilterField::Pest => "pest",
            FilterField::Source => "source",
            FilterField::Country => "country",
            FilterField::City => "city",
        }
    }

    /// Column holding this field in the records table.
    pub fn column(&self) -> &'static str {
        match self {
            FilterField::Pest => "pestle",
            other => other.key(),
        }
    }

    /// Parses a query key. `pestle` is accepted as the dataset's own name for `pest`.
    pub fn from_key(key: &str) -> Option<FilterField> {
        match key {
            "end_year" => Some(FilterField::EndYear),
            "topic" => Some(FilterField::Topic),
            "sector" => Some(FilterField::Sector),
            "region" => Some(FilterField::Region),
            "pest" | "pestle" => Some(FilterField::Pest),
            "source" => Some(FilterField::Source),
            "country" => Some(FilterField::Country),
            "city" => Some(FilterField::City),
            _ => None,
        }
    }

    pub fn value_of<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            FilterField::EndYear => &record.end_year,
            FilterField::Topic => &record.topic,
            FilterField::Sector => &record.sector,
            FilterField::Region => &record.region,
            FilterField::Pest => &record.pestle,
            FilterField::Source => &record.source,
            FilterField::Country => &record.country,
            FilterField::City => &record.city,
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Exact-match AND-filter over the recognized fields. An absent field is a wildcard.
///
/// Empty values are never stored, so two sets that constrain the same fields
/// to the same values compare equal regardless of how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredicateSet {
    constraints: BTreeMap<FilterField, String>,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style constraint. An empty value leaves the field unconstrained.
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    pub fn set(&mut self, field: FilterField, value: Option<String>) {
        match value {
            Some(v) if !v.trim().is_empty() => {
                self.constraints.insert(field, v);
            }
            _ => {
                self.constraints.remove(&field);
            }
        }
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.constraints.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.constraints.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Parses query-string pairs. Unrecognized keys fail with `InvalidFilterField`;
    /// keys with empty values are treated as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, DashboardError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut predicates = PredicateSet::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let field = FilterField::from_key(key)
                .ok_or_else(|| DashboardError::InvalidFilterField(key.to_string()))?;
            predicates.set(field, Some(value.into()));
        }
        Ok(predicates)
    }

    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, DashboardError> {
        Self::from_pairs(query.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.constraints
            .iter()
            .all(|(field, expected)| field.value_of(record) == expected)
    }

    /// Pairs to place on an outgoing request's query string.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        self.constraints
            .iter()
            .map(|(field, value)| (field.key(), value.clone()))
            .collect()
    }
}
