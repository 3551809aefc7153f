use std::collections::BTreeSet;

use crate::error::DashboardError;
use crate::filters::{FilterField, PredicateSet};
use crate::models::{known, FilterOptions, Record};
use crate::record_store::RecordStore;

/// Which records the option lists are drawn from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OptionsScope {
    /// Every record. The HTTP endpoint always uses this scope so selecting a
    /// filter never removes the option that produced it.
    #[default]
    FullDataset,
    /// Only records matching the predicates (progressive narrowing).
    Narrowed(PredicateSet),
}

fn distinct(records: &[Record], field: FilterField) -> BTreeSet<&str> {
    records.iter().filter_map(|r| known(field.value_of(r))).collect()
}

fn sorted(records: &[Record], field: FilterField) -> Vec<String> {
    distinct(records, field).into_iter().map(str::to_string).collect()
}

/// Distinct known values per field. End years are newest first, every other
/// list is ascending.
pub fn collect_filter_options(records: &[Record]) -> FilterOptions {
    FilterOptions {
        end_years: distinct(records, FilterField::EndYear)
            .into_iter()
            .rev()
            .map(str::to_string)
            .collect(),
        topics: sorted(records, FilterField::Topic),
        sectors: sorted(records, FilterField::Sector),
        regions: sorted(records, FilterField::Region),
        pests: sorted(records, FilterField::Pest),
        sources: sorted(records, FilterField::Source),
        countries: sorted(records, FilterField::Country),
        cities: sorted(records, FilterField::City),
    }
}

pub async fn list_filter_options(store: &dyn RecordStore, scope: &OptionsScope) -> Result<FilterOptions, DashboardError> {
    let records = match scope {
        OptionsScope::FullDataset => store.fetch_all().await?,
        OptionsScope::Narrowed(predicates) => store.fetch(predicates).await?,
    };
    Ok(collect_filter_options(&records))
}
