use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::db_connect::PgPool;
use crate::error::DashboardError;
use crate::filters::PredicateSet;
use crate::models::Record;
use crate::schema::{qualified_table, NUMERIC_COLUMNS, TEXT_COLUMNS};

/// Read-only source of records that answers exact-match filtered queries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch(&self, predicates: &PredicateSet) -> Result<Vec<Record>, DashboardError>;

    async fn fetch_all(&self) -> Result<Vec<Record>, DashboardError> {
        self.fetch(&PredicateSet::new()).await
    }
}

/// Whole dataset held in memory, filtered per request.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Vec<Record>>,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        MemoryStore {
            records: Arc::new(records),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, predicates: &PredicateSet) -> Result<Vec<Record>, DashboardError> {
        Ok(self
            .records
            .iter()
            .filter(|r| predicates.matches(r))
            .cloned()
            .collect())
    }
}

/// Parses a JSON array of raw dataset entries into cleaned records.
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let records: Vec<Record> = serde_json::from_str(json).context("Dataset is not a JSON array of records")?;
    Ok(records)
}

/// Loads the JSON dataset file from disk.
pub async fn load_json_file(path: &Path) -> Result<Vec<Record>> {
    info!("Loading dataset from {:?}", path);
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read dataset file {:?}", path))?;
    let records = parse_records(&raw).with_context(|| format!("Failed to parse dataset file {:?}", path))?;
    info!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Records table in PostgreSQL. Predicates are pushed down into the `WHERE` clause.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
    table: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>, table: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
            table: table.into(),
        }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch(&self, predicates: &PredicateSet) -> Result<Vec<Record>, DashboardError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DashboardError::Store(format!("Failed to get DB client: {}", e)))?;

        let (query, values) = select_records_query(&self.schema, &self.table, predicates);
        debug!("Fetching records with query: {} {:?}", query, values);
        let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let rows = client
            .query(&query, &params)
            .await
            .map_err(|e| DashboardError::Store(format!("Record query failed: {}", e)))?;

        Ok(rows.iter().map(record_from_row).collect())
    }
}

/// Full `SELECT` for the records matching `predicates`, with its bind values.
pub fn select_records_query(schema: &str, table: &str, predicates: &PredicateSet) -> (String, Vec<String>) {
    let (where_clause, params) = create_predicate_clause(predicates, 1);
    let columns: Vec<&str> = TEXT_COLUMNS.iter().chain(NUMERIC_COLUMNS.iter()).copied().collect();
    let query = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY id",
        columns.join(", "),
        qualified_table(schema, table),
        where_clause
    );
    (query, params)
}

/// Builds a parameterized `WHERE` fragment for the predicate set, numbering
/// placeholders from `param_start_index`. An empty set yields `1=1`.
pub fn create_predicate_clause(predicates: &PredicateSet, param_start_index: usize) -> (String, Vec<String>) {
    if predicates.is_empty() {
        return ("1=1".to_string(), vec![]);
    }

    let mut conditions = Vec::with_capacity(predicates.len());
    let mut params = Vec::with_capacity(predicates.len());
    for (offset, (field, value)) in predicates.iter().enumerate() {
        conditions.push(format!("{} = ${}", field.column(), param_start_index + offset));
        params.push(value.to_string());
    }
    (conditions.join(" AND "), params)
}

fn text(row: &Row, column: &str) -> String {
    row.try_get::<_, Option<String>>(column).ok().flatten().unwrap_or_default()
}

fn number(row: &Row, column: &str) -> f64 {
    row.try_get::<_, Option<f64>>(column).ok().flatten().unwrap_or(0.0)
}

fn record_from_row(row: &Row) -> Record {
    Record {
        end_year: text(row, "end_year"),
        start_year: text(row, "start_year"),
        intensity: number(row, "intensity"),
        likelihood: number(row, "likelihood"),
        relevance: number(row, "relevance"),
        sector: text(row, "sector"),
        topic: text(row, "topic"),
        region: text(row, "region"),
        country: text(row, "country"),
        city: text(row, "city"),
        source: text(row, "source"),
        pestle: text(row, "pestle"),
        title: text(row, "title"),
        insight: text(row, "insight"),
        url: text(row, "url"),
        impact: text(row, "impact"),
        published: text(row, "published"),
        added: text(row, "added"),
    }
}
