use anyhow::{Context, Result};
use log::{info, warn};
use tokio_postgres::Client;

use crate::db_connect::PgPool;
use crate::models::Record;

/// Text columns of the records table, in insert order.
pub const TEXT_COLUMNS: [&str; 15] = [
    "end_year",
    "start_year",
    "sector",
    "topic",
    "region",
    "country",
    "city",
    "source",
    "pestle",
    "title",
    "insight",
    "url",
    "impact",
    "published",
    "added",
];

/// Numeric columns of the records table, in insert order after the text columns.
pub const NUMERIC_COLUMNS: [&str; 3] = ["intensity", "likelihood", "relevance"];

pub fn qualified_table(schema: &str, table: &str) -> String {
    format!(r#""{}"."{}""#, schema, table)
}

/// Creates the schema and records table if they do not already exist.
pub async fn create_records_table(client: &Client, schema: &str, table: &str) -> Result<()> {
    info!("Ensuring schema '{}' exists...", schema);
    client
        .execute(&format!(r#"CREATE SCHEMA IF NOT EXISTS "{}";"#, schema), &[])
        .await
        .with_context(|| format!("Failed to create schema {}", schema))?;

    let mut columns: Vec<String> = vec!["id BIGSERIAL PRIMARY KEY".to_string()];
    columns.extend(TEXT_COLUMNS.iter().map(|c| format!("{} TEXT NOT NULL DEFAULT ''", c)));
    columns.extend(NUMERIC_COLUMNS.iter().map(|c| format!("{} DOUBLE PRECISION NOT NULL DEFAULT 0", c)));

    let query = format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        qualified_table(schema, table),
        columns.join(", ")
    );
    client
        .execute(&query, &[])
        .await
        .with_context(|| format!("Failed to create table {}.{}", schema, table))?;

    // Filter columns are queried by exact match on every request
    for column in ["sector", "topic", "region", "country", "end_year"] {
        let index = format!(
            r#"CREATE INDEX IF NOT EXISTS "{1}_{2}_idx" ON {0} ({2});"#,
            qualified_table(schema, table),
            table,
            column
        );
        client
            .execute(&index, &[])
            .await
            .with_context(|| format!("Failed to create index on {}", column))?;
    }
    info!("Table {}.{} ensured.", schema, table);
    Ok(())
}

/// Inserts `records` when the table is empty. Returns the number inserted.
///
/// The whole dataset goes in one transaction so a failed seed leaves the
/// table empty and the next start retries it.
pub async fn seed_if_empty(pool: &PgPool, schema: &str, table: &str, records: &[Record]) -> Result<u64> {
    let mut client = pool.get().await.context("Failed to get DB client for seeding")?;
    let table_name = qualified_table(schema, table);

    let existing: i64 = client
        .query_one(&format!("SELECT COUNT(*) FROM {}", table_name), &[])
        .await
        .context("Failed to count existing records")?
        .get(0);
    if existing > 0 {
        info!("Table {} already holds {} records, skipping seed.", table_name, existing);
        return Ok(0);
    }
    if records.is_empty() {
        warn!("No records available to seed {}", table_name);
        return Ok(0);
    }

    let all_columns: Vec<&str> = TEXT_COLUMNS.iter().chain(NUMERIC_COLUMNS.iter()).copied().collect();
    let placeholders: Vec<String> = (1..=all_columns.len()).map(|i| format!("${}", i)).collect();
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_name,
        all_columns.join(", "),
        placeholders.join(", ")
    );

    let tx = client.transaction().await.context("Failed to start seed transaction")?;
    let statement = tx.prepare(&insert).await.context("Failed to prepare insert")?;
    let mut inserted = 0u64;
    for r in records {
        inserted += tx
            .execute(
                &statement,
                &[
                    &r.end_year,
                    &r.start_year,
                    &r.sector,
                    &r.topic,
                    &r.region,
                    &r.country,
                    &r.city,
                    &r.source,
                    &r.pestle,
                    &r.title,
                    &r.insight,
                    &r.url,
                    &r.impact,
                    &r.published,
                    &r.added,
                    &r.intensity,
                    &r.likelihood,
                    &r.relevance,
                ],
            )
            .await
            .context("Failed to insert record")?;
    }
    tx.commit().await.context("Failed to commit seed transaction")?;
    info!("Seeded {} records into {}.", inserted, table_name);
    Ok(inserted)
}
