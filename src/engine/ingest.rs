// SPDX-License-Identifier: Apache-2.0

//! CSV ingestion: turns a delimited source into a single-table database file
//!
//! The whole source is parsed and validated before the destination is
//! opened, so a malformed source never modifies an existing file. The write
//! itself is a destructive full replace inside one transaction: drop the
//! table, recreate it from the inferred schema, insert every row. No backup
//! of prior contents is kept.

use std::path::PathBuf;
use std::time::Duration;

use csv::{ReaderBuilder, StringRecord};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tracing::{debug, instrument};

use crate::engine::catalog::DB_EXTENSION;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::quote_ident;
use crate::engine::types::IngestReport;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Inferred storage class for one source column.
///
/// INTEGER if every non-empty value parses as i64, REAL if every non-empty
/// value parses as f64, TEXT otherwise. A column with no values at all is
/// TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

struct ParsedSource {
    headers: Vec<String>,
    types: Vec<ColumnType>,
    records: Vec<StringRecord>,
}

pub struct Ingestor {
    db_dir: PathBuf,
}

impl Ingestor {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
        }
    }

    /// Parses `source` and (re)creates `<db_dir>/<name>.sqlite3` holding a
    /// table named `name` with the source's data.
    #[instrument(skip(self, source), fields(bytes = source.len()))]
    pub async fn ingest(&self, name: &str, source: &[u8]) -> EngineResult<IngestReport> {
        let parsed = parse_source(source)?;
        let path = self.db_dir.join(format!("{name}.{DB_EXTENSION}"));

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| EngineError::write_failure(format!("{}: {e}", path.display())))?;

        let outcome = replace_table(&mut conn, name, &parsed).await;
        let _ = conn.close().await;
        let rows = outcome?;

        debug!(name, rows, columns = parsed.headers.len(), "ingested");
        Ok(IngestReport {
            name: name.to_string(),
            rows,
            columns: parsed.headers.len(),
        })
    }
}

/// Parses headers and all data records, failing on the first inconsistency.
fn parse_source(source: &[u8]) -> EngineResult<ParsedSource> {
    let mut reader = ReaderBuilder::new().flexible(false).from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| EngineError::malformed_source(e.to_string()))?
        .clone();
    if headers.is_empty() {
        return Err(EngineError::malformed_source("source has no header row"));
    }

    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let header = header.trim();
        if header.is_empty() {
            return Err(EngineError::malformed_source(
                "header row has an empty column name",
            ));
        }
        if names.iter().any(|n| n == header) {
            return Err(EngineError::malformed_source(format!(
                "duplicate column name '{header}' in header row"
            )));
        }
        names.push(header.to_string());
    }

    let mut records = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            EngineError::malformed_source(format!("data record {}: {e}", idx + 1))
        })?;
        records.push(record);
    }

    let types = infer_types(names.len(), &records);
    Ok(ParsedSource {
        headers: names,
        types,
        records,
    })
}

fn infer_types(width: usize, records: &[StringRecord]) -> Vec<ColumnType> {
    (0..width)
        .map(|col| {
            let mut ty = ColumnType::Integer;
            let mut saw_value = false;
            for record in records {
                let field = record.get(col).unwrap_or("").trim();
                if field.is_empty() {
                    continue;
                }
                saw_value = true;
                if ty == ColumnType::Integer && field.parse::<i64>().is_err() {
                    ty = if field.parse::<f64>().is_ok() {
                        ColumnType::Real
                    } else {
                        ColumnType::Text
                    };
                } else if ty == ColumnType::Real && field.parse::<f64>().is_err() {
                    ty = ColumnType::Text;
                }
                if ty == ColumnType::Text {
                    break;
                }
            }
            if saw_value {
                ty
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

/// Drops and recreates the table inside one transaction, so a failed write
/// aborts without leaving a half-replaced table behind.
async fn replace_table(
    conn: &mut SqliteConnection,
    name: &str,
    parsed: &ParsedSource,
) -> EngineResult<u64> {
    let table = quote_ident(name);
    let write_err = |e: sqlx::Error| EngineError::write_failure(e.to_string());

    let mut tx = conn.begin().await.map_err(write_err)?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

    let col_defs: Vec<String> = parsed
        .headers
        .iter()
        .zip(&parsed.types)
        .map(|(h, t)| format!("{} {}", quote_ident(h), t.sql()))
        .collect();
    sqlx::query(&format!("CREATE TABLE {table} ({})", col_defs.join(", ")))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

    let placeholders = vec!["?"; parsed.headers.len()].join(", ");
    let insert_sql = format!("INSERT INTO {table} VALUES ({placeholders})");

    let mut written = 0u64;
    for record in &parsed.records {
        let mut query = sqlx::query(&insert_sql);
        for (field, ty) in record.iter().zip(&parsed.types) {
            query = bind_field(query, field, *ty);
        }
        query.execute(&mut *tx).await.map_err(write_err)?;
        written += 1;
    }

    tx.commit().await.map_err(write_err)?;
    Ok(written)
}

/// Binds one source field according to the column's inferred type.
///
/// Empty fields become NULL regardless of type.
fn bind_field<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    field: &'q str,
    ty: ColumnType,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return query.bind(Option::<String>::None);
    }
    match ty {
        // Inference guarantees these parses succeed for non-text columns.
        ColumnType::Integer => query.bind(trimmed.parse::<i64>().unwrap_or_default()),
        ColumnType::Real => query.bind(trimmed.parse::<f64>().unwrap_or_default()),
        ColumnType::Text => query.bind(field),
    }
}
