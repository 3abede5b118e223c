// SPDX-License-Identifier: Apache-2.0

//! Per-file metadata: tables, row totals, column totals, size on disk

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tracing::instrument;

use crate::engine::catalog::Catalog;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::quote_ident;
use crate::engine::types::{DatabaseFile, DatabaseSummary};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Introspector<'a> {
    catalog: &'a Catalog,
}

impl<'a> Introspector<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Describes one database file.
    ///
    /// Opens the file read-only; no writes are performed. A database with
    /// zero tables reports zero rows and columns, not an error.
    #[instrument(skip(self))]
    pub async fn describe(&self, name: &str) -> EngineResult<DatabaseSummary> {
        let file = self.catalog.resolve(name)?;

        let options = SqliteConnectOptions::new()
            .filename(&file.path)
            .read_only(true)
            .busy_timeout(BUSY_TIMEOUT);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| EngineError::query_failure(e.to_string()))?;

        let outcome = summarize(&mut conn, &file).await;
        let _ = conn.close().await;
        outcome
    }

    /// Describes every catalog entry, in catalog order.
    pub async fn describe_all(&self) -> EngineResult<Vec<DatabaseSummary>> {
        let mut summaries = Vec::new();
        for file in self.catalog.list()? {
            summaries.push(self.describe(&file.name).await?);
        }
        Ok(summaries)
    }
}

async fn summarize(
    conn: &mut SqliteConnection,
    file: &DatabaseFile,
) -> EngineResult<DatabaseSummary> {
    let query_err = |e: sqlx::Error| EngineError::query_failure(e.to_string());

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(query_err)?;

    let mut rows = 0u64;
    let mut columns = 0u64;
    for (table,) in &tables {
        let count: (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
                .fetch_one(&mut *conn)
                .await
                .map_err(query_err)?;
        rows += count.0.max(0) as u64;

        let table_info: Vec<(i64, String, String, i64, Option<String>, i64)> =
            sqlx::query_as(&format!("PRAGMA table_info({})", quote_ident(table)))
                .fetch_all(&mut *conn)
                .await
                .map_err(query_err)?;
        columns += table_info.len() as u64;
    }

    Ok(DatabaseSummary {
        name: file.name.clone(),
        tables: tables.into_iter().map(|(name,)| name).collect(),
        rows,
        columns,
        size_bytes: file.size_bytes,
    })
}
