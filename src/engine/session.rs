// SPDX-License-Identifier: Apache-2.0

//! Federation sessions: one primary connection, scoped attachments
//!
//! A session is an ephemeral resource. It opens a connection on the primary
//! file, attaches the requested catalog entries under their logical names,
//! runs exactly one statement, then detaches everything and closes. The
//! detach phase runs on every exit path, success or failure, so a failed
//! query never leaks an attached file handle.
//!
//! Concurrent sessions against the same files are arbitrated by SQLite's
//! own locking. "database is locked" surfaces to the caller as a query
//! failure; the session never retries it internally.

use std::path::Path;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::{instrument, warn};

use crate::engine::catalog::Catalog;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::quote_ident;
use crate::engine::types::{ColumnInfo, DatabaseFile, QueryResult, Row as QRow, Value};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FederationSession<'a> {
    catalog: &'a Catalog,
}

impl<'a> FederationSession<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Runs one statement with the named databases attached.
    ///
    /// Every name, primary included, is resolved against the catalog before
    /// any file is touched; one unknown name fails the whole call with
    /// nothing attached. Repeated names are attached once. A name equal to
    /// the primary is attached too, making the file visible both as `main`
    /// and under its logical name, so queries that qualify tables with the
    /// primary's own name still resolve.
    #[instrument(skip(self, sql), fields(query_len = sql.len()))]
    pub async fn run(
        &self,
        primary: &str,
        sql: &str,
        attach_names: &[String],
    ) -> EngineResult<QueryResult> {
        let primary_file = self.catalog.resolve(primary)?;

        let mut attachments: Vec<DatabaseFile> = Vec::new();
        for name in attach_names {
            if attachments.iter().any(|f| &f.name == name) {
                continue;
            }
            attachments.push(self.catalog.resolve(name)?);
        }

        execute(&primary_file, sql, &attachments).await
    }

    /// Runs one statement with every non-primary catalog entry attached.
    ///
    /// The primary is the first catalog entry in name order; callers that
    /// need a specific primary should use `run`. An empty catalog leaves no
    /// file to open and fails with `CatalogUnavailable`.
    #[instrument(skip(self, sql), fields(query_len = sql.len()))]
    pub async fn run_across_all(&self, sql: &str) -> EngineResult<QueryResult> {
        let files = self.catalog.list()?;
        let Some((primary_file, rest)) = files.split_first() else {
            return Err(EngineError::catalog_unavailable(format!(
                "no database files in {}",
                self.catalog.db_dir().display()
            )));
        };
        execute(primary_file, sql, rest).await
    }
}

/// Attach, run, detach, close. Linear, with early exit on failure only.
async fn execute(
    primary: &DatabaseFile,
    sql: &str,
    attachments: &[DatabaseFile],
) -> EngineResult<QueryResult> {
    let options = connect_options(&primary.path);
    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| EngineError::query_failure(e.to_string()))?;

    let mut attached: Vec<&str> = Vec::new();
    let mut attach_failure = None;
    for file in attachments {
        let stmt = format!(
            "ATTACH DATABASE {} AS {}",
            quote_path(&file.path),
            quote_ident(&file.name)
        );
        match sqlx::query(&stmt).execute(&mut conn).await {
            Ok(_) => attached.push(file.name.as_str()),
            Err(e) => {
                attach_failure = Some(EngineError::query_failure(e.to_string()));
                break;
            }
        }
    }

    let outcome = match attach_failure {
        Some(err) => Err(err),
        None => fetch(&mut conn, sql).await,
    };

    // Every attach is paired with a detach before the session is considered
    // closed, even when the statement failed.
    for name in attached {
        let stmt = format!("DETACH DATABASE {}", quote_ident(name));
        if let Err(e) = sqlx::query(&stmt).execute(&mut conn).await {
            warn!(database = %name, error = %e, "detach failed");
        }
    }
    let _ = conn.close().await;

    outcome
}

/// Executes the statement and materializes all rows before returning.
async fn fetch(conn: &mut SqliteConnection, sql: &str) -> EngineResult<QueryResult> {
    let start = Instant::now();

    let sqlite_rows: Vec<SqliteRow> = sqlx::query(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| EngineError::query_failure(e.to_string()))?;

    let execution_time_ms = start.elapsed().as_micros() as f64 / 1000.0;

    if sqlite_rows.is_empty() {
        return Ok(QueryResult {
            columns: Vec::new(),
            rows: Vec::new(),
            execution_time_ms,
        });
    }

    let columns = column_info(&sqlite_rows[0]);
    let rows: Vec<QRow> = sqlite_rows.iter().map(convert_row).collect();

    Ok(QueryResult {
        columns,
        rows,
        execution_time_ms,
    })
}

fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Quotes a filesystem path as a SQL string literal.
fn quote_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

fn column_info(row: &SqliteRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            data_type: col.type_info().name().to_string(),
        })
        .collect()
}

fn convert_row(sqlite_row: &SqliteRow) -> QRow {
    let values: Vec<Value> = sqlite_row
        .columns()
        .iter()
        .map(|col| extract_value(sqlite_row, col.ordinal()))
        .collect();

    QRow { values }
}

/// Extracts a value from a row at the given index.
///
/// SQLite has dynamic typing, so types are tried in order of likelihood.
fn extract_value(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }

    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    async fn seed(dir: &TempDir, name: &str, statements: &[&str]) {
        let path = dir.path().join(format!("{name}.sqlite3"));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        for stmt in statements {
            sqlx::query(stmt).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
    }

    async fn sales_and_customers() -> (TempDir, Catalog) {
        let dir = tempdir().unwrap();
        seed(
            &dir,
            "customers",
            &[
                "CREATE TABLE customers (id INTEGER, name TEXT)",
                "INSERT INTO customers VALUES (1, 'Ada'), (2, 'Grace')",
            ],
        )
        .await;
        seed(
            &dir,
            "sales",
            &[
                "CREATE TABLE sales (id INTEGER, cust_id INTEGER, amount REAL)",
                "INSERT INTO sales VALUES (10, 1, 12.5), (11, 1, 3.0), (12, 2, 9.25)",
            ],
        )
        .await;
        let catalog = Catalog::new(dir.path());
        (dir, catalog)
    }

    #[tokio::test]
    async fn attaches_exactly_the_requested_names() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        let result = session
            .run(
                "customers",
                "PRAGMA database_list",
                &["sales".to_string(), "customers".to_string()],
            )
            .await
            .unwrap();

        // main plus both requested names; the primary's file shows up twice,
        // once as main and once under its logical name.
        let mut names: Vec<String> = result
            .rows
            .iter()
            .map(|row| match &row.values[1] {
                Value::Text(s) => s.clone(),
                other => panic!("unexpected value {other:?}"),
            })
            .collect();
        names.sort();
        assert_eq!(names, ["customers", "main", "sales"]);
    }

    #[tokio::test]
    async fn qualifying_tables_with_the_primary_name_resolves() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        let result = session
            .run(
                "customers",
                "SELECT c.name FROM customers.customers c \
                 JOIN sales.sales s ON c.id = s.cust_id \
                 WHERE s.id = 12",
                &["customers".to_string(), "sales".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].values[0], Value::Text("Grace".to_string()));
    }

    #[tokio::test]
    async fn joins_rows_across_attached_files() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        let result = session
            .run(
                "customers",
                "SELECT c.name FROM customers c \
                 JOIN sales.sales s ON c.id = s.cust_id \
                 ORDER BY s.id",
                &["sales".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.columns[0].name, "name");
        let names: Vec<&Value> = result.rows.iter().map(|r| &r.values[0]).collect();
        assert_eq!(
            names,
            [
                &Value::Text("Ada".to_string()),
                &Value::Text("Ada".to_string()),
                &Value::Text("Grace".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn unknown_attachment_fails_before_touching_the_connection() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        let err = session
            .run("customers", "SELECT 1", &["nowhere".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownDatabase { name } if name == "nowhere"));

        // The files stay usable afterwards.
        let result = session.run("customers", "SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn unknown_primary_fails() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        let err = session.run("nowhere", "SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownDatabase { .. }));
    }

    #[tokio::test]
    async fn failed_statement_surfaces_and_releases_the_session() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        let err = session
            .run(
                "customers",
                "SELECT * FROM no_such_table",
                &["sales".to_string()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::QueryFailure { .. }));

        // A fresh session over the same files still works.
        let result = session
            .run("sales", "SELECT COUNT(*) AS n FROM sales", &[])
            .await
            .unwrap();
        assert_eq!(result.rows[0].values[0], Value::Int(3));
    }

    #[tokio::test]
    async fn run_across_all_attaches_every_non_primary_entry() {
        let (_dir, catalog) = sales_and_customers().await;
        let session = FederationSession::new(&catalog);

        // "customers" sorts first and becomes the primary.
        let result = session
            .run_across_all(
                "SELECT c.name, s.amount FROM customers c \
                 JOIN sales.sales s ON c.id = s.cust_id \
                 ORDER BY s.amount",
            )
            .await
            .unwrap();

        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0].values[1], Value::Float(3.0));
    }

    #[tokio::test]
    async fn run_across_all_on_empty_catalog_is_unavailable() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        let session = FederationSession::new(&catalog);

        let err = session.run_across_all("SELECT 1").await.unwrap_err();
        assert!(matches!(err, EngineError::CatalogUnavailable { .. }));
    }
}
