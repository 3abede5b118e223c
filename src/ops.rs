//! Operations shared by the HTTP and CLI surfaces
//!
//! Each function builds the engine components it needs from the passed
//! configuration, performs one request, and returns engine data for the
//! caller to serialize. Deriving the attach set from raw query text lives
//! here, on the collaborator side of the engine boundary.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::engine::types::{DatabaseSummary, IngestReport, QueryResult};
use crate::engine::{
    extract, quote_ident, Catalog, EngineError, EngineResult, FederationSession, Ingestor,
    Introspector,
};

/// Catalog listing with per-database summaries.
pub async fn list_databases(config: &Config) -> EngineResult<Vec<DatabaseSummary>> {
    let catalog = Catalog::new(&config.db_dir);
    Introspector::new(&catalog).describe_all().await
}

/// First `limit` rows of the table named `name` inside the database of the
/// same name.
pub async fn show_table(config: &Config, name: &str, limit: u32) -> EngineResult<QueryResult> {
    let catalog = Catalog::new(&config.db_dir);
    let session = FederationSession::new(&catalog);
    let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(name), limit);
    session.run(name, &sql, &[]).await
}

/// Runs ad-hoc SQL, deriving the attach set from the query text.
///
/// Candidate names come from the lexical extractor and are intersected with
/// catalog membership; over-approximated candidates (column or alias
/// prefixes) drop out here. The primary is the first candidate present in
/// the catalog, falling back to the first catalog entry. `attach_all`
/// skips inference and attaches every catalog entry instead.
pub async fn run_sql(config: &Config, sql: &str, attach_all: bool) -> EngineResult<QueryResult> {
    let catalog = Catalog::new(&config.db_dir);
    let session = FederationSession::new(&catalog);

    if attach_all {
        return session.run_across_all(sql).await;
    }

    let files = catalog.list()?;
    let Some(first) = files.first() else {
        return Err(EngineError::catalog_unavailable(format!(
            "no database files in {}",
            config.db_dir.display()
        )));
    };

    let known: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let attach: Vec<String> = extract::extract(sql)
        .into_iter()
        .filter(|candidate| known.contains(candidate.as_str()))
        .collect();
    let primary = attach.first().cloned().unwrap_or_else(|| first.name.clone());

    session.run(&primary, sql, &attach).await
}

/// Re-ingests every `*.csv` source in the data directory into its
/// like-named database file.
pub async fn update_databases(config: &Config) -> EngineResult<Vec<IngestReport>> {
    let entries = fs::read_dir(&config.data_dir).map_err(|e| {
        EngineError::catalog_unavailable(format!("{}: {e}", config.data_dir.display()))
    })?;

    let mut sources: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv")
        })
        .collect();
    sources.sort();

    let ingestor = Ingestor::new(&config.db_dir);
    let mut reports = Vec::new();
    for path in sources {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let bytes = fs::read(&path).map_err(|e| {
            EngineError::malformed_source(format!("{}: {e}", path.display()))
        })?;
        let report = ingestor.ingest(&name, &bytes).await?;
        info!(name = %report.name, rows = report.rows, "database updated");
        reports.push(report);
    }
    Ok(reports)
}
