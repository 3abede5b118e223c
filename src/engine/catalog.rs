// SPDX-License-Identifier: Apache-2.0

//! On-demand enumeration of the database directory
//!
//! The catalog is rebuilt on every call; there is no in-memory index to go
//! stale when files change out-of-band. Entries come back sorted by logical
//! name so that the "first catalog entry is the default primary" rule is
//! deterministic across platforms.

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::DatabaseFile;

/// File extension carried by every database file in the catalog directory.
pub const DB_EXTENSION: &str = "sqlite3";

#[derive(Debug, Clone)]
pub struct Catalog {
    db_dir: PathBuf,
}

impl Catalog {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
        }
    }

    /// Directory the catalog scans.
    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Path a database file with this logical name would occupy.
    ///
    /// Does not check existence; `resolve` does.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.db_dir.join(format!("{name}.{DB_EXTENSION}"))
    }

    /// Enumerates the database files currently on disk, sorted by name.
    ///
    /// Two calls may observe different membership if the filesystem changed
    /// in between; that is accepted, not masked. An existing-but-empty
    /// directory is an empty catalog, not an error.
    pub fn list(&self) -> EngineResult<Vec<DatabaseFile>> {
        let entries = fs::read_dir(&self.db_dir).map_err(|e| {
            EngineError::catalog_unavailable(format!("{}: {e}", self.db_dir.display()))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| EngineError::catalog_unavailable(e.to_string()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(DB_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(DatabaseFile {
                name: name.to_string(),
                path: path.clone(),
                size_bytes,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Looks up a single logical name.
    pub fn resolve(&self, name: &str) -> EngineResult<DatabaseFile> {
        self.list()?
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EngineError::unknown_database(name))
    }
}
