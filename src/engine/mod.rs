// SPDX-License-Identifier: Apache-2.0

//! The federation engine
//!
//! Catalog enumeration, qualified-name extraction, federation sessions,
//! CSV ingestion and per-file introspection. Every operation is a
//! self-contained transaction over ephemeral resources: open, act, release.

pub mod catalog;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod introspect;
pub mod session;
pub mod types;

pub use catalog::Catalog;
pub use error::{EngineError, EngineResult};
pub use ingest::Ingestor;
pub use introspect::Introspector;
pub use session::FederationSession;
pub use types::{
    ColumnInfo, DatabaseFile, DatabaseSummary, IngestReport, QueryResult, Row, Value,
};

/// Quotes a logical name for use as a SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
