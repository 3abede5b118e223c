// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the federation engine
//!
//! Every failure the engine can surface maps to one of these kinds. SQLite
//! error text is passed through verbatim; the engine does not translate or
//! sanitize it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all engine operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Catalog unavailable: {message}")]
    CatalogUnavailable { message: String },

    #[error("Unknown database: {name}")]
    UnknownDatabase { name: String },

    #[error("Malformed source: {message}")]
    MalformedSource { message: String },

    #[error("Write failure: {message}")]
    WriteFailure { message: String },

    #[error("Query failure: {message}")]
    QueryFailure { message: String },
}

impl EngineError {
    pub fn catalog_unavailable(msg: impl Into<String>) -> Self {
        Self::CatalogUnavailable { message: msg.into() }
    }

    pub fn unknown_database(name: impl Into<String>) -> Self {
        Self::UnknownDatabase { name: name.into() }
    }

    pub fn malformed_source(msg: impl Into<String>) -> Self {
        Self::MalformedSource { message: msg.into() }
    }

    pub fn write_failure(msg: impl Into<String>) -> Self {
        Self::WriteFailure { message: msg.into() }
    }

    pub fn query_failure(msg: impl Into<String>) -> Self {
        Self::QueryFailure { message: msg.into() }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
