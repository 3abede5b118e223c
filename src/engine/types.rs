// SPDX-License-Identifier: Apache-2.0

//! Universal data types for the federation engine
//!
//! SQLite is dynamically typed and the column set of an ad-hoc query is only
//! known at execution time, so result rows carry tagged scalar values rather
//! than a fixed record type.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A persisted SQLite file visible in the catalog.
///
/// The logical name is the file stem and is unique within the catalog
/// directory. Duplicate stems under different database extensions are a
/// documented limitation, not resolved here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Value {
    /// Converts into the plain JSON representation used at the API boundary.
    pub fn to_json(&self) -> serde_json::Value {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Bytes(b) => serde_json::Value::from(STANDARD.encode(b)),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// One result row; values are positional, aligned with `QueryResult::columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

/// Column metadata as reported by the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Materialized result of one statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    /// Execution time in milliseconds
    pub execution_time_ms: f64,
}

impl QueryResult {
    /// Zips column names with row values into one JSON object per row.
    ///
    /// Column names are not required to be unique; duplicates resolve
    /// last-write-wins, which is what `SELECT *` across attached tables
    /// with shared column names produces.
    pub fn to_objects(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&row.values)
                    .map(|(col, value)| (col.name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }
}

/// What a completed ingestion wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub name: String,
    pub rows: u64,
    pub columns: usize,
}

/// Per-database metadata reported by the introspector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub tables: Vec<String>,
    pub rows: u64,
    pub columns: u64,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_resolve_duplicate_columns_last_write_wins() {
        let result = QueryResult {
            columns: vec![
                ColumnInfo {
                    name: "id".to_string(),
                    data_type: "INTEGER".to_string(),
                },
                ColumnInfo {
                    name: "id".to_string(),
                    data_type: "INTEGER".to_string(),
                },
            ],
            rows: vec![Row {
                values: vec![Value::Int(1), Value::Int(2)],
            }],
            execution_time_ms: 0.0,
        };

        let objects = result.to_objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].len(), 1);
        assert_eq!(objects[0]["id"], serde_json::json!(2));
    }

    #[test]
    fn bytes_serialize_as_base64() {
        let value = Value::Bytes(vec![0xde, 0xad]);
        let json = serde_json::to_string(&value).expect("should serialize");
        assert!(json.contains("3q0="), "got {json}");
    }
}
