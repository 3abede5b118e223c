// sqlfed - federated ad-hoc SQL over a directory of SQLite files
// Core library

pub mod config;
pub mod engine;
pub mod metrics;
pub mod observability;
pub mod ops;
pub mod server;

pub use config::Config;
pub use engine::{
    Catalog, EngineError, EngineResult, FederationSession, Ingestor, Introspector,
};
