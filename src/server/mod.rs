//! HTTP surface
//!
//! Thin routing and JSON marshalling around the engine. The only state the
//! server owns is the configuration and a short-lived response cache for
//! `/api/sql`, keyed on exact query text. The engine itself is stateless
//! per call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::engine::EngineError;
use crate::{metrics, ops};

/// How long a cached `/api/sql` response stays valid.
const SQL_CACHE_TTL: Duration = Duration::from_secs(10);

pub struct AppState {
    config: Config,
    sql_cache: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    stored_at: Instant,
    payload: serde_json::Value,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sql_cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_get(&self, key: &str) -> Option<serde_json::Value> {
        let mut cache = self.sql_cache.lock();
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < SQL_CACHE_TTL => {
                Some(entry.payload.clone())
            }
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn cache_put(&self, key: String, payload: serde_json::Value) {
        let mut cache = self.sql_cache.lock();
        cache.retain(|_, entry| entry.stored_at.elapsed() < SQL_CACHE_TTL);
        cache.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                payload,
            },
        );
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api", get(api_docs))
        .route("/api/databases", get(list_databases))
        .route("/api/show", get(show_table))
        .route("/api/sql", get(execute_sql))
        .route("/api/update", get(update_databases))
        .route("/api/metrics", get(request_metrics))
        .with_state(state)
}

pub async fn serve(config: Config) -> std::io::Result<()> {
    let port = config.port;
    let state = Arc::new(AppState::new(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app).await
}

/// Maps an engine error onto an HTTP response.
fn engine_error(err: EngineError) -> Response {
    let status = match &err {
        EngineError::UnknownDatabase { .. } | EngineError::CatalogUnavailable { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::MalformedSource { .. } => StatusCode::BAD_REQUEST,
        EngineError::WriteFailure { .. } | EngineError::QueryFailure { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

async fn api_docs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let port = state.config.port;
    Json(json!({
        "/api/update": {
            "method": "GET",
            "description": "Re-ingests every CSV source into its database file.",
            "parameters": null,
            "example_api": format!("GET http://localhost:{port}/api/update"),
            "example_cli": "sqlfed update",
        },
        "/api/databases": {
            "method": "GET",
            "description": "Lists all databases with table, row, column and size details.",
            "parameters": null,
            "example_api": format!("GET http://localhost:{port}/api/databases"),
            "example_cli": "sqlfed databases",
        },
        "/api/show": {
            "method": "GET",
            "description": "Shows the first rows of the named table.",
            "parameters": "name (string, required), limit (int, optional, default=5)",
            "example_api": format!("GET http://localhost:{port}/api/show?name=table_name&limit=5"),
            "example_cli": "sqlfed show TABLE_NAME",
        },
        "/api/sql": {
            "method": "GET",
            "description": "Executes a SQL query across the database files it references.",
            "parameters": "sql (string, required), attach (string, optional: 'all')",
            "example_api": format!("GET http://localhost:{port}/api/sql?sql=SQL_QUERY"),
            "example_cli": "sqlfed sql \"SQL_QUERY\"",
        },
        "/api/metrics": {
            "method": "GET",
            "description": "In-process query and ingestion counters.",
            "parameters": null,
            "example_api": format!("GET http://localhost:{port}/api/metrics"),
            "example_cli": null,
        },
    }))
}

async fn list_databases(State(state): State<Arc<AppState>>) -> Response {
    match ops::list_databases(&state.config).await {
        Ok(summaries) if summaries.is_empty() => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "error": "No databases found." })),
        )
            .into_response(),
        Ok(summaries) => {
            Json(json!({ "status": "success", "databases": summaries })).into_response()
        }
        Err(err) => engine_error(err),
    }
}

#[derive(Deserialize)]
struct ShowParams {
    name: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    5
}

async fn show_table(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShowParams>,
) -> Response {
    match ops::show_table(&state.config, &params.name, params.limit).await {
        Ok(result) => Json(result.to_objects()).into_response(),
        Err(err) => engine_error(err),
    }
}

#[derive(Deserialize)]
struct SqlParams {
    sql: Option<String>,
    attach: Option<String>,
}

async fn execute_sql(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SqlParams>,
) -> Response {
    let Some(sql) = params.sql.filter(|s| !s.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing 'sql' parameter" })),
        )
            .into_response();
    };
    let attach_all = params.attach.as_deref() == Some("all");

    let cache_key = format!("{attach_all}:{sql}");
    if let Some(hit) = state.cache_get(&cache_key) {
        return Json(hit).into_response();
    }

    match ops::run_sql(&state.config, &sql, attach_all).await {
        Ok(result) => {
            metrics::record_query(result.execution_time_ms, true);
            let payload = serde_json::Value::from(
                result
                    .to_objects()
                    .into_iter()
                    .map(serde_json::Value::Object)
                    .collect::<Vec<_>>(),
            );
            state.cache_put(cache_key, payload.clone());
            Json(payload).into_response()
        }
        Err(err) => {
            metrics::record_query(0.0, false);
            engine_error(err)
        }
    }
}

async fn update_databases(State(state): State<Arc<AppState>>) -> Response {
    match ops::update_databases(&state.config).await {
        Ok(reports) => {
            metrics::record_ingest(true);
            let updates: Vec<String> = reports
                .iter()
                .map(|r| format!("{} updated.", r.name))
                .collect();
            Json(json!({ "message": "Databases updated.", "updates": updates }))
                .into_response()
        }
        Err(err) => {
            metrics::record_ingest(false);
            engine_error(err)
        }
    }
}

async fn request_metrics() -> Json<metrics::MetricsSnapshot> {
    Json(metrics::snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entries_expire_and_fresh_ones_hit() {
        let state = AppState::new(Config::default());

        state.cache_put("k".to_string(), json!([1, 2]));
        assert_eq!(state.cache_get("k"), Some(json!([1, 2])));
        assert_eq!(state.cache_get("other"), None);

        // Force-expire the entry.
        state.sql_cache.lock().get_mut("k").unwrap().stored_at =
            Instant::now() - SQL_CACHE_TTL - Duration::from_secs(1);
        assert_eq!(state.cache_get("k"), None);
    }

    #[test]
    fn error_statuses_follow_the_kind() {
        let not_found = engine_error(EngineError::unknown_database("x"));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad_request = engine_error(EngineError::malformed_source("row 2"));
        assert_eq!(bad_request.status(), StatusCode::BAD_REQUEST);

        let server_error = engine_error(EngineError::query_failure("no such table: t"));
        assert_eq!(server_error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
