//! End-to-end flow over the public API: ingest CSV sources, introspect the
//! resulting files, and query across them with inferred attachments.

use std::fs;
use std::path::Path;

use sqlfed::engine::types::Value;
use sqlfed::engine::{extract, Catalog, EngineError, FederationSession, Introspector};
use sqlfed::{ops, Config};
use tempfile::tempdir;

const CUSTOMERS_CSV: &str = "id,name\n1,Ada\n2,Grace\n3,Edsger\n";
const SALES_CSV: &str = "id,cust_id,amount\n10,1,12.5\n11,3,3.0\n12,2,9.25\n";

fn test_config(root: &Path) -> Config {
    let config = Config {
        data_dir: root.join("data"),
        db_dir: root.join("dbs"),
        port: 0,
    };
    config.bootstrap().unwrap();
    config
}

fn seed_sources(config: &Config) {
    fs::write(config.data_dir.join("customers.csv"), CUSTOMERS_CSV).unwrap();
    fs::write(config.data_dir.join("sales.csv"), SALES_CSV).unwrap();
}

#[tokio::test]
async fn ingest_then_federated_join() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_sources(&config);

    let reports = ops::update_databases(&config).await.unwrap();
    assert_eq!(reports.len(), 2);

    // The extractor sees both database names plus the table aliases; the
    // alias candidates drop out against the catalog.
    let sql = "SELECT c.name FROM customers.customers c \
               JOIN sales.sales s ON c.id = s.cust_id \
               ORDER BY s.id";
    let candidates = extract::extract(sql);
    assert!(candidates.contains(&"customers".to_string()));
    assert!(candidates.contains(&"sales".to_string()));

    let result = ops::run_sql(&config, sql, false).await.unwrap();
    assert_eq!(result.columns.len(), 1);
    assert_eq!(result.columns[0].name, "name");

    let names: Vec<&Value> = result.rows.iter().map(|r| &r.values[0]).collect();
    assert_eq!(
        names,
        [
            &Value::Text("Ada".to_string()),
            &Value::Text("Edsger".to_string()),
            &Value::Text("Grace".to_string())
        ]
    );
}

#[tokio::test]
async fn round_trip_preserves_values_and_order() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_sources(&config);
    ops::update_databases(&config).await.unwrap();

    let catalog = Catalog::new(&config.db_dir);
    let session = FederationSession::new(&catalog);
    let result = session
        .run("sales", "SELECT * FROM sales", &[])
        .await
        .unwrap();

    let expected = [
        vec![Value::Int(10), Value::Int(1), Value::Float(12.5)],
        vec![Value::Int(11), Value::Int(3), Value::Float(3.0)],
        vec![Value::Int(12), Value::Int(2), Value::Float(9.25)],
    ];
    assert_eq!(result.rows.len(), expected.len());
    for (row, want) in result.rows.iter().zip(&expected) {
        assert_eq!(&row.values, want);
    }
}

#[tokio::test]
async fn describe_matches_the_ingested_source() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_sources(&config);
    ops::update_databases(&config).await.unwrap();

    let catalog = Catalog::new(&config.db_dir);
    let summary = Introspector::new(&catalog)
        .describe("customers")
        .await
        .unwrap();

    assert_eq!(summary.tables, ["customers"]);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.columns, 2);
    assert!(summary.size_bytes > 0);
}

#[tokio::test]
async fn re_running_update_keeps_contents_identical() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_sources(&config);

    ops::update_databases(&config).await.unwrap();
    let first = ops::run_sql(&config, "SELECT * FROM sales.sales", false)
        .await
        .unwrap();

    ops::update_databases(&config).await.unwrap();
    let second = ops::run_sql(&config, "SELECT * FROM sales.sales", false)
        .await
        .unwrap();

    assert_eq!(first.rows, second.rows);
}

#[tokio::test]
async fn unknown_database_reference_fails_cleanly() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_sources(&config);
    ops::update_databases(&config).await.unwrap();

    let catalog = Catalog::new(&config.db_dir);
    let session = FederationSession::new(&catalog);

    let err = session
        .run(
            "customers",
            "SELECT * FROM ghost.t",
            &["ghost".to_string()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownDatabase { name } if name == "ghost"));

    // Nothing stays attached or locked; the same files keep serving.
    let ok = session
        .run("customers", "SELECT COUNT(*) AS n FROM customers", &[])
        .await
        .unwrap();
    assert_eq!(ok.rows[0].values[0], Value::Int(3));
}

#[tokio::test]
async fn malformed_update_aborts_without_touching_the_destination() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_sources(&config);
    ops::update_databases(&config).await.unwrap();

    // Break one source: a data row with fewer fields than the header.
    fs::write(config.data_dir.join("customers.csv"), "id,name\n1\n").unwrap();
    let err = ops::update_databases(&config).await.unwrap_err();
    assert!(matches!(err, EngineError::MalformedSource { .. }));

    let result = ops::run_sql(
        &config,
        "SELECT COUNT(*) AS n FROM customers.customers",
        false,
    )
    .await
    .unwrap();
    assert_eq!(result.rows[0].values[0], Value::Int(3));
}
