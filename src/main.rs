use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sqlfed::engine::types::QueryResult;
use sqlfed::{observability, ops, server, Config};

/// Federated ad-hoc SQL over a directory of SQLite database files.
#[derive(Parser)]
#[command(name = "sqlfed", version, about)]
struct Cli {
    /// Directory holding CSV ingestion sources
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Directory holding SQLite database files
    #[arg(long, default_value = "dbs", global = true)]
    db_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// List databases with table, row, column and size summaries
    Databases,
    /// Print the first rows of a table
    Show {
        /// Table (and database) name
        table: String,
        /// Number of rows to print
        #[arg(short, long, default_value_t = 5)]
        limit: u32,
    },
    /// Re-ingest every CSV source into its database file
    Update,
    /// Execute an ad-hoc SQL query
    Sql {
        /// The query text
        query: String,
        /// Attach every catalog database instead of inferring from the query
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let config = Config {
        data_dir: cli.data_dir,
        db_dir: cli.db_dir,
        ..Config::default()
    };
    config.bootstrap()?;

    match cli.command {
        Commands::Serve { port } => {
            let config = Config { port, ..config };
            server::serve(config).await?;
        }
        Commands::Databases => {
            let summaries = ops::list_databases(&config).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::Show { table, limit } => {
            let result = ops::show_table(&config, &table, limit).await?;
            print_rows(&result)?;
        }
        Commands::Update => {
            let reports = ops::update_databases(&config).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Commands::Sql { query, all } => {
            let result = ops::run_sql(&config, &query, all).await?;
            print_rows(&result)?;
        }
    }

    Ok(())
}

fn print_rows(result: &QueryResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&result.to_objects())?);
    Ok(())
}
