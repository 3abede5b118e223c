//! Process configuration
//!
//! One explicitly constructed object, built by `main` from CLI flags and
//! passed by reference to every component that needs it. There are no
//! ambient globals.

use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `<name>.csv` ingestion sources.
    pub data_dir: PathBuf,
    /// Directory holding `<name>.sqlite3` database files.
    pub db_dir: PathBuf,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            db_dir: PathBuf::from("dbs"),
            port: 3000,
        }
    }
}

impl Config {
    /// Creates the source and database directories if they are missing.
    pub fn bootstrap(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.db_dir)
    }
}
