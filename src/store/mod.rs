use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub mod final_store;
pub mod listing;
pub mod raw;
pub mod schema;
#[cfg(test)]
mod tests;

pub use raw::RawStore;
pub use schema::{DB_SCHEMA_VERSION, count_rows};

/// Opens the database file, configures it and makes sure every table exists.
pub fn open_database(db_path: &Path) -> Result<Connection> {
    crate::util::ensure_parent_directory(db_path)?;
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    schema::configure_connection(&connection)?;
    schema::ensure_schema(&connection)?;
    Ok(connection)
}
