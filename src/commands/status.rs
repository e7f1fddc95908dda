use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::cli::{StatusArgs, resolve_db_path};
use crate::store::{RawStore, count_rows};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.data_root, args.db_path.as_ref());
    let manifest_dir = args.data_root.join("manifests");
    let failure_log_path = args.data_root.join("logs").join("clean_failures.jsonl");

    info!(data_root = %args.data_root.display(), "status requested");

    match latest_manifest(&manifest_dir, "clean_run_")? {
        Some(path) => info!(path = %path.display(), "latest clean manifest"),
        None => warn!(dir = %manifest_dir.display(), "no clean manifest found"),
    }
    match latest_manifest(&manifest_dir, "capture_")? {
        Some(path) => info!(path = %path.display(), "latest capture manifest"),
        None => warn!(dir = %manifest_dir.display(), "no capture manifest found"),
    }

    if failure_log_path.exists() {
        let log = fs::read_to_string(&failure_log_path)
            .with_context(|| format!("failed to read {}", failure_log_path.display()))?;
        info!(
            path = %failure_log_path.display(),
            failures = log.lines().filter(|line| !line.trim().is_empty()).count(),
            "failure log"
        );
    }

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let schema_version = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .unwrap_or(None)
        .unwrap_or_default();
    let raw_columns = RawStore::open(&conn)
        .map(|store| store.field_columns().count())
        .unwrap_or(0);

    info!(
        path = %db_path.display(),
        schema_version = %schema_version,
        organizations = count_rows(&conn, "SELECT COUNT(*) FROM organizations").unwrap_or(0),
        raw_records = count_rows(&conn, "SELECT COUNT(*) FROM organizations_raw").unwrap_or(0),
        raw_columns,
        finalized = count_rows(&conn, "SELECT COUNT(*) FROM organizations_final").unwrap_or(0),
        subjects = count_rows(&conn, "SELECT COUNT(*) FROM subjects").unwrap_or(0),
        contacts = count_rows(&conn, "SELECT COUNT(*) FROM contacts").unwrap_or(0),
        "database status"
    );

    Ok(())
}

fn latest_manifest(manifest_dir: &Path, prefix: &str) -> Result<Option<std::path::PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut latest = None;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".json"));
        if matches && latest.as_ref().is_none_or(|current| &path > current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
