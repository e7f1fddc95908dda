use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use super::assemble::{RecordCleaner, unmapped_columns};
use super::config::CleanConfig;
use crate::cli::{CleanArgs, resolve_db_path};
use crate::model::{
    CleanCounts, CleanFailure, CleanPaths, CleanRunManifest, CleanedOrganization,
    RawOrganizationRecord,
};
use crate::store::final_store::persist;
use crate::store::listing::load_meta;
use crate::store::{DB_SCHEMA_VERSION, RawStore, open_database};
use crate::util::{
    now_utc_string, open_append, utc_compact_string, write_json_line, write_json_pretty,
};

pub fn run(args: CleanArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("clean-{}", utc_compact_string(started_ts));

    let db_path = resolve_db_path(&args.data_root, args.db_path.as_ref());
    let failure_log_path = args
        .failure_log
        .clone()
        .unwrap_or_else(|| args.data_root.join("logs").join("clean_failures.jsonl"));
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.data_root.join("manifests").join(format!(
            "clean_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(db = %db_path.display(), run_id = %run_id, "starting clean");

    let cleaner = RecordCleaner::new(CleanConfig::from_args(&args)?)?;
    let mut connection = open_database(&db_path)?;
    let raw_store = RawStore::open(&connection)?;
    let records = raw_store.load_records(&connection, args.limit)?;
    info!(
        records = records.len(),
        raw_columns = raw_store.field_columns().count(),
        "loaded raw records"
    );

    let mut failure_log = open_append(&failure_log_path)?;
    let counts = clean_batch(&mut connection, &cleaner, &records, &mut failure_log)?;

    let mut warnings = Vec::new();
    if counts.quarantined > 0 {
        warnings.push(format!(
            "{} records quarantined, see {}",
            counts.quarantined,
            failure_log_path.display()
        ));
    }
    if !counts.unmapped_columns.is_empty() {
        warnings.push(format!(
            "raw columns without a cleaned field: {}",
            counts.unmapped_columns.join(", ")
        ));
    }

    let manifest = CleanRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_clean_command(&args),
        paths: CleanPaths {
            data_root: args.data_root.display().to_string(),
            db_path: db_path.display().to_string(),
            failure_log_path: failure_log_path.display().to_string(),
        },
        counts,
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote clean run manifest");
    info!(
        cleaned = manifest.counts.cleaned,
        already_present = manifest.counts.already_present,
        quarantined = manifest.counts.quarantined,
        "clean completed"
    );

    Ok(())
}

/// Cleans and stores each record in order. A record that fails to clean is logged to
/// `failures` and skipped; storage errors abort the batch.
pub fn clean_batch<W: Write>(
    connection: &mut Connection,
    cleaner: &RecordCleaner,
    records: &[RawOrganizationRecord],
    failures: &mut W,
) -> Result<CleanCounts> {
    let mut counts = CleanCounts {
        raw_records: records.len(),
        ..CleanCounts::default()
    };
    let mut unmapped = BTreeSet::new();

    for record in records {
        unmapped.extend(unmapped_columns(record));

        let cleaned = match clean_record(connection, cleaner, record) {
            Ok(cleaned) => cleaned,
            Err(err) => {
                quarantine(record.fk_org, &err, failures)?;
                counts.quarantined += 1;
                continue;
            }
        };

        let outcome = persist(connection, &cleaned)
            .with_context(|| format!("failed to store organization {}", record.fk_org))?;
        if outcome.inserted {
            info!(
                fk_org = record.fk_org,
                contacts = outcome.contacts,
                subjects = outcome.subject_links,
                "cleaned organization"
            );
            counts.cleaned += 1;
            counts.contacts_inserted += outcome.contacts;
            counts.subject_links_inserted += outcome.subject_links;
        } else {
            counts.already_present += 1;
        }
    }

    counts.unmapped_columns = unmapped.into_iter().collect();
    Ok(counts)
}

fn clean_record(
    connection: &Connection,
    cleaner: &RecordCleaner,
    record: &RawOrganizationRecord,
) -> Result<CleanedOrganization> {
    let meta = load_meta(connection, record.fk_org)?
        .with_context(|| format!("no listing row for organization {}", record.fk_org))?;
    cleaner
        .assemble(&meta, record)
        .with_context(|| format!("failed to clean organization {}", record.fk_org))
}

fn quarantine<W: Write>(fk_org: i64, err: &anyhow::Error, failures: &mut W) -> Result<()> {
    warn!(fk_org, error = %err, "quarantined record");

    let failure = CleanFailure {
        fk_org,
        error: err.to_string(),
        causes: err.chain().skip(1).map(ToString::to_string).collect(),
        failed_at: now_utc_string(),
    };
    write_json_line(failures, &failure).context("failed to append to failure log")
}

fn render_clean_command(args: &CleanArgs) -> String {
    let mut command = format!("yearbook clean --data-root {}", args.data_root.display());
    if let Some(db_path) = &args.db_path {
        command.push_str(&format!(" --db-path {}", db_path.display()));
    }
    if let Some(limit) = args.limit {
        command.push_str(&format!(" --limit {limit}"));
    }
    command.push_str(&format!(
        " --proxy-suffix {} --promo-marker {} --delimiter {}",
        args.proxy_suffix, args.promo_marker, args.delimiter
    ));
    command
}
