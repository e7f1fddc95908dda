use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.2.0";

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS organizations (
          id_org INTEGER PRIMARY KEY,
          org_name TEXT NOT NULL,
          org_url TEXT,
          org_acronym_t TEXT,
          org_founded_t TEXT,
          org_city_hq_t TEXT,
          org_country_hq_t TEXT,
          org_type_i_t TEXT,
          org_type_ii_t TEXT,
          org_type_iii_t TEXT,
          org_uia_id_t TEXT,
          org_subject_t TEXT
        );

        CREATE TABLE IF NOT EXISTS organizations_raw (
          fk_org INTEGER NOT NULL PRIMARY KEY,
          FOREIGN KEY (fk_org) REFERENCES organizations (id_org) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS organizations_final (
          id_org INTEGER PRIMARY KEY,
          org_name TEXT NOT NULL,
          org_acronym TEXT,
          org_url TEXT,
          org_founded INTEGER,
          org_city_hq TEXT,
          org_country_hq TEXT,
          org_type_i TEXT,
          org_type_ii TEXT,
          org_type_iii TEXT,
          org_uia_id TEXT,
          org_website TEXT,
          org_history TEXT,
          org_aims TEXT,
          org_events TEXT,
          org_activities TEXT,
          org_structure TEXT,
          org_staff TEXT,
          org_financing TEXT,
          org_publications TEXT,
          org_information_services TEXT,
          org_last_news TEXT,
          FOREIGN KEY (id_org) REFERENCES organizations (id_org) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS subjects (
          id_subject INTEGER PRIMARY KEY AUTOINCREMENT,
          subject_name TEXT NOT NULL,
          subject_parent TEXT NOT NULL DEFAULT '',
          UNIQUE (subject_name, subject_parent)
        );

        CREATE TABLE IF NOT EXISTS orgs_subjects (
          fk_org INTEGER NOT NULL,
          fk_subject INTEGER NOT NULL,
          PRIMARY KEY (fk_org, fk_subject),
          FOREIGN KEY (fk_org) REFERENCES organizations_final (id_org) ON DELETE CASCADE,
          FOREIGN KEY (fk_subject) REFERENCES subjects (id_subject) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS contacts (
          id_contact INTEGER PRIMARY KEY AUTOINCREMENT,
          contact_address TEXT NOT NULL,
          contact_phone TEXT,
          contact_fax TEXT,
          contact_email TEXT
        );

        CREATE TABLE IF NOT EXISTS orgs_contacts (
          fk_org INTEGER NOT NULL,
          fk_contact INTEGER NOT NULL,
          PRIMARY KEY (fk_org, fk_contact),
          FOREIGN KEY (fk_org) REFERENCES organizations_final (id_org) ON DELETE CASCADE,
          FOREIGN KEY (fk_contact) REFERENCES contacts (id_contact) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_orgs_subjects_subject ON orgs_subjects(fk_subject);
        CREATE INDEX IF NOT EXISTS idx_orgs_contacts_contact ON orgs_contacts(fk_contact);
        ",
        )
        .context("failed to create yearbook schema")?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

/// Column names of `table` in declaration order; empty when the table does not exist.
pub fn table_columns(connection: &Connection, table_name: &str) -> Result<Vec<String>> {
    let pragma_sql = format!("PRAGMA table_info(\"{table_name}\")");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        columns.push(name);
    }

    Ok(columns)
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows: {sql}"))?;
    Ok(count)
}
