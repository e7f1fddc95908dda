use anyhow::{Context, Result, bail};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, TransactionBehavior, params_from_iter};
use tracing::{debug, info};

use super::schema::table_columns;
use crate::model::RawOrganizationRecord;

pub const RAW_TABLE: &str = "organizations_raw";
pub const RAW_KEY_COLUMN: &str = "fk_org";

/// Converts a page section heading into a raw column name: lowercase, spaces to
/// underscores, anything outside `[a-z0-9_]` dropped.
pub fn column_name_for_heading(heading: &str) -> Option<String> {
    let mut name = String::with_capacity(heading.len());
    for ch in heading.trim().chars() {
        if ch.is_whitespace() {
            if !name.ends_with('_') {
                name.push('_');
            }
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            name.push(ch.to_ascii_lowercase());
        }
    }

    let name = name.trim_matches('_').to_string();
    if name.is_empty() {
        return None;
    }
    if name.starts_with(|ch: char| ch.is_ascii_digit()) {
        return Some(format!("field_{name}"));
    }
    Some(name)
}

fn validate_column_name(name: &str) -> Result<()> {
    if name == RAW_KEY_COLUMN {
        bail!("raw field name collides with key column: {name}");
    }
    if column_name_for_heading(name).as_deref() != Some(name) {
        bail!("raw field name is not a normalized column name: {name:?}");
    }
    Ok(())
}

/// Raw page storage whose text columns grow as new page sections are seen.
///
/// The column list is an append-only registry: columns are only ever added, as
/// TEXT, and the registry is re-read under the write lock before each insert.
#[derive(Debug, Clone)]
pub struct RawStore {
    table: String,
    columns: Vec<String>,
}

impl RawStore {
    pub fn open(connection: &Connection) -> Result<Self> {
        Self::for_table(connection, RAW_TABLE)
    }

    pub fn for_table(connection: &Connection, table: &str) -> Result<Self> {
        let columns = table_columns(connection, table)?;
        if !columns.iter().any(|column| column == RAW_KEY_COLUMN) {
            bail!("raw table {table} is missing or has no {RAW_KEY_COLUMN} column");
        }

        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Field columns, without the key column.
    pub fn field_columns(&self) -> impl Iterator<Item = &str> {
        self.columns()
            .iter()
            .map(String::as_str)
            .filter(|column| *column != RAW_KEY_COLUMN)
    }

    /// Adds every name not yet present as a TEXT column and returns the added names.
    pub fn ensure_columns<'a, I>(
        &mut self,
        connection: &Connection,
        names: I,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = Vec::new();

        for name in names {
            if self.columns.iter().any(|column| column == name) {
                continue;
            }
            validate_column_name(name)?;

            let alter_sql = format!("ALTER TABLE \"{}\" ADD COLUMN \"{}\" TEXT", self.table, name);
            connection
                .execute(&alter_sql, [])
                .with_context(|| format!("failed to add column {name} on {}", self.table))?;

            debug!(table = %self.table, column = name, "added raw column");
            self.columns.push(name.to_string());
            added.push(name.to_string());
        }

        Ok(added)
    }

    /// Widens the table for the record's fields and inserts it, ignoring an existing key.
    /// Returns whether a row was written.
    pub fn insert(
        &mut self,
        connection: &mut Connection,
        record: &RawOrganizationRecord,
    ) -> Result<bool> {
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin raw insert transaction")?;

        let mut working = Self {
            table: self.table.clone(),
            columns: table_columns(&tx, &self.table)?,
        };
        let added = working.ensure_columns(&tx, record.field_names())?;

        let mut column_list = vec![format!("\"{RAW_KEY_COLUMN}\"")];
        let mut values = vec![Value::Integer(record.fk_org)];
        for (name, value) in &record.fields {
            column_list.push(format!("\"{name}\""));
            values.push(match value {
                Some(text) => Value::Text(text.clone()),
                None => Value::Null,
            });
        }
        let placeholders = (1..=values.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");

        let insert_sql = format!(
            "INSERT OR IGNORE INTO \"{}\" ({}) VALUES ({})",
            self.table,
            column_list.join(", "),
            placeholders
        );
        let changed = tx
            .execute(&insert_sql, params_from_iter(values.iter()))
            .with_context(|| format!("failed to insert raw record for {}", record.fk_org))?;

        tx.commit().context("failed to commit raw insert")?;
        self.columns = working.columns;

        if !added.is_empty() {
            info!(fk_org = record.fk_org, added = ?added, "widened raw table");
        }

        Ok(changed == 1)
    }

    pub fn load_records(
        &self,
        connection: &Connection,
        limit: Option<usize>,
    ) -> Result<Vec<RawOrganizationRecord>> {
        let mut sql = format!("SELECT * FROM \"{}\" ORDER BY \"{RAW_KEY_COLUMN}\" ASC", self.table);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.query_records(connection, &sql, [])
    }

    pub fn load_record(
        &self,
        connection: &Connection,
        fk_org: i64,
    ) -> Result<Option<RawOrganizationRecord>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE \"{RAW_KEY_COLUMN}\" = ?1",
            self.table
        );
        let mut records = self.query_records(connection, &sql, [fk_org])?;
        Ok(records.pop())
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        connection: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<RawOrganizationRecord>> {
        let mut statement = connection
            .prepare(sql)
            .with_context(|| format!("failed to prepare raw query on {}", self.table))?;
        let column_names = statement
            .column_names()
            .into_iter()
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();
        let key_index = column_names
            .iter()
            .position(|name| name == RAW_KEY_COLUMN)
            .with_context(|| format!("{} has no {RAW_KEY_COLUMN} column", self.table))?;

        let mut rows = statement.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = RawOrganizationRecord::new(row.get(key_index)?);
            for (index, name) in column_names.iter().enumerate() {
                if index == key_index {
                    continue;
                }
                record.set(name, value_as_text(row.get_ref(index)?));
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn value_as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(number) => Some(number.to_string()),
        ValueRef::Real(number) => Some(number.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
