use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::model::{OrganizationListing, OrganizationMeta};

pub fn insert_listing(connection: &Connection, listing: &OrganizationListing) -> Result<bool> {
    let changed = connection
        .execute(
            "
            INSERT OR IGNORE INTO organizations(
              id_org, org_name, org_url, org_acronym_t, org_founded_t, org_city_hq_t,
              org_country_hq_t, org_type_i_t, org_type_ii_t, org_type_iii_t, org_uia_id_t,
              org_subject_t
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                listing.id_org,
                listing.org_name,
                listing.org_url,
                listing.org_acronym,
                listing.org_founded,
                listing.org_city_hq,
                listing.org_country_hq,
                listing.org_type_i,
                listing.org_type_ii,
                listing.org_type_iii,
                listing.org_uia_id,
                listing.org_subject,
            ],
        )
        .with_context(|| format!("failed to insert listing row {}", listing.id_org))?;

    if changed == 1 {
        info!(id_org = listing.id_org, name = %listing.org_name, "inserted organization");
    } else {
        info!(
            id_org = listing.id_org,
            name = %listing.org_name,
            "skipping organization, already in database"
        );
    }

    Ok(changed == 1)
}

/// Creates a bare master row for a page captured without a listing entry.
pub fn ensure_listing_stub(connection: &Connection, id_org: i64, name: &str) -> Result<bool> {
    let changed = connection
        .execute(
            "INSERT OR IGNORE INTO organizations(id_org, org_name) VALUES(?1, ?2)",
            params![id_org, name],
        )
        .with_context(|| format!("failed to insert listing stub {id_org}"))?;
    Ok(changed == 1)
}

pub fn load_meta(connection: &Connection, id_org: i64) -> Result<Option<OrganizationMeta>> {
    connection
        .query_row(
            "
            SELECT
              id_org, org_name, org_acronym_t, org_url, org_founded_t, org_city_hq_t,
              org_country_hq_t, org_type_i_t, org_type_ii_t, org_type_iii_t, org_uia_id_t
            FROM organizations
            WHERE id_org = ?1
            ",
            [id_org],
            |row| {
                let founded: Option<String> = row.get(4)?;
                Ok(OrganizationMeta {
                    id_org: row.get(0)?,
                    name: row.get(1)?,
                    acronym: row.get(2)?,
                    url: row.get(3)?,
                    founded: founded.as_deref().and_then(founding_year),
                    city_hq: row.get(5)?,
                    country_hq: row.get(6)?,
                    type_i: row.get(7)?,
                    type_ii: row.get(8)?,
                    type_iii: row.get(9)?,
                    uia_id: row.get(10)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to load organization {id_org}"))
}

/// First standalone four-digit number in a founded cell, e.g. "1948, Geneva" -> 1948.
pub fn founding_year(text: &str) -> Option<i64> {
    text.split(|ch: char| !ch.is_ascii_digit())
        .find(|run| run.len() == 4)
        .and_then(|run| run.parse().ok())
}
