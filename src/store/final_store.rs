use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::model::{CleanOrganizationRecord, CleanedOrganization, ContactDetail};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub inserted: bool,
    pub contacts: usize,
    pub subject_links: usize,
}

/// Inserts the finalized row; an existing identifier is left untouched.
pub fn insert_organization(
    connection: &Connection,
    record: &CleanOrganizationRecord,
) -> Result<bool> {
    let changed = connection
        .execute(
            "
            INSERT OR IGNORE INTO organizations_final(
              id_org, org_name, org_acronym, org_url, org_founded, org_city_hq, org_country_hq,
              org_type_i, org_type_ii, org_type_iii, org_uia_id, org_website,
              org_history, org_aims, org_events, org_activities, org_structure, org_staff,
              org_financing, org_publications, org_information_services, org_last_news
            )
            VALUES(
              ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
              ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
            )
            ",
            params![
                record.id_org,
                record.name,
                record.acronym,
                record.url,
                record.founded,
                record.city_hq,
                record.country_hq,
                record.type_i,
                record.type_ii,
                record.type_iii,
                record.uia_id,
                record.website,
                record.history,
                record.aims,
                record.events,
                record.activities,
                record.structure,
                record.staff,
                record.financing,
                record.publications,
                record.information_services,
                record.last_news,
            ],
        )
        .with_context(|| format!("failed to insert organization {}", record.id_org))?;

    Ok(changed == 1)
}

pub fn find_or_create_subject(connection: &Connection, name: &str, parent: &str) -> Result<i64> {
    let existing: Option<i64> = connection
        .query_row(
            "SELECT id_subject FROM subjects WHERE subject_name = ?1 AND subject_parent = ?2",
            params![name, parent],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to look up subject {name:?} under {parent:?}"))?;

    if let Some(id_subject) = existing {
        return Ok(id_subject);
    }

    connection
        .execute(
            "INSERT INTO subjects(subject_name, subject_parent) VALUES(?1, ?2)",
            params![name, parent],
        )
        .with_context(|| format!("failed to create subject {name:?} under {parent:?}"))?;
    debug!(subject = name, parent = parent, "created subject");

    Ok(connection.last_insert_rowid())
}

/// Returns whether a new link row was written.
pub fn link_org_subject(connection: &Connection, id_org: i64, id_subject: i64) -> Result<bool> {
    let changed = connection
        .execute(
            "INSERT OR IGNORE INTO orgs_subjects(fk_org, fk_subject) VALUES(?1, ?2)",
            params![id_org, id_subject],
        )
        .with_context(|| format!("failed to link organization {id_org} to subject {id_subject}"))?;
    Ok(changed == 1)
}

pub fn create_contact(connection: &Connection, contact: &ContactDetail) -> Result<i64> {
    connection
        .execute(
            "
            INSERT INTO contacts(contact_address, contact_phone, contact_fax, contact_email)
            VALUES(?1, ?2, ?3, ?4)
            ",
            params![
                contact.address,
                contact.telephone,
                contact.fax,
                contact.email
            ],
        )
        .context("failed to create contact")?;
    Ok(connection.last_insert_rowid())
}

pub fn link_org_contact(connection: &Connection, id_org: i64, id_contact: i64) -> Result<()> {
    connection
        .execute(
            "INSERT INTO orgs_contacts(fk_org, fk_contact) VALUES(?1, ?2)",
            params![id_org, id_contact],
        )
        .with_context(|| format!("failed to link organization {id_org} to contact {id_contact}"))?;
    Ok(())
}

/// Writes one organization with its contacts and subjects in a single transaction.
/// Children are skipped when the organization row already existed.
pub fn persist(
    connection: &mut Connection,
    cleaned: &CleanedOrganization,
) -> Result<PersistOutcome> {
    let id_org = cleaned.record.id_org;
    let tx = connection
        .transaction()
        .with_context(|| format!("failed to begin transaction for organization {id_org}"))?;

    let mut outcome = PersistOutcome::default();
    if !insert_organization(&tx, &cleaned.record)? {
        info!(id_org, name = %cleaned.record.name, "skipping organization, already finalized");
        tx.commit()?;
        return Ok(outcome);
    }
    outcome.inserted = true;

    for contact in &cleaned.contacts {
        let id_contact = create_contact(&tx, contact)?;
        link_org_contact(&tx, id_org, id_contact)?;
        outcome.contacts += 1;
    }

    for subject in &cleaned.subjects {
        let id_subject = find_or_create_subject(&tx, &subject.name, &subject.parent)?;
        if link_org_subject(&tx, id_org, id_subject)? {
            outcome.subject_links += 1;
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit organization {id_org}"))?;

    Ok(outcome)
}
