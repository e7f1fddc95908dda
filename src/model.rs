use serde::{Deserialize, Serialize};

/// One row of a subject listing page, as stored in the master `organizations` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationListing {
    pub id_org: i64,
    pub org_name: String,
    pub org_url: String,
    pub org_acronym: Option<String>,
    pub org_founded: Option<String>,
    pub org_city_hq: Option<String>,
    pub org_country_hq: Option<String>,
    pub org_type_i: Option<String>,
    pub org_type_ii: Option<String>,
    pub org_type_iii: Option<String>,
    pub org_uia_id: Option<String>,
    pub org_subject: Option<String>,
}

/// Listing data already resolved for one organization before its raw page is cleaned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationMeta {
    pub id_org: i64,
    pub name: String,
    pub acronym: Option<String>,
    pub url: Option<String>,
    pub founded: Option<i64>,
    pub city_hq: Option<String>,
    pub country_hq: Option<String>,
    pub type_i: Option<String>,
    pub type_ii: Option<String>,
    pub type_iii: Option<String>,
    pub uia_id: Option<String>,
}

/// Raw page fields keyed by column name, in raw-table column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrganizationRecord {
    pub fk_org: i64,
    pub fields: Vec<(String, Option<String>)>,
}

impl RawOrganizationRecord {
    pub fn new(fk_org: i64) -> Self {
        Self {
            fk_org,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.set(name, Some(value.to_string()));
        self
    }

    pub fn set(&mut self, name: &str, value: Option<String>) {
        match self.fields.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanOrganizationRecord {
    pub id_org: i64,
    pub name: String,
    pub acronym: Option<String>,
    pub url: Option<String>,
    pub founded: Option<i64>,
    pub city_hq: Option<String>,
    pub country_hq: Option<String>,
    pub type_i: Option<String>,
    pub type_ii: Option<String>,
    pub type_iii: Option<String>,
    pub uia_id: Option<String>,
    pub website: Option<String>,
    pub history: Option<String>,
    pub aims: Option<String>,
    pub events: Option<String>,
    pub activities: Option<String>,
    pub structure: Option<String>,
    pub staff: Option<String>,
    pub financing: Option<String>,
    pub publications: Option<String>,
    pub information_services: Option<String>,
    pub last_news: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactDetail {
    pub address: String,
    pub telephone: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Subject {
    pub name: String,
    pub parent: String,
}

/// A finalized record plus the child rows that go into the junction tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanedOrganization {
    pub record: CleanOrganizationRecord,
    pub contacts: Vec<ContactDetail>,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturedPage {
    pub filename: String,
    pub fk_org: i64,
    pub sha256: String,
    pub field_count: usize,
    pub inserted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub source_directory: String,
    pub page_count: usize,
    pub inserted_count: usize,
    pub raw_column_count: usize,
    pub pages: Vec<CapturedPage>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanCounts {
    pub raw_records: usize,
    pub cleaned: usize,
    pub already_present: usize,
    pub quarantined: usize,
    pub contacts_inserted: usize,
    pub subject_links_inserted: usize,
    pub unmapped_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanPaths {
    pub data_root: String,
    pub db_path: String,
    pub failure_log_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: CleanPaths,
    pub counts: CleanCounts,
    pub warnings: Vec<String>,
}

/// One quarantined record, appended to the failure log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanFailure {
    pub fk_org: i64,
    pub error: String,
    pub causes: Vec<String>,
    pub failed_at: String,
}
