use anyhow::{Result, bail};

use super::config::CleanConfig;
use super::contacts::ContactParser;
use super::fields::{clean_delimited, clean_news_date, clean_text, clean_type_code};
use super::strip::INLINE_WHITELIST;
use super::subjects::parse_subject_tree;
use crate::model::{
    CleanOrganizationRecord, CleanedOrganization, OrganizationMeta, RawOrganizationRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetField {
    History,
    Aims,
    Events,
    Activities,
    Structure,
    Staff,
    Financing,
    Publications,
    InformationServices,
    LastNews,
    TypeI,
    TypeII,
    TypeIII,
    UiaId,
    Contacts,
    Subjects,
    Members,
}

/// Raw column names accepted for each target field, first non-empty wins.
const FIELD_ALIASES: &[(TargetField, &[&str])] = &[
    (TargetField::History, &["history"]),
    (TargetField::Aims, &["aims"]),
    (TargetField::Events, &["events"]),
    (TargetField::Activities, &["activities"]),
    (TargetField::Structure, &["structure"]),
    (TargetField::Staff, &["staff"]),
    (TargetField::Financing, &["financing", "finance"]),
    (TargetField::Publications, &["publications"]),
    (
        TargetField::InformationServices,
        &["information_services", "information_service"],
    ),
    (TargetField::LastNews, &["last_news_received", "last_news"]),
    (TargetField::TypeI, &["type_i_classification"]),
    (TargetField::TypeII, &["type_ii_classification"]),
    (TargetField::TypeIII, &["type_iii_classification"]),
    (TargetField::UiaId, &["uia_org_id", "uia_id"]),
    (
        TargetField::Contacts,
        &["contact_details", "contact", "addresses", "address"],
    ),
    (TargetField::Subjects, &["subjects", "subject"]),
    (TargetField::Members, &["members", "membership"]),
];

/// Columns captured from the page but not given relational fields.
const UNCLEANED_COLUMNS: &[&str] = &[
    "org_name",
    "founded",
    "languages",
    "igo_relations",
    "ngo_relations",
    "consultative_status",
];

pub fn raw_field<'a>(raw: &'a RawOrganizationRecord, target: TargetField) -> Option<&'a str> {
    FIELD_ALIASES
        .iter()
        .filter(|(field, _)| *field == target)
        .flat_map(|(_, aliases)| aliases.iter())
        .filter_map(|alias| raw.get(alias))
        .find(|value| !value.trim().is_empty())
}

/// Non-empty raw columns that no target field reads.
pub fn unmapped_columns(raw: &RawOrganizationRecord) -> Vec<String> {
    raw.fields
        .iter()
        .filter(|(_, value)| value.as_deref().is_some_and(|text| !text.trim().is_empty()))
        .map(|(name, _)| name)
        .filter(|name| {
            !UNCLEANED_COLUMNS.contains(&name.as_str())
                && !FIELD_ALIASES
                    .iter()
                    .any(|(_, aliases)| aliases.contains(&name.as_str()))
        })
        .cloned()
        .collect()
}

#[derive(Debug)]
pub struct RecordCleaner {
    config: CleanConfig,
    contacts: ContactParser,
}

impl RecordCleaner {
    pub fn new(config: CleanConfig) -> Result<Self> {
        let contacts = ContactParser::new(&config.proxy_suffix)?;
        Ok(Self { config, contacts })
    }

    pub fn assemble(
        &self,
        meta: &OrganizationMeta,
        raw: &RawOrganizationRecord,
    ) -> Result<CleanedOrganization> {
        if meta.id_org != raw.fk_org {
            bail!(
                "listing {} does not match raw record {}",
                meta.id_org,
                raw.fk_org
            );
        }
        if meta.name.trim().is_empty() {
            bail!("organization {} has no name in the listing", meta.id_org);
        }

        let promo = Some(self.config.promo_marker.as_str());
        let field = |target| raw_field(raw, target);
        let narrative = |target| clean_text(field(target), INLINE_WHITELIST, promo);
        let plain = |target| clean_text(field(target), &[], None);
        let type_code = |target, listed: &Option<String>| {
            clean_type_code(field(target)).or_else(|| clean_type_code(listed.as_deref()))
        };

        let contact_block = self.contacts.parse(field(TargetField::Contacts));

        let record = CleanOrganizationRecord {
            id_org: meta.id_org,
            name: meta.name.trim().to_string(),
            acronym: meta.acronym.clone(),
            url: meta.url.clone(),
            founded: meta.founded,
            city_hq: meta.city_hq.clone(),
            country_hq: meta.country_hq.clone(),
            type_i: type_code(TargetField::TypeI, &meta.type_i),
            type_ii: type_code(TargetField::TypeII, &meta.type_ii),
            type_iii: type_code(TargetField::TypeIII, &meta.type_iii),
            uia_id: plain(TargetField::UiaId).or_else(|| meta.uia_id.clone()),
            website: contact_block.url,
            history: narrative(TargetField::History),
            aims: narrative(TargetField::Aims),
            events: plain(TargetField::Events),
            activities: narrative(TargetField::Activities),
            structure: clean_delimited(field(TargetField::Structure), &self.config.delimiter),
            staff: plain(TargetField::Staff),
            financing: plain(TargetField::Financing),
            publications: clean_delimited(
                field(TargetField::Publications),
                &self.config.delimiter,
            ),
            information_services: plain(TargetField::InformationServices),
            last_news: clean_news_date(field(TargetField::LastNews)),
        };

        Ok(CleanedOrganization {
            record,
            contacts: contact_block.contacts,
            subjects: parse_subject_tree(field(TargetField::Subjects)),
        })
    }
}
