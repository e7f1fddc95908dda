use rusqlite::Connection;

use super::final_store::{find_or_create_subject, insert_organization, link_org_subject, persist};
use super::listing::{ensure_listing_stub, founding_year, insert_listing, load_meta};
use super::raw::{RawStore, column_name_for_heading};
use super::schema::{count_rows, ensure_schema, table_columns};
use crate::model::{
    CleanOrganizationRecord, CleanedOrganization, ContactDetail, OrganizationListing,
    RawOrganizationRecord, Subject,
};

fn memory_db() -> Connection {
    let connection = Connection::open_in_memory().expect("in-memory database should open");
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .expect("foreign keys should enable");
    ensure_schema(&connection).expect("schema should initialize");
    connection
}

fn listing(id_org: i64, name: &str) -> OrganizationListing {
    OrganizationListing {
        id_org,
        org_name: name.to_string(),
        org_url: format!("/s/or/en/{id_org}"),
        org_founded: Some("1950".to_string()),
        ..OrganizationListing::default()
    }
}

fn cleaned(id_org: i64, subjects: &[(&str, &str)]) -> CleanedOrganization {
    CleanedOrganization {
        record: CleanOrganizationRecord {
            id_org,
            name: format!("Org {id_org}"),
            ..CleanOrganizationRecord::default()
        },
        contacts: vec![ContactDetail {
            address: "1 Rue de la Paix\nGeneva".to_string(),
            telephone: Some("+41 22 000".to_string()),
            ..ContactDetail::default()
        }],
        subjects: subjects
            .iter()
            .map(|(name, parent)| Subject {
                name: name.to_string(),
                parent: parent.to_string(),
            })
            .collect(),
    }
}

#[test]
fn column_name_for_heading_normalizes_headings() {
    assert_eq!(
        column_name_for_heading(" Last News Received "),
        Some("last_news_received".to_string())
    );
    assert_eq!(
        column_name_for_heading("IGO Relations (UN)"),
        Some("igo_relations_un".to_string())
    );
    assert_eq!(column_name_for_heading("2nd Office"), Some("field_2nd_office".to_string()));
    assert_eq!(column_name_for_heading("  ::  "), None);
}

#[test]
fn raw_store_widens_schema_and_keeps_existing_columns() {
    let mut connection = memory_db();
    insert_listing(&connection, &listing(7, "Seven")).expect("listing insert");
    insert_listing(&connection, &listing(8, "Eight")).expect("listing insert");

    let mut store = RawStore::open(&connection).expect("raw store should open");
    assert_eq!(store.columns(), ["fk_org".to_string()]);

    let first = RawOrganizationRecord::new(7)
        .with_field("aims", "<p>Promote peace.</p>")
        .with_field("history", "Founded 1950.");
    assert!(store.insert(&mut connection, &first).expect("first insert"));

    let second = RawOrganizationRecord::new(8).with_field("subjects", "<ul></ul>");
    assert!(store.insert(&mut connection, &second).expect("second insert"));

    let columns = table_columns(&connection, "organizations_raw").expect("columns");
    assert_eq!(columns, vec!["fk_org", "aims", "history", "subjects"]);
    assert_eq!(store.columns(), columns.as_slice());

    let records = store.load_records(&connection, None).expect("load records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("aims"), Some("<p>Promote peace.</p>"));
    assert_eq!(records[0].get("subjects"), None);
    assert_eq!(records[1].get("subjects"), Some("<ul></ul>"));
}

#[test]
fn raw_store_ignores_duplicate_keys() {
    let mut connection = memory_db();
    insert_listing(&connection, &listing(7, "Seven")).expect("listing insert");
    let mut store = RawStore::open(&connection).expect("raw store should open");

    let record = RawOrganizationRecord::new(7).with_field("aims", "first");
    assert!(store.insert(&mut connection, &record).expect("insert"));

    let replacement = RawOrganizationRecord::new(7).with_field("aims", "second");
    assert!(!store.insert(&mut connection, &replacement).expect("duplicate insert"));

    let loaded = store
        .load_record(&connection, 7)
        .expect("load")
        .expect("record should exist");
    assert_eq!(loaded.get("aims"), Some("first"));
}

#[test]
fn raw_store_rejects_unnormalized_field_names() {
    let mut connection = memory_db();
    insert_listing(&connection, &listing(7, "Seven")).expect("listing insert");
    let mut store = RawStore::open(&connection).expect("raw store should open");

    let record = RawOrganizationRecord::new(7).with_field("aims\"; DROP TABLE x; --", "text");
    assert!(store.insert(&mut connection, &record).is_err());
    assert_eq!(store.columns(), ["fk_org".to_string()]);
}

#[test]
fn organization_insert_is_idempotent() {
    let connection = memory_db();
    insert_listing(&connection, &listing(3, "Three")).expect("listing insert");

    let record = CleanOrganizationRecord {
        id_org: 3,
        name: "Three".to_string(),
        ..CleanOrganizationRecord::default()
    };
    assert!(insert_organization(&connection, &record).expect("first insert"));

    let renamed = CleanOrganizationRecord {
        name: "Renamed".to_string(),
        ..record.clone()
    };
    assert!(!insert_organization(&connection, &renamed).expect("second insert"));

    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM organizations_final").expect("count"),
        1
    );
    let name: String = connection
        .query_row("SELECT org_name FROM organizations_final WHERE id_org = 3", [], |row| {
            row.get(0)
        })
        .expect("name");
    assert_eq!(name, "Three");
}

#[test]
fn subjects_are_shared_between_organizations() {
    let mut connection = memory_db();
    insert_listing(&connection, &listing(1, "One")).expect("listing insert");
    insert_listing(&connection, &listing(2, "Two")).expect("listing insert");

    persist(&mut connection, &cleaned(1, &[("Journalism", "Media")])).expect("persist 1");
    persist(
        &mut connection,
        &cleaned(2, &[("Journalism", "Media"), ("Media", "")]),
    )
    .expect("persist 2");

    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM subjects").expect("count"),
        2
    );
    let shared: i64 = connection
        .query_row(
            "SELECT COUNT(DISTINCT fk_subject) FROM orgs_subjects
             WHERE fk_subject = (
               SELECT id_subject FROM subjects WHERE subject_name = 'Journalism'
             )",
            [],
            |row| row.get(0),
        )
        .expect("shared");
    assert_eq!(shared, 1);
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM orgs_subjects").expect("count"),
        3
    );

    let first = find_or_create_subject(&connection, "Media", "").expect("lookup");
    let second = find_or_create_subject(&connection, "Media", "").expect("lookup");
    assert_eq!(first, second);
    assert!(!link_org_subject(&connection, 2, first).expect("relink"));
}

#[test]
fn persist_skips_children_for_existing_organization() {
    let mut connection = memory_db();
    insert_listing(&connection, &listing(5, "Five")).expect("listing insert");

    let outcome = persist(&mut connection, &cleaned(5, &[("Media", "")])).expect("persist");
    assert!(outcome.inserted);
    assert_eq!(outcome.contacts, 1);
    assert_eq!(outcome.subject_links, 1);

    let again = persist(&mut connection, &cleaned(5, &[("Media", "")])).expect("persist again");
    assert!(!again.inserted);
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM contacts").expect("count"),
        1
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM orgs_contacts").expect("count"),
        1
    );
}

#[test]
fn persist_rolls_back_when_organization_has_no_listing() {
    let mut connection = memory_db();

    assert!(persist(&mut connection, &cleaned(99, &[("Media", "")])).is_err());
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM organizations_final").expect("count"),
        0
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM contacts").expect("count"),
        0
    );
}

#[test]
fn load_meta_resolves_listing_text() {
    let connection = memory_db();
    let mut row = listing(11, "Eleven");
    row.org_founded = Some("c. 1948, reorganized 1960".to_string());
    row.org_type_i = Some("B: Universal membership organizations".to_string());
    insert_listing(&connection, &row).expect("listing insert");
    assert!(!insert_listing(&connection, &row).expect("duplicate listing"));
    assert!(!ensure_listing_stub(&connection, 11, "Other").expect("stub"));

    let meta = load_meta(&connection, 11)
        .expect("load")
        .expect("meta should exist");
    assert_eq!(meta.name, "Eleven");
    assert_eq!(meta.founded, Some(1948));
    assert_eq!(meta.url.as_deref(), Some("/s/or/en/11"));
    assert!(load_meta(&connection, 12).expect("load").is_none());
}

#[test]
fn founding_year_requires_four_digits() {
    assert_eq!(founding_year("1919"), Some(1919));
    assert_eq!(founding_year("12 May 1960"), Some(1960));
    assert_eq!(founding_year("19th century"), None);
    assert_eq!(founding_year(""), None);
}
