use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::listing::parse_selector;
use crate::cli::{CaptureArgs, resolve_db_path};
use crate::commands::clean::collapse_whitespace;
use crate::model::{CaptureManifest, CapturedPage, RawOrganizationRecord};
use crate::store::listing::ensure_listing_stub;
use crate::store::raw::{RAW_KEY_COLUMN, column_name_for_heading};
use crate::store::{RawStore, open_database};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

/// Raw column holding the page title.
pub const NAME_COLUMN: &str = "org_name";

const SKIPPED_SIBLINGS: &[&str] = &["script", "style", "noscript"];

pub fn run(args: CaptureArgs) -> Result<()> {
    let started = Utc::now();
    let pages_dir = args
        .pages_dir
        .clone()
        .unwrap_or_else(|| args.data_root.join("pages"));
    let db_path = resolve_db_path(&args.data_root, args.db_path.as_ref());
    let extractor = PageExtractor::new()?;

    let page_paths = discover_pages(&pages_dir)?;
    if page_paths.is_empty() {
        bail!("no saved organization pages found in {}", pages_dir.display());
    }
    info!(pages = page_paths.len(), source = %pages_dir.display(), "starting capture");

    let mut connection = if args.dry_run {
        None
    } else {
        Some(open_database(&db_path)?)
    };
    let mut raw_store = match &connection {
        Some(connection) => Some(RawStore::open(connection)?),
        None => None,
    };

    let mut pages = Vec::with_capacity(page_paths.len());
    let mut warnings = Vec::new();

    for path in page_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let Some(fk_org) = page_id(&path) else {
            warn!(file = %filename, "page filename is not an organization id, skipping");
            warnings.push(format!("skipped {filename}: filename is not an organization id"));
            continue;
        };

        let html = fs::read_to_string(&path)
            .with_context(|| format!("failed to read page {}", path.display()))?;
        let record = extractor.extract(fk_org, &html);
        let org_name = record.get(NAME_COLUMN).unwrap_or_default().to_string();
        if org_name.is_empty() {
            warnings.push(format!("{filename} has no <h1> organization name"));
        }

        if let Some(json_dir) = &args.json_dir {
            write_json_pretty(&json_dir.join(format!("{fk_org}.json")), &record_as_json(&record))?;
        }

        let inserted = match (connection.as_mut(), raw_store.as_mut()) {
            (Some(connection), Some(raw_store)) => {
                ensure_listing_stub(connection, fk_org, &org_name)?;
                raw_store.insert(connection, &record)?
            }
            _ => false,
        };

        pages.push(CapturedPage {
            filename,
            fk_org,
            sha256: sha256_file(&path)?,
            field_count: record.fields.len(),
            inserted,
        });
    }

    let manifest = CaptureManifest {
        manifest_version: 1,
        run_id: format!("capture-{}", utc_compact_string(started)),
        generated_at: now_utc_string(),
        source_directory: pages_dir.display().to_string(),
        page_count: pages.len(),
        inserted_count: pages.iter().filter(|page| page.inserted).count(),
        raw_column_count: raw_store
            .as_ref()
            .map(|store| store.field_columns().count())
            .unwrap_or_default(),
        pages,
        warnings,
    };

    if args.dry_run {
        info!(
            pages = manifest.page_count,
            source = %manifest.source_directory,
            "capture dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.data_root
            .join("manifests")
            .join(format!("capture_{}.json", utc_compact_string(started)))
    });
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote capture manifest");
    info!(
        pages = manifest.page_count,
        inserted = manifest.inserted_count,
        raw_columns = manifest.raw_column_count,
        "capture completed"
    );

    Ok(())
}

/// Splits a saved organization page into raw fields, one per `<h2>` section.
#[derive(Debug)]
pub struct PageExtractor {
    content: Selector,
    title: Selector,
    section: Selector,
}

impl PageExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            content: parse_selector("#content")?,
            title: parse_selector("h1")?,
            section: parse_selector("h2")?,
        })
    }

    /// A section's value is the markup of every sibling after its heading up to
    /// the next `<h2>`, one sibling per line. Headings that normalize to nothing
    /// or to the name or key column are dropped.
    pub fn extract(&self, fk_org: i64, html: &str) -> RawOrganizationRecord {
        let document = Html::parse_document(html);
        let root = document
            .select(&self.content)
            .next()
            .unwrap_or_else(|| document.root_element());

        let mut record = RawOrganizationRecord::new(fk_org);
        let name = root
            .select(&self.title)
            .next()
            .map(|title| collapse_whitespace(&title.text().collect::<String>()))
            .unwrap_or_default();
        record.set(NAME_COLUMN, Some(name));

        for heading in root.select(&self.section) {
            let heading_text = heading.text().collect::<String>();
            let Some(column) = column_name_for_heading(&heading_text) else {
                warn!(fk_org, heading = %heading_text.trim(), "unusable section heading");
                continue;
            };
            if column == NAME_COLUMN || column == RAW_KEY_COLUMN {
                warn!(
                    fk_org,
                    heading = %heading_text.trim(),
                    "section heading shadows a reserved column"
                );
                continue;
            }

            let body = section_body(heading);
            record.set(&column, if body.is_empty() { None } else { Some(body) });
        }

        record
    }
}

fn section_body(heading: ElementRef<'_>) -> String {
    let mut parts = Vec::new();

    for sibling in heading.next_siblings() {
        match sibling.value() {
            Node::Element(element) if element.name() == "h2" => break,
            Node::Element(element) if SKIPPED_SIBLINGS.contains(&element.name()) => {}
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(sibling) {
                    parts.push(element.html());
                }
            }
            Node::Text(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
            _ => {}
        }
    }

    parts.join("\n")
}

fn page_id(path: &Path) -> Option<i64> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<i64>().ok())
}

fn record_as_json(record: &RawOrganizationRecord) -> Value {
    let mut object = Map::new();
    object.insert("fk_org".to_string(), Value::from(record.fk_org));
    for (name, value) in &record.fields {
        object.insert(
            name.clone(),
            value.clone().map(Value::String).unwrap_or(Value::Null),
        );
    }
    Value::Object(object)
}

fn discover_pages(pages_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();

    let entries = fs::read_dir(pages_dir)
        .with_context(|| format!("failed to read {}", pages_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", pages_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);

        if is_html {
            pages.push(path);
        }
    }

    pages.sort();
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rusqlite::Connection;

    use super::{NAME_COLUMN, PageExtractor, page_id, record_as_json};
    use crate::store::RawStore;
    use crate::store::listing::ensure_listing_stub;
    use crate::store::schema::ensure_schema;

    const PAGE: &str = r#"
    <html><body>
      <div id="header"><h2>Navigation</h2><p>menu</p></div>
      <div id="content">
        <h1> World  Council of Churches </h1>
        <script>var tracking = 1;</script>
        <h2>Aims</h2>
        <p>Promote <em>unity</em>.</p>
        <h2>Contact Details</h2>
        <p>Route de Ferney 150<br>Geneva</p>
        plain trailing text
        <script>ignored()</script>
        <h2>Last News Received</h2>
        <div>2021</div>
        <h2>Events</h2>
      </div>
    </body></html>
    "#;

    #[test]
    fn extract_splits_content_into_sections() {
        let extractor = PageExtractor::new().expect("extractor should build");
        let record = extractor.extract(5, PAGE);

        assert_eq!(record.fk_org, 5);
        assert_eq!(record.get(NAME_COLUMN), Some("World Council of Churches"));
        assert_eq!(record.get("aims"), Some("<p>Promote <em>unity</em>.</p>"));
        assert_eq!(
            record.get("contact_details"),
            Some("<p>Route de Ferney 150<br>Geneva</p>\nplain trailing text")
        );
        assert_eq!(record.get("last_news_received"), Some("<div>2021</div>"));
        assert_eq!(record.get("events"), None);
        assert!(record.get("navigation").is_none());

        let names = record.field_names().collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![NAME_COLUMN, "aims", "contact_details", "last_news_received", "events"]
        );
    }

    #[test]
    fn extract_without_content_block_reads_whole_page() {
        let extractor = PageExtractor::new().expect("extractor should build");
        let record = extractor.extract(9, "<h1>Solo</h1><h2>History</h2><p>Founded 1901.</p>");

        assert_eq!(record.get(NAME_COLUMN), Some("Solo"));
        assert_eq!(record.get("history"), Some("<p>Founded 1901.</p>"));
    }

    #[test]
    fn extract_drops_sections_named_like_reserved_columns() {
        let extractor = PageExtractor::new().expect("extractor should build");
        let record = extractor.extract(
            4,
            "<h1>Keyed</h1><h2>FK Org</h2><p>42</p><h2>Org Name</h2><p>Other</p>\
             <h2>Aims</h2><p>Kept.</p>",
        );

        assert_eq!(record.field_names().collect::<Vec<_>>(), vec![NAME_COLUMN, "aims"]);
        assert_eq!(record.get(NAME_COLUMN), Some("Keyed"));
    }

    #[test]
    fn extracted_record_with_key_heading_still_inserts() {
        let mut connection = Connection::open_in_memory().expect("in-memory database should open");
        ensure_schema(&connection).expect("schema should initialize");
        let extractor = PageExtractor::new().expect("extractor should build");
        let record = extractor.extract(4, "<h1>Keyed</h1><h2>FK Org</h2><p>42</p>");

        ensure_listing_stub(&connection, 4, "Keyed").expect("stub should insert");
        let mut store = RawStore::open(&connection).expect("raw store should open");
        assert!(store.insert(&mut connection, &record).expect("raw insert should succeed"));
    }

    #[test]
    fn page_id_reads_numeric_file_stem() {
        assert_eq!(page_id(Path::new("pages/1100012345.html")), Some(1_100_012_345));
        assert_eq!(page_id(Path::new("pages/index.html")), None);
    }

    #[test]
    fn json_dump_keeps_nulls_and_key() {
        let extractor = PageExtractor::new().expect("extractor should build");
        let value = record_as_json(&extractor.extract(5, PAGE));

        assert_eq!(value["fk_org"], 5);
        assert_eq!(value["aims"], "<p>Promote <em>unity</em>.</p>");
        assert!(value["events"].is_null());
    }
}
