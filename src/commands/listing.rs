use std::fs;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::cli::{ListingArgs, resolve_db_path};
use crate::commands::clean::collapse_whitespace;
use crate::model::OrganizationListing;
use crate::store::listing::insert_listing;
use crate::store::open_database;

const LISTING_ROWS: &str = ".view-yearbook-working .views-table tr";
const FALLBACK_ROWS: &str = "table tr";

pub fn run(args: ListingArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.data_root, args.db_path.as_ref());
    let connection = open_database(&db_path)?;
    let parser = ListingParser::new()?;

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;

    for page in &args.pages {
        let html = fs::read_to_string(page)
            .with_context(|| format!("failed to read listing page {}", page.display()))?;
        let listings = parser.parse(&html, args.subject.as_deref());
        if listings.is_empty() {
            warn!(page = %page.display(), "no organization rows found on listing page");
        }

        for listing in &listings {
            if insert_listing(&connection, listing)? {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }

        info!(page = %page.display(), rows = listings.len(), "processed listing page");
    }

    info!(
        db = %db_path.display(),
        pages = args.pages.len(),
        inserted,
        skipped,
        "listing completed"
    );

    Ok(())
}

/// Reads the organization table of a saved subject listing page.
#[derive(Debug)]
pub struct ListingParser {
    rows: Selector,
    fallback_rows: Selector,
    cells: Selector,
    anchor: Selector,
    trailing_id: Regex,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            rows: parse_selector(LISTING_ROWS)?,
            fallback_rows: parse_selector(FALLBACK_ROWS)?,
            cells: parse_selector("td")?,
            anchor: parse_selector("a[href]")?,
            trailing_id: Regex::new(r"/(\d+)$").context("failed to compile organization id regex")?,
        })
    }

    /// Columns are name (linked), acronym, founded, city, country, the three type
    /// labels and the directory id. Rows without a numbered organization link are skipped.
    pub fn parse(&self, html: &str, subject: Option<&str>) -> Vec<OrganizationListing> {
        let document = Html::parse_document(html);
        let mut rows = document.select(&self.rows).collect::<Vec<_>>();
        if rows.is_empty() {
            rows = document.select(&self.fallback_rows).collect();
        }

        rows.into_iter()
            .filter_map(|row| self.parse_row(row, subject))
            .collect()
    }

    fn parse_row(&self, row: ElementRef<'_>, subject: Option<&str>) -> Option<OrganizationListing> {
        let cells = row.select(&self.cells).collect::<Vec<_>>();
        let name_cell = cells.first()?;

        let Some(anchor) = name_cell.select(&self.anchor).next() else {
            warn!(
                row = %cell_text(*name_cell).unwrap_or_default(),
                "listing row without organization link"
            );
            return None;
        };
        let org_url = anchor.value().attr("href").unwrap_or_default().trim().to_string();
        let Some(id_org) = self
            .trailing_id
            .captures(&org_url)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
        else {
            warn!(url = %org_url, "organization link without numeric id");
            return None;
        };

        let column = |index: usize| cells.get(index).copied().and_then(cell_text);

        Some(OrganizationListing {
            id_org,
            org_name: collapse_whitespace(&anchor.text().collect::<String>()),
            org_url,
            org_acronym: column(1),
            org_founded: column(2),
            org_city_hq: column(3),
            org_country_hq: column(4),
            org_type_i: column(5),
            org_type_ii: column(6),
            org_type_iii: column(7),
            org_uia_id: column(8),
            org_subject: subject.map(ToOwned::to_owned),
        })
    }
}

fn cell_text(cell: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&cell.text().collect::<String>());
    if text.is_empty() { None } else { Some(text) }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector {css}: {err:?}"))
}

#[cfg(test)]
mod tests {
    use super::ListingParser;

    const PAGE: &str = r#"
    <html><body>
      <div class="view-yearbook-working">
        <table class="views-table">
          <thead><tr><th>Name</th><th>Acronym</th><th>Founded</th></tr></thead>
          <tbody>
            <tr>
              <td><a href="/s/or/en/1100012345"> International   Council of Nurses </a></td>
              <td>ICN</td><td>1899</td><td>Geneva</td><td>Switzerland</td>
              <td>B</td><td>y</td><td> </td><td>AA1234</td>
            </tr>
            <tr>
              <td>No link here</td><td>X</td>
            </tr>
            <tr>
              <td><a href="/s/or/en/1100054321">World Veterinary Association</a></td>
              <td></td><td>1863</td>
            </tr>
          </tbody>
        </table>
      </div>
      <table><tr><td><a href="/s/or/en/999">Footer table</a></td></tr></table>
    </body></html>
    "#;

    #[test]
    fn parse_reads_rows_and_blank_cells_become_none() {
        let parser = ListingParser::new().expect("parser should build");
        let listings = parser.parse(PAGE, Some("Health"));

        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.id_org, 1_100_012_345);
        assert_eq!(first.org_name, "International Council of Nurses");
        assert_eq!(first.org_url, "/s/or/en/1100012345");
        assert_eq!(first.org_acronym.as_deref(), Some("ICN"));
        assert_eq!(first.org_founded.as_deref(), Some("1899"));
        assert_eq!(first.org_country_hq.as_deref(), Some("Switzerland"));
        assert_eq!(first.org_type_ii.as_deref(), Some("y"));
        assert_eq!(first.org_type_iii, None);
        assert_eq!(first.org_uia_id.as_deref(), Some("AA1234"));
        assert_eq!(first.org_subject.as_deref(), Some("Health"));

        let second = &listings[1];
        assert_eq!(second.id_org, 1_100_054_321);
        assert_eq!(second.org_acronym, None);
        assert_eq!(second.org_city_hq, None);
        assert_eq!(second.org_uia_id, None);
    }

    #[test]
    fn parse_falls_back_to_any_table() {
        let parser = ListingParser::new().expect("parser should build");
        let page =
            r#"<table><tr><td><a href="https://host/s/or/en/42">Plain Org</a></td></tr></table>"#;
        let listings = parser.parse(page, None);

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id_org, 42);
        assert_eq!(listings[0].org_subject, None);
    }

    #[test]
    fn parse_skips_links_without_trailing_id() {
        let parser = ListingParser::new().expect("parser should build");
        let page = r#"<table><tr><td><a href="/s/or/en/42/">Slash</a></td></tr></table>"#;
        assert!(parser.parse(page, None).is_empty());
    }
}
