use regex::Regex;
use scraper::{Html, Selector};

use super::strip::{collapse_whitespace, strip_tags};

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Text of the first `<div>` in the cell; the page wraps the news date in one.
pub fn clean_news_date(cell: Option<&str>) -> Option<String> {
    let cell = cell?.trim();
    if cell.is_empty() {
        return None;
    }

    let selector = Selector::parse("div").ok()?;
    let fragment = Html::parse_fragment(cell);
    let div = fragment.select(&selector).next()?;
    non_empty(collapse_whitespace(&div.text().collect::<String>()))
}

/// One segment per line, segments separated by `delimiter` in the stripped text.
pub fn clean_delimited(cell: Option<&str>, delimiter: &Regex) -> Option<String> {
    let text = strip_tags(cell?, &[], None);
    let segments = delimiter
        .split(&text)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    non_empty(segments.join("\n"))
}

/// Short classification code before the first colon, e.g. "N: Non-governmental" -> "N".
pub fn clean_type_code(cell: Option<&str>) -> Option<String> {
    let text = strip_tags(cell?, &[], None);
    let (code, _) = text.split_once(':')?;
    non_empty(code.trim().to_string())
}

pub fn clean_text(
    cell: Option<&str>,
    whitelist: &[&str],
    promo_marker: Option<&str>,
) -> Option<String> {
    non_empty(strip_tags(cell?, whitelist, promo_marker))
}
