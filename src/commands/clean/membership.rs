use anyhow::{Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

use super::strip::{collapse_whitespace, strip_tags};

pub const COUNTRY_SUMMARY_MARKER: &str = "Members in";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaxonomyLine {
    Heading { label: String },
    Subheading { label: String },
    Line { text: String },
    Link { text: String, url: String },
    CountrySummary { countries: u32, continents: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

/// Every anchor in the fragment, in document order.
pub fn extract_links(fragment: &str) -> Vec<Link> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };

    Html::parse_fragment(fragment)
        .select(&selector)
        .map(|anchor| Link {
            text: collapse_whitespace(&anchor.text().collect::<String>()),
            url: anchor.value().attr("href").unwrap_or_default().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MembershipState {
    Normal,
    SubheadingPending(String),
}

/// Sentence-by-sentence reader for membership lists such as
/// "Full members (12): ... • Associate members: <a>..</a>, <a>..</a>. Members in 45 countries."
#[derive(Debug)]
pub struct MembershipParser {
    sentence_end: Regex,
    subheading: Regex,
    heading: Regex,
    count_suffix: Regex,
    integer: Regex,
}

impl MembershipParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sentence_end: Regex::new(r"\.(?:\s+|$)")
                .context("failed to compile sentence end regex")?,
            subheading: Regex::new(r"•\s*([^•:<]+?)\s*:\s*")
                .context("failed to compile subheading regex")?,
            heading: Regex::new(r"^([^:<•]+):").context("failed to compile heading regex")?,
            count_suffix: Regex::new(r"\s*\(\s*\d+\s*\)\s*$")
                .context("failed to compile count suffix regex")?,
            integer: Regex::new(r"\d+").context("failed to compile integer regex")?,
        })
    }

    pub fn parse(&self, text: Option<&str>) -> Vec<TaxonomyLine> {
        let mut lines = Vec::new();
        let Some(text) = text else {
            return lines;
        };

        let stripped = strip_tags(text, &["a"], None);
        let mut state = MembershipState::Normal;

        for raw_sentence in self.sentence_end.split(&stripped) {
            let mut sentence = raw_sentence.trim().to_string();
            if sentence.is_empty() {
                continue;
            }

            let mut new_subheading = None;
            if let Some(captures) = self.subheading.captures(&sentence) {
                let span = captures.get(0).map(|m| m.range());
                let label = captures
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                if let Some(span) = span {
                    sentence.replace_range(span, " ");
                }
                new_subheading = Some(label);
            }

            let mut rest = sentence.trim();
            if let Some(captures) = self.heading.captures(rest) {
                let matched_len = captures.get(0).map(|m| m.end()).unwrap_or_default();
                let label = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                let label = self.count_suffix.replace(label.trim(), "").trim().to_string();
                if !label.is_empty() {
                    lines.push(TaxonomyLine::Heading { label });
                }
                rest = rest[matched_len..].trim();
                if new_subheading.is_none() {
                    state = MembershipState::Normal;
                }
            }

            if let Some(label) = new_subheading {
                lines.push(TaxonomyLine::Subheading {
                    label: label.clone(),
                });
                state = MembershipState::SubheadingPending(label);
                push_link_pieces(rest, &mut lines);
                continue;
            }

            if rest.is_empty() {
                continue;
            }

            let plain = strip_tags(rest, &[], None);
            if plain.starts_with(COUNTRY_SUMMARY_MARKER) {
                state = MembershipState::Normal;
                lines.push(
                    self.country_summary(&plain)
                        .unwrap_or(TaxonomyLine::Line { text: plain }),
                );
                continue;
            }

            match &state {
                MembershipState::SubheadingPending(label) => {
                    debug!(subheading = %label, "continuing subheading block");
                    push_link_pieces(rest, &mut lines);
                }
                MembershipState::Normal => {
                    if !plain.is_empty() {
                        lines.push(TaxonomyLine::Line { text: plain });
                    }
                }
            }
        }

        lines
    }

    fn country_summary(&self, text: &str) -> Option<TaxonomyLine> {
        let mut numbers = self
            .integer
            .find_iter(text)
            .filter_map(|m| m.as_str().parse::<u32>().ok());
        let countries = numbers.next()?;
        let continents = numbers.next().unwrap_or(0);
        Some(TaxonomyLine::CountrySummary {
            countries,
            continents,
        })
    }
}

fn push_link_pieces(rest: &str, lines: &mut Vec<TaxonomyLine>) {
    for piece in rest.split(',') {
        for link in extract_links(piece) {
            lines.push(TaxonomyLine::Link {
                text: link.text,
                url: link.url,
            });
        }
    }
}
