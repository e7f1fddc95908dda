use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use super::strip::text_content;
use crate::model::ContactDetail;

const EMAIL_OBFUSCATION: &str = " (at) ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBlock {
    pub contacts: Vec<ContactDetail>,
    pub url: Option<String>,
}

#[derive(Debug, Default)]
struct SectionFields {
    telephone: Option<String>,
    fax: Option<String>,
    email: Option<String>,
    url: Option<String>,
    address: Vec<String>,
    standalone_urls: Vec<String>,
}

/// Splits an address blob into contact entries and the site URLs listed with them.
///
/// Sections end at a blank line or at a line closing a `<p>`/`<div>`; inside a
/// section, lines break on `<br>` and on plain newlines.
#[derive(Debug)]
pub struct ContactParser {
    line_break: Regex,
    proxy_suffix: String,
}

impl ContactParser {
    pub fn new(proxy_suffix: &str) -> Result<Self> {
        Ok(Self {
            line_break: Regex::new(r"(?i)<br\s*/?>").context("failed to compile line break regex")?,
            proxy_suffix: proxy_suffix.to_string(),
        })
    }

    pub fn parse(&self, text: Option<&str>) -> ContactBlock {
        let mut block = ContactBlock::default();
        let Some(text) = text else {
            return block;
        };

        let mut urls = Vec::<String>::new();
        for section in split_sections(text) {
            let lines = section
                .into_iter()
                .flat_map(|chunk| self.line_break.split(chunk))
                .map(text_content)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>();

            if lines.is_empty() {
                break;
            }

            let fields = scan_section(lines);
            let has_url = fields.url.is_some();
            let has_value = fields.has_any_value();
            urls.extend(fields.standalone_urls);
            urls.extend(fields.url);

            if fields.address.is_empty() {
                if !has_url && has_value {
                    debug!("dropping contact section without address lines");
                }
                continue;
            }

            block.contacts.push(ContactDetail {
                address: fields.address.join("\n"),
                telephone: fields.telephone,
                fax: fields.fax,
                email: fields.email,
            });
        }

        if !urls.is_empty() {
            let cleaned = urls
                .iter()
                .map(|url| self.without_proxy(url))
                .collect::<Vec<_>>();
            block.url = Some(cleaned.join(", "));
        }

        block
    }

    fn without_proxy(&self, url: &str) -> String {
        if self.proxy_suffix.is_empty() {
            url.to_string()
        } else {
            url.replace(&self.proxy_suffix, "")
        }
    }
}

impl SectionFields {
    fn has_any_value(&self) -> bool {
        self.telephone.is_some() || self.fax.is_some() || self.email.is_some()
    }
}

fn split_sections(text: &str) -> Vec<Vec<&str>> {
    let mut sections = Vec::new();
    let mut current = Vec::new();

    for chunk in text.split('\n') {
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(chunk);
        if closes_block(trimmed) {
            sections.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        sections.push(current);
    }

    sections
}

fn closes_block(line: &str) -> bool {
    let lowered = line.to_ascii_lowercase();
    lowered.ends_with("</p>") || lowered.ends_with("</div>")
}

fn prefixed_value(line: &str, prefix: &str) -> Option<Option<String>> {
    let value = line.strip_prefix(prefix)?.trim();
    Some(if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    })
}

fn scan_section(lines: Vec<String>) -> SectionFields {
    let mut fields = SectionFields::default();

    for line in lines {
        if let Some(value) = prefixed_value(&line, "Tel:") {
            fields.telephone = value;
        } else if let Some(value) = prefixed_value(&line, "Fax:") {
            fields.fax = value;
        } else if let Some(value) = prefixed_value(&line, "Email:") {
            fields.email = value.map(|email| email.replace(EMAIL_OBFUSCATION, "@"));
        } else if let Some(value) = prefixed_value(&line, "URL:") {
            fields.url = value;
        } else if line.starts_with("http") {
            fields.standalone_urls.push(line);
        } else {
            fields.address.push(line);
        }
    }

    fields
}
