use anyhow::{Context, Result};
use regex::Regex;

use crate::cli::CleanArgs;
#[cfg(test)]
use crate::cli::{DEFAULT_DELIMITER, DEFAULT_PROMO_MARKER, DEFAULT_PROXY_SUFFIX};

/// Site-specific knobs for the cleaning pass.
#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Proxy host suffix removed from collected URLs.
    pub proxy_suffix: String,
    /// Anchors whose href contains this are the site's own search links.
    pub promo_marker: String,
    pub delimiter: Regex,
}

impl CleanConfig {
    pub fn new(proxy_suffix: &str, promo_marker: &str, delimiter: &str) -> Result<Self> {
        Ok(Self {
            proxy_suffix: proxy_suffix.to_string(),
            promo_marker: promo_marker.to_string(),
            delimiter: Regex::new(delimiter)
                .with_context(|| format!("invalid delimiter pattern: {delimiter}"))?,
        })
    }

    pub fn from_args(args: &CleanArgs) -> Result<Self> {
        Self::new(&args.proxy_suffix, &args.promo_marker, &args.delimiter)
    }

    #[cfg(test)]
    pub fn defaults() -> Result<Self> {
        Self::new(DEFAULT_PROXY_SUFFIX, DEFAULT_PROMO_MARKER, DEFAULT_DELIMITER)
    }
}
