use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// Longest URL accepted by any entry point
pub const MAX_URL_LENGTH: usize = 2048;

static SAFE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.-]+$").expect("static regex"));

/// Parse and sanity-check a user-supplied URL
///
/// A missing scheme is treated as `https://`. Only http and https are
/// accepted, and the host must be a plain DNS name or IPv4 address.
pub fn normalize_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("URL is empty".to_string()));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(Error::InvalidUrl(format!(
            "URL is longer than {MAX_URL_LENGTH} characters"
        )));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "unsupported scheme {:?} in {trimmed}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if SAFE_HOST.is_match(host) => Ok(url),
        Some(host) => Err(Error::InvalidUrl(format!("unsupported host {host:?}"))),
        None => Err(Error::InvalidUrl(format!("{trimmed} has no host"))),
    }
}

/// Lower-case a hostname and strip a single leading `www.`
pub fn normalize_host(host: &str) -> String {
    let lower = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => lower,
    }
}

/// Normalized host of a parsed URL
pub fn host_of(url: &Url) -> Result<String> {
    url.host_str()
        .map(normalize_host)
        .ok_or_else(|| Error::InvalidUrl(format!("{url} has no host")))
}

/// Normalize a bare domain as typed into the configuration tooling
pub fn validate_domain(domain: &str) -> Result<String> {
    let normalized = normalize_host(domain);
    if normalized.is_empty() || !SAFE_HOST.is_match(&normalized) {
        return Err(Error::InvalidConfig(format!("invalid domain {domain:?}")));
    }
    Ok(normalized)
}
