//! URL to domain normalization.

use url::Url;

use crate::types::Domain;

/// URL schemes browsers use for their own extension pages.
const EXTENSION_SCHEMES: &[&str] = &[
    "chrome-extension",
    "moz-extension",
    "safari-web-extension",
    "edge-extension",
];

/// Extracts the normalized domain of a URL.
///
/// Returns `None` for unparseable URLs, URLs without a host, extension pages,
/// and hosts that are not fully qualified (no dot after stripping every
/// leading `www.`).
pub fn extract_domain(raw: &str) -> Option<Domain> {
    let url = Url::parse(raw.trim()).ok()?;
    if EXTENSION_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    let mut host = host.as_str();
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    if !host.contains('.') {
        return None;
    }
    Domain::new(host).ok()
}
