//! URL handling module for Site-Audit
//!
//! This module provides URL normalization, site-section classification and the
//! network safety gate applied before every request.

mod normalize;
mod safety;

pub use normalize::{normalize_url, resolve_and_normalize, same_host};
pub use safety::{is_public, SafetyError, SafetyGate};

use url::Url;

/// Path prefixes that are never crawled: auth, checkout and legal pages
const DENYLISTED_SECTIONS: &[&str] = &[
    "login",
    "logout",
    "signin",
    "sign-in",
    "signup",
    "sign-up",
    "register",
    "account",
    "auth",
    "cart",
    "checkout",
    "admin",
    "wp-admin",
    "wp-login.php",
    "privacy",
    "privacy-policy",
    "terms",
    "terms-of-service",
    "legal",
    "cookie-policy",
    "cookies",
];

/// Extensions that never carry HTML
const NON_HTML_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "css", "js", "json", "xml", "zip",
    "gz", "tar", "mp3", "mp4", "mov", "avi", "woff", "woff2", "ttf", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx",
];

/// Name of the section used for pages at the site root
pub const ROOT_SECTION: &str = "root";

/// Returns the site section of a URL: its first path segment, lowercased
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_audit::url::section_of;
///
/// assert_eq!(section_of(&Url::parse("https://example.com/Blog/post-1").unwrap()), "blog");
/// assert_eq!(section_of(&Url::parse("https://example.com/").unwrap()), "root");
/// ```
pub fn section_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| ROOT_SECTION.to_string())
}

/// Returns true if the URL falls in a section the crawler never visits
pub fn is_denylisted(url: &Url) -> bool {
    let section = section_of(url);
    DENYLISTED_SECTIONS.contains(&section.as_str())
}

/// Returns true if the URL path ends in an extension that is never HTML
pub fn has_non_html_extension(url: &Url) -> bool {
    let last = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");

    match last.rsplit_once('.') {
        Some((_, ext)) => NON_HTML_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}
