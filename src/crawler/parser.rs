//! HTML parser for extracting page signals
//!
//! A page is parsed once; every field of [`CrawledPage`] is derived from that
//! single document:
//! - title, headings, meta description, canonical, viewport
//! - visible body text, word count, readability grade
//! - same-host outbound links
//! - schema.org types (JSON-LD and microdata)
//! - code block and image counts

use crate::crawler::readability::flesch_kincaid_grade;
use crate::crawler::report::CrawledPage;
use crate::url::{resolve_and_normalize, same_host, section_of};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is never visible content
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Parses HTML content into a [`CrawledPage`]
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` resolving to the same hostname as `page_url`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links
/// - links to other hosts
///
/// # Example
///
/// ```
/// use site_audit::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><h1>Hi</h1><a href="/page/">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let page = parse_page(html, &page_url, 200, 10_000);
/// assert_eq!(page.title.as_deref(), Some("Test"));
/// assert_eq!(page.internal_links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_page(html: &str, page_url: &Url, status_code: u16, max_content_chars: usize) -> CrawledPage {
    let document = Html::parse_document(html);

    let h1s = select_texts(&document, "h1");
    let full_text = visible_text(&document);
    let word_count = full_text.split_whitespace().count();
    let schema_types = extract_schema_types(&document);
    let has_schema = !schema_types.is_empty() || has_selector(&document, "script[type='application/ld+json']");

    CrawledPage {
        url: page_url.to_string(),
        status_code,
        title: select_texts(&document, "title").into_iter().next(),
        h1: h1s.first().cloned(),
        h1_count: h1s.len(),
        h2s: select_texts(&document, "h2"),
        h3s: select_texts(&document, "h3"),
        meta_description: select_attr(&document, "meta[name='description']", "content"),
        canonical: select_attr(&document, "link[rel='canonical']", "href"),
        has_viewport: has_selector(&document, "meta[name='viewport']"),
        readability_grade: flesch_kincaid_grade(&full_text),
        content: full_text.chars().take(max_content_chars).collect(),
        word_count,
        section: section_of(page_url),
        internal_links: extract_internal_links(&document, page_url),
        has_schema,
        schema_types,
        code_block_count: count(&document, "pre"),
        image_count: count(&document, "img"),
        images_missing_alt: count_images_missing_alt(&document),
    }
}

/// Extracts same-host links from an HTML document without building a full page
pub fn extract_links_simple(html: &str, page_url: &Url) -> Vec<String> {
    extract_internal_links(&Html::parse_document(html), page_url)
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_texts(document: &Html, css: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };

    document
        .select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn select_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn has_selector(document: &Html, css: &str) -> bool {
    count(document, css) > 0
}

fn count(document: &Html, css: &str) -> usize {
    selector(css)
        .map(|sel| document.select(&sel).count())
        .unwrap_or(0)
}

fn count_images_missing_alt(document: &Html) -> usize {
    let Some(sel) = selector("img") else {
        return 0;
    };
    document
        .select(&sel)
        .filter(|img| {
            img.value()
                .attr("alt")
                .map(|alt| alt.trim().is_empty())
                .unwrap_or(true)
        })
        .count()
}

/// Collects visible text under `<body>`, skipping script-like elements
fn visible_text(document: &Html) -> String {
    let Some(body_sel) = selector("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_sel).next() else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map(|el| HIDDEN_TEXT_ELEMENTS.contains(&el.value().name()))
                .unwrap_or(false)
        });
        if !hidden {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    collapse_whitespace(&parts.join(" "))
}

fn extract_internal_links(document: &Html, page_url: &Url) -> Vec<String> {
    let Some(a_selector) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_link(href, page_url) else {
            continue;
        };
        if !same_host(&resolved, page_url) {
            continue;
        }
        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid or non-HTTP(S) URLs
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();

    if href.is_empty()
        || href.starts_with('#')
        || lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    resolve_and_normalize(base_url, href).ok()
}

/// Collects schema.org types from JSON-LD blocks and microdata `itemtype`s
fn extract_schema_types(document: &Html) -> Vec<String> {
    let mut types = Vec::new();

    if let Some(sel) = selector("script[type='application/ld+json']") {
        for script in document.select(&sel) {
            let raw = script.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                collect_ld_types(&value, &mut types);
            }
        }
    }

    if let Some(sel) = selector("[itemtype]") {
        for element in document.select(&sel) {
            if let Some(itemtype) = element.value().attr("itemtype") {
                for t in itemtype.split_whitespace() {
                    if let Some(name) = t.trim_end_matches('/').rsplit('/').next() {
                        if !name.is_empty() {
                            types.push(name.to_string());
                        }
                    }
                }
            }
        }
    }

    let mut seen = HashSet::new();
    types.retain(|t| seen.insert(t.clone()));
    types
}

fn collect_ld_types(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_ld_types(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            match map.get("@type") {
                Some(serde_json::Value::String(t)) => out.push(t.clone()),
                Some(serde_json::Value::Array(ts)) => {
                    out.extend(ts.iter().filter_map(|t| t.as_str().map(str::to_string)))
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_ld_types(graph, out);
            }
        }
        _ => {}
    }
}
