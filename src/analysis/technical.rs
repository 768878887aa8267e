//! Technical issue detection
//!
//! Per-page rule checks, site-level checks, and crawl-time findings (redirect
//! chains, broken links) folded in as issues.

use crate::crawler::{CrawlReport, CrawledPage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

const TITLE_MAX_CHARS: usize = 60;
const TITLE_MIN_CHARS: usize = 30;
const META_DESCRIPTION_MAX_CHARS: usize = 160;
const META_DESCRIPTION_MIN_CHARS: usize = 70;

/// Below this many words a page is critically thin
const THIN_CONTENT_CRITICAL_WORDS: usize = 100;
/// Below this many words a page is thin
const THIN_CONTENT_WARNING_WORDS: usize = 300;

const URL_MAX_CHARS: usize = 100;

/// Default maximum Flesch-Kincaid grade before readability is flagged
const DEFAULT_READING_GRADE_LIMIT: f64 = 12.0;
/// Grade limit for sections whose audience expects dense prose
const TECHNICAL_READING_GRADE_LIMIT: f64 = 16.0;

/// Sections held to [`TECHNICAL_READING_GRADE_LIMIT`]
const TECHNICAL_SECTIONS: &[&str] = &[
    "docs",
    "documentation",
    "api",
    "reference",
    "developers",
    "research",
    "papers",
    "whitepapers",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Notice,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingTitle,
    DuplicateTitle,
    TitleTooLong,
    TitleTooShort,
    MissingMetaDescription,
    DuplicateMetaDescription,
    MetaDescriptionTooLong,
    MetaDescriptionTooShort,
    MissingH1,
    MultipleH1,
    ThinContent,
    MissingCanonical,
    MissingStructuredData,
    MissingViewport,
    HighReadingGrade,
    UppercaseUrl,
    UnderscoreUrl,
    LongUrl,
    QueryStringUrl,
    MissingRobotsTxt,
    MissingSitemap,
    RedirectChain,
    BrokenLink,
}

/// One finding, either about a page (`url` set) or about the whole site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub url: Option<String>,
    pub message: String,
}

impl TechnicalIssue {
    fn page(kind: IssueKind, severity: Severity, url: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            url: Some(url.to_string()),
            message: message.into(),
        }
    }

    fn site(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            url: None,
            message: message.into(),
        }
    }
}

/// Runs every technical check over a crawl
///
/// Issues are ordered: per-page issues in crawl order, then site-level
/// issues, then redirect chains, then broken links.
pub fn detect_technical_issues(report: &CrawlReport) -> Vec<TechnicalIssue> {
    let title_counts = count_values(report.pages.iter().map(|p| p.title.as_deref()));
    let description_counts =
        count_values(report.pages.iter().map(|p| p.meta_description.as_deref()));

    let mut issues = Vec::new();

    for page in &report.pages {
        check_title(page, &title_counts, &mut issues);
        check_meta_description(page, &description_counts, &mut issues);
        check_headings(page, &mut issues);
        check_content(page, &mut issues);
        check_markup(page, &mut issues);
        check_url_hygiene(&page.url, &mut issues);
    }

    if !report.site.has_robots_txt {
        issues.push(TechnicalIssue::site(
            IssueKind::MissingRobotsTxt,
            Severity::Warning,
            "No robots.txt was found at the site root",
        ));
    }
    if !report.site.has_sitemap {
        issues.push(TechnicalIssue::site(
            IssueKind::MissingSitemap,
            Severity::Warning,
            "No XML sitemap was found",
        ));
    }

    for chain in &report.redirect_chains {
        issues.push(TechnicalIssue::page(
            IssueKind::RedirectChain,
            Severity::Warning,
            chain.origin(),
            format!(
                "Redirect chain of {} hops ends at {}",
                chain.hops,
                chain.destination()
            ),
        ));
    }

    for link in &report.broken_links {
        let status = link
            .status
            .map(|s| format!("HTTP {}", s))
            .unwrap_or_else(|| "no response".to_string());
        issues.push(TechnicalIssue::page(
            IssueKind::BrokenLink,
            Severity::Critical,
            &link.source_url,
            format!("Link to {} is broken ({})", link.target_url, status),
        ));
    }

    tracing::debug!(
        "Technical analysis found {} issues across {} pages",
        issues.len(),
        report.pages.len()
    );

    issues
}

/// Counts case-insensitive occurrences of each non-empty value
fn count_values<'a>(values: impl Iterator<Item = Option<&'a str>>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for value in values.flatten() {
        let key = value.trim().to_lowercase();
        if !key.is_empty() {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

fn is_duplicate(value: &str, counts: &HashMap<String, usize>) -> bool {
    counts
        .get(&value.trim().to_lowercase())
        .is_some_and(|&count| count > 1)
}

fn check_title(
    page: &CrawledPage,
    counts: &HashMap<String, usize>,
    issues: &mut Vec<TechnicalIssue>,
) {
    let Some(title) = page.title.as_deref().filter(|t| !t.trim().is_empty()) else {
        issues.push(TechnicalIssue::page(
            IssueKind::MissingTitle,
            Severity::Critical,
            &page.url,
            "Page has no <title>",
        ));
        return;
    };

    if is_duplicate(title, counts) {
        issues.push(TechnicalIssue::page(
            IssueKind::DuplicateTitle,
            Severity::Warning,
            &page.url,
            format!("Title \"{}\" is used by more than one page", title),
        ));
    }

    let length = title.chars().count();
    if length > TITLE_MAX_CHARS {
        issues.push(TechnicalIssue::page(
            IssueKind::TitleTooLong,
            Severity::Notice,
            &page.url,
            format!("Title is {} characters (max {})", length, TITLE_MAX_CHARS),
        ));
    } else if length < TITLE_MIN_CHARS {
        issues.push(TechnicalIssue::page(
            IssueKind::TitleTooShort,
            Severity::Notice,
            &page.url,
            format!("Title is {} characters (min {})", length, TITLE_MIN_CHARS),
        ));
    }
}

fn check_meta_description(
    page: &CrawledPage,
    counts: &HashMap<String, usize>,
    issues: &mut Vec<TechnicalIssue>,
) {
    let Some(description) = page
        .meta_description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    else {
        issues.push(TechnicalIssue::page(
            IssueKind::MissingMetaDescription,
            Severity::Warning,
            &page.url,
            "Page has no meta description",
        ));
        return;
    };

    if is_duplicate(description, counts) {
        issues.push(TechnicalIssue::page(
            IssueKind::DuplicateMetaDescription,
            Severity::Warning,
            &page.url,
            "Meta description is used by more than one page",
        ));
    }

    let length = description.chars().count();
    if length > META_DESCRIPTION_MAX_CHARS {
        issues.push(TechnicalIssue::page(
            IssueKind::MetaDescriptionTooLong,
            Severity::Notice,
            &page.url,
            format!(
                "Meta description is {} characters (max {})",
                length, META_DESCRIPTION_MAX_CHARS
            ),
        ));
    } else if length < META_DESCRIPTION_MIN_CHARS {
        issues.push(TechnicalIssue::page(
            IssueKind::MetaDescriptionTooShort,
            Severity::Notice,
            &page.url,
            format!(
                "Meta description is {} characters (min {})",
                length, META_DESCRIPTION_MIN_CHARS
            ),
        ));
    }
}

fn check_headings(page: &CrawledPage, issues: &mut Vec<TechnicalIssue>) {
    match page.h1_count {
        0 => issues.push(TechnicalIssue::page(
            IssueKind::MissingH1,
            Severity::Warning,
            &page.url,
            "Page has no <h1>",
        )),
        1 => {}
        n => issues.push(TechnicalIssue::page(
            IssueKind::MultipleH1,
            Severity::Notice,
            &page.url,
            format!("Page has {} <h1> elements", n),
        )),
    }
}

fn check_content(page: &CrawledPage, issues: &mut Vec<TechnicalIssue>) {
    let severity = if page.word_count < THIN_CONTENT_CRITICAL_WORDS {
        Some(Severity::Critical)
    } else if page.word_count < THIN_CONTENT_WARNING_WORDS {
        Some(Severity::Warning)
    } else {
        None
    };

    if let Some(severity) = severity {
        issues.push(TechnicalIssue::page(
            IssueKind::ThinContent,
            severity,
            &page.url,
            format!("Page has only {} words", page.word_count),
        ));
    }

    let limit = reading_grade_limit(&page.section);
    if page.readability_grade > limit {
        issues.push(TechnicalIssue::page(
            IssueKind::HighReadingGrade,
            Severity::Notice,
            &page.url,
            format!(
                "Reading grade {:.1} exceeds {:.0} for section \"{}\"",
                page.readability_grade, limit, page.section
            ),
        ));
    }
}

/// Maximum acceptable reading grade for pages in `section`
pub(crate) fn reading_grade_limit(section: &str) -> f64 {
    if TECHNICAL_SECTIONS.contains(&section) {
        TECHNICAL_READING_GRADE_LIMIT
    } else {
        DEFAULT_READING_GRADE_LIMIT
    }
}

fn check_markup(page: &CrawledPage, issues: &mut Vec<TechnicalIssue>) {
    if page.canonical.is_none() {
        issues.push(TechnicalIssue::page(
            IssueKind::MissingCanonical,
            Severity::Notice,
            &page.url,
            "Page has no canonical link",
        ));
    }
    if !page.has_schema {
        issues.push(TechnicalIssue::page(
            IssueKind::MissingStructuredData,
            Severity::Notice,
            &page.url,
            "Page has no structured data",
        ));
    }
    if !page.has_viewport {
        issues.push(TechnicalIssue::page(
            IssueKind::MissingViewport,
            Severity::Warning,
            &page.url,
            "Page has no viewport meta tag",
        ));
    }
}

fn check_url_hygiene(page_url: &str, issues: &mut Vec<TechnicalIssue>) {
    let Ok(url) = Url::parse(page_url) else {
        return;
    };
    let path = url.path();

    if path.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push(TechnicalIssue::page(
            IssueKind::UppercaseUrl,
            Severity::Notice,
            page_url,
            "URL path contains uppercase characters",
        ));
    }
    if path.contains('_') {
        issues.push(TechnicalIssue::page(
            IssueKind::UnderscoreUrl,
            Severity::Notice,
            page_url,
            "URL path uses underscores instead of hyphens",
        ));
    }
    if page_url.chars().count() > URL_MAX_CHARS {
        issues.push(TechnicalIssue::page(
            IssueKind::LongUrl,
            Severity::Notice,
            page_url,
            format!("URL is longer than {} characters", URL_MAX_CHARS),
        ));
    }
    if url.query().is_some_and(|q| !q.is_empty()) {
        issues.push(TechnicalIssue::page(
            IssueKind::QueryStringUrl,
            Severity::Notice,
            page_url,
            "URL carries a query string",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{page, report};
    use crate::crawler::{BrokenLink, RedirectChain};

    fn kinds_for(issues: &[TechnicalIssue], url: &str) -> Vec<IssueKind> {
        issues
            .iter()
            .filter(|i| i.url.as_deref() == Some(url))
            .map(|i| i.kind)
            .collect()
    }

    #[test]
    fn test_clean_page_has_no_issues() {
        let issues = detect_technical_issues(&report(vec![page("https://example.com/guide")]));
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_title_checks() {
        let mut missing = page("https://example.com/a");
        missing.title = None;
        let mut short = page("https://example.com/b");
        short.title = Some("Short".to_string());
        let mut long = page("https://example.com/c");
        long.title = Some("x".repeat(61));

        let issues = detect_technical_issues(&report(vec![missing, short, long]));
        assert_eq!(kinds_for(&issues, "https://example.com/a"), vec![IssueKind::MissingTitle]);
        assert_eq!(kinds_for(&issues, "https://example.com/b"), vec![IssueKind::TitleTooShort]);
        assert_eq!(kinds_for(&issues, "https://example.com/c"), vec![IssueKind::TitleTooLong]);
    }

    #[test]
    fn test_duplicate_titles_flag_every_copy() {
        let mut a = page("https://example.com/a");
        let mut b = page("https://example.com/b");
        a.title = Some("The Same Title Used On Two Pages".to_string());
        b.title = Some("the same title used on two pages ".to_string());

        let issues = detect_technical_issues(&report(vec![a, b]));
        let duplicates = issues
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicateTitle)
            .count();
        assert_eq!(duplicates, 2);
    }

    #[test]
    fn test_meta_description_and_heading_checks() {
        let mut p = page("https://example.com/a");
        p.meta_description = Some("Too short".to_string());
        p.h1_count = 3;

        let issues = detect_technical_issues(&report(vec![p]));
        assert_eq!(
            kinds_for(&issues, "https://example.com/a"),
            vec![IssueKind::MetaDescriptionTooShort, IssueKind::MultipleH1]
        );
    }

    #[test]
    fn test_thin_content_tiers() {
        let mut critical = page("https://example.com/a");
        critical.word_count = 40;
        let mut warning = page("https://example.com/b");
        warning.word_count = 250;

        let issues = detect_technical_issues(&report(vec![critical, warning]));
        let thin: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::ThinContent)
            .map(|i| i.severity)
            .collect();
        assert_eq!(thin, vec![Severity::Critical, Severity::Warning]);
    }

    #[test]
    fn test_reading_grade_is_section_aware() {
        let mut blog = page("https://example.com/blog/post");
        blog.readability_grade = 14.0;
        let mut docs = page("https://example.com/docs/setup");
        docs.readability_grade = 14.0;

        let issues = detect_technical_issues(&report(vec![blog, docs]));
        assert_eq!(
            kinds_for(&issues, "https://example.com/blog/post"),
            vec![IssueKind::HighReadingGrade]
        );
        assert!(kinds_for(&issues, "https://example.com/docs/setup").is_empty());
    }

    #[test]
    fn test_markup_and_url_hygiene() {
        let mut p = page("https://example.com/My_Page?ref=1");
        p.canonical = None;
        p.has_schema = false;
        p.has_viewport = false;

        let issues = detect_technical_issues(&report(vec![p]));
        assert_eq!(
            kinds_for(&issues, "https://example.com/My_Page?ref=1"),
            vec![
                IssueKind::MissingCanonical,
                IssueKind::MissingStructuredData,
                IssueKind::MissingViewport,
                IssueKind::UppercaseUrl,
                IssueKind::UnderscoreUrl,
                IssueKind::QueryStringUrl,
            ]
        );
    }

    #[test]
    fn test_site_level_and_crawl_findings() {
        let mut r = report(vec![page("https://example.com/a")]);
        r.site.has_robots_txt = false;
        r.site.has_sitemap = false;
        r.redirect_chains.push(
            RedirectChain::from_urls(vec![
                "https://example.com/1".to_string(),
                "https://example.com/2".to_string(),
                "https://example.com/3".to_string(),
                "https://example.com/4".to_string(),
            ])
            .unwrap(),
        );
        r.broken_links.push(BrokenLink {
            source_url: "https://example.com/a".to_string(),
            target_url: "https://example.com/gone".to_string(),
            status: Some(404),
        });

        let issues = detect_technical_issues(&r);
        let site: Vec<_> = issues.iter().filter(|i| i.url.is_none()).map(|i| i.kind).collect();
        assert_eq!(site, vec![IssueKind::MissingRobotsTxt, IssueKind::MissingSitemap]);

        let broken = issues
            .iter()
            .find(|i| i.kind == IssueKind::BrokenLink)
            .unwrap();
        assert_eq!(broken.severity, Severity::Critical);
        assert!(broken.message.contains("HTTP 404"));

        let chain = issues
            .iter()
            .find(|i| i.kind == IssueKind::RedirectChain)
            .unwrap();
        assert_eq!(chain.url.as_deref(), Some("https://example.com/1"));
        assert_eq!(chain.severity, Severity::Warning);
    }
}
