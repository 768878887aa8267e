//! Local analyzers
//!
//! Pure functions over a finished crawl. None of them touch the network and
//! none of them can fail: every analyzer returns a (possibly empty) result.

mod duplicates;
mod linking;
mod technical;

pub use duplicates::{detect_duplicates, DuplicateGroup, DuplicateKind, NEAR_DUPLICATE_THRESHOLD};
pub use linking::{analyze_internal_links, LinkingReport, UNDERLINKED_THRESHOLD};
pub use technical::{detect_technical_issues, IssueKind, Severity, TechnicalIssue};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::crawler::{CrawlReport, CrawledPage, SiteFlags};

    /// A page that passes every per-page technical check
    pub fn page(url: &str) -> CrawledPage {
        let words = "healthy page content with plenty of distinct words ".repeat(40);
        CrawledPage {
            url: url.to_string(),
            status_code: 200,
            title: Some(format!("Page title for {}", url)),
            h1: Some("Heading".to_string()),
            h1_count: 1,
            h2s: vec![],
            h3s: vec![],
            meta_description: Some(format!(
                "A meta description that is long enough to pass the minimum length check for {}",
                url
            )),
            canonical: Some(url.to_string()),
            has_viewport: true,
            word_count: words.split_whitespace().count(),
            content: words,
            section: crate::url::section_of(&url::Url::parse(url).unwrap()),
            internal_links: vec![],
            has_schema: true,
            schema_types: vec!["Article".to_string()],
            readability_grade: 8.0,
            code_block_count: 0,
            image_count: 0,
            images_missing_alt: 0,
        }
    }

    pub fn report(pages: Vec<CrawledPage>) -> CrawlReport {
        CrawlReport {
            root_url: "https://example.com/".to_string(),
            sections: crate::crawler::summarize_sections(&pages),
            pages,
            redirect_chains: vec![],
            broken_links: vec![],
            site: SiteFlags {
                has_robots_txt: true,
                has_sitemap: true,
                sitemap_url_count: 1,
                uses_https: true,
            },
            errors: vec![],
        }
    }
}
