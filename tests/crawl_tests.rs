//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use site_audit::config::{
    Config, CrawlerConfig, EscalationConfig, OutputConfig, PipelineConfig, UserAgentConfig,
};
use site_audit::crawler::{CrawlError, CrawlRequest, Crawler, DiscoveryEvent, FetchError, Fetcher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration that trusts the local mock server
fn create_test_config(trusted: bool) -> Config {
    Config {
        crawler: CrawlerConfig {
            politeness_delay_ms: 0,
            request_timeout_ms: 5_000,
            trusted_hosts: if trusted {
                vec!["127.0.0.1".to_string()]
            } else {
                Vec::new()
            },
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        pipeline: PipelineConfig::default(),
        escalation: EscalationConfig::default(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

fn html(title: &str, body: &str) -> ResponseTemplate {
    let document = format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, body
    );
    ResponseTemplate::new(200).set_body_raw(document, "text/html; charset=utf-8")
}

async fn mount_html(server: &MockServer, route: &str, title: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(title, body))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Responds with a fixed template and records when each request arrived
struct Timed {
    template: ResponseTemplate,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for Timed {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        self.template.clone()
    }
}

fn request(root: &str, budget: usize) -> CrawlRequest {
    CrawlRequest {
        root_url: root.to_string(),
        page_budget: budget,
        section_filter: None,
    }
}

fn crawled_paths(report: &site_audit::CrawlReport) -> Vec<String> {
    report
        .pages
        .iter()
        .map(|p| {
            url::Url::parse(&p.url)
                .map(|u| u.path().to_string())
                .unwrap_or_default()
        })
        .collect()
}

#[tokio::test]
async fn test_crawl_follows_links_without_sitemap() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(
        &server,
        "/",
        "Home",
        r#"<a href="/about">About</a> <a href="/blog/first-post">Post</a>"#,
    )
    .await;
    mount_html(&server, "/about", "About", r#"<a href="/missing">Gone</a>"#).await;
    mount_html(&server, "/blog/first-post", "First post", r#"<a href="/">Home</a>"#).await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let report = crawler.crawl(&request(&server.uri(), 25)).await.unwrap();

    let paths = crawled_paths(&report);
    assert_eq!(report.page_count(), 3, "crawled {:?}", paths);
    assert!(paths.contains(&"/about".to_string()));
    assert!(paths.contains(&"/blog/first-post".to_string()));

    assert!(report.site.has_robots_txt);
    assert!(!report.site.has_sitemap);
    assert_eq!(report.site.sitemap_url_count, 0);
    assert!(!report.site.uses_https);

    let broken: Vec<_> = report
        .broken_links
        .iter()
        .filter(|b| b.target_url.ends_with("/missing"))
        .collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].status, Some(404));
    assert!(broken[0].source_url.ends_with("/about"));
}

#[tokio::test]
async fn test_crawl_uses_sitemap_when_present() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{base}/</loc></url>
  <url><loc>{base}/docs/intro</loc></url>
  <url><loc>{base}/docs/setup</loc></url>
</urlset>"#
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
        .mount(&server)
        .await;

    mount_html(&server, "/", "Home", r#"<a href="/unlisted">Unlisted</a>"#).await;
    mount_html(&server, "/docs/intro", "Intro", "").await;
    mount_html(&server, "/docs/setup", "Setup", "").await;
    // Any method, so the broken-link probe's HEAD succeeds
    Mock::given(path("/unlisted"))
        .respond_with(html("Unlisted", ""))
        .mount(&server)
        .await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let report = crawler.crawl(&request(&base, 25)).await.unwrap();

    assert!(report.site.has_sitemap);
    assert_eq!(report.site.sitemap_url_count, 3);
    assert_eq!(report.page_count(), 3);
    assert!(!crawled_paths(&report).contains(&"/unlisted".to_string()));
    assert!(report.broken_links.is_empty());
}

#[tokio::test]
async fn test_crawl_respects_page_budget() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        "Home",
        r#"<a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a>"#,
    )
    .await;
    for route in ["/a", "/b", "/c"] {
        mount_html(&server, route, route, "").await;
    }

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let report = crawler.crawl(&request(&server.uri(), 2)).await.unwrap();

    assert_eq!(report.page_count(), 2);
    assert!(!report.site.has_robots_txt);
}

#[tokio::test]
async fn test_crawl_section_filter_keeps_root() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        "Home",
        r#"<a href="/blog/one">One</a> <a href="/shop/item">Item</a>"#,
    )
    .await;
    mount_html(&server, "/blog/one", "One", r#"<a href="/blog/two">Two</a>"#).await;
    mount_html(&server, "/blog/two", "Two", "").await;
    mount_html(&server, "/shop/item", "Item", "").await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let mut req = request(&server.uri(), 25);
    req.section_filter = Some("blog".to_string());
    let report = crawler.crawl(&req).await.unwrap();

    let paths = crawled_paths(&report);
    assert_eq!(report.page_count(), 3, "crawled {:?}", paths);
    assert!(paths.contains(&"/".to_string()));
    assert!(!paths.contains(&"/shop/item".to_string()));
}

#[tokio::test]
async fn test_crawl_honours_robots_disallow() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_html(
        &server,
        "/",
        "Home",
        r#"<a href="/public">Public</a> <a href="/private/area">Private</a>"#,
    )
    .await;
    mount_html(&server, "/public", "Public", "").await;
    Mock::given(method("GET"))
        .and(path("/private/area"))
        .respond_with(html("Private", ""))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let report = crawler.crawl(&request(&server.uri(), 25)).await.unwrap();

    assert_eq!(report.page_count(), 2);
    assert!(!crawled_paths(&report).contains(&"/private/area".to_string()));
}

#[tokio::test]
async fn test_crawl_records_long_redirect_chain() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "Home", r#"<a href="/old-1">Old</a>"#).await;
    for (from, to) in [("/old-1", "/old-2"), ("/old-2", "/old-3"), ("/old-3", "/final")] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(301).insert_header("location", to))
            .mount(&server)
            .await;
    }
    mount_html(&server, "/final", "Final", "").await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let report = crawler.crawl(&request(&server.uri(), 25)).await.unwrap();

    assert_eq!(report.redirect_chains.len(), 1);
    let chain = &report.redirect_chains[0];
    assert_eq!(chain.hops, 3);
    assert!(chain.origin().ends_with("/old-1"));
    assert!(chain.destination().ends_with("/final"));
    assert!(crawled_paths(&report).contains(&"/final".to_string()));
}

#[tokio::test]
async fn test_unreachable_root_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let err = crawler.crawl(&request(&server.uri(), 25)).await.unwrap_err();

    assert!(matches!(err, CrawlError::NoPages { .. }), "got {:?}", err);
    assert!(err.is_terminal());
}

#[tokio::test]
async fn test_strict_gate_refuses_loopback_root() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "Home", "").await;

    let crawler = Crawler::new(&create_test_config(false)).unwrap();
    let err = crawler.crawl(&request(&server.uri(), 25)).await.unwrap_err();

    assert!(matches!(err, CrawlError::Unsafe { .. }), "got {:?}", err);
    assert!(err.is_terminal());
}

#[tokio::test]
async fn test_discover_sections_from_root_links() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        "Home",
        r#"<a href="/docs/a">A</a> <a href="/docs/b">B</a> <a href="/blog/c">C</a>"#,
    )
    .await;

    let crawler = Crawler::new(&create_test_config(true)).unwrap();
    let events: Vec<DiscoveryEvent> = crawler
        .discover_sections(&server.uri())
        .await
        .unwrap()
        .collect();

    assert_eq!(events.first(), Some(&DiscoveryEvent::SitemapCount(0)));
    assert!(matches!(events.get(1), Some(DiscoveryEvent::Sections(s)) if s.len() == 2));
    assert_eq!(events.last(), Some(&DiscoveryEvent::Done));

    let top = events.iter().find_map(|e| match e {
        DiscoveryEvent::ScoredSection(s) => Some(s),
        _ => None,
    });
    let top = top.unwrap();
    assert_eq!(top.name, "docs");
    assert_eq!(top.url_count, 2);
    assert_eq!(top.score, 67);
}

#[tokio::test]
async fn test_redirect_hop_to_metadata_endpoint_is_refused() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "Home", r#"<a href="/go">Go</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
        )
        .mount(&server)
        .await;

    let config = create_test_config(true);
    let fetcher = Fetcher::from_config(&config.crawler, &config.user_agent).unwrap();
    let go = url::Url::parse(&format!("{}/go", server.uri())).unwrap();
    let err = fetcher.fetch(&go).await.unwrap_err();
    assert!(
        matches!(err, FetchError::Unsafe { ref url, .. } if url.starts_with("http://169.254.169.254/")),
        "got {:?}",
        err
    );

    let crawler = Crawler::new(&config).unwrap();
    let report = crawler.crawl(&request(&server.uri(), 25)).await.unwrap();

    assert_eq!(report.page_count(), 1);
    assert!(report
        .errors
        .iter()
        .any(|e| e.url.ends_with("/go") && e.message.contains("169.254.169.254")));
    assert!(report.broken_links.is_empty());
}

#[tokio::test]
async fn test_politeness_delay_paces_robots_and_sitemap_requests() {
    let server = MockServer::start().await;
    let base = server.uri();
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let timed = |template: ResponseTemplate| Timed {
        template,
        arrivals: arrivals.clone(),
    };

    let robots = format!("User-agent: *\nAllow: /\nSitemap: {base}/sitemap-pages.xml\n");
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(timed(ResponseTemplate::new(200).set_body_string(robots)))
        .mount(&server)
        .await;
    for route in ["/sitemap-pages.xml", "/sitemap.xml", "/sitemap_index.xml"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(timed(ResponseTemplate::new(404)))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(timed(html("Home", "")))
        .mount(&server)
        .await;

    let mut config = create_test_config(true);
    config.crawler.politeness_delay_ms = 200;
    let crawler = Crawler::new(&config).unwrap();
    let report = crawler.crawl(&request(&base, 25)).await.unwrap();
    assert_eq!(report.page_count(), 1);

    // robots.txt, three sitemap candidates, then the root page
    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 5);
    for pair in arrivals.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(150), "requests only {:?} apart", gap);
    }
}

#[tokio::test]
async fn test_fetch_stops_reading_at_body_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a".repeat(64 * 1024), "text/plain"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/small"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("small body", "text/plain"))
        .mount(&server)
        .await;

    let config = create_test_config(true);
    let fetcher = Fetcher::from_config(&config.crawler, &config.user_agent)
        .unwrap()
        .with_body_limit(1024);

    let huge = url::Url::parse(&format!("{}/huge", server.uri())).unwrap();
    let response = fetcher.fetch(&huge).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), 1024);

    let small = url::Url::parse(&format!("{}/small", server.uri())).unwrap();
    assert_eq!(fetcher.fetch(&small).await.unwrap().body, "small body");
}
