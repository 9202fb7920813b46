//! Integration tests for the crawl pipeline
//!
//! These tests use wiremock to stand in for real sites and drive the full
//! engine: prioritized fetching, adaptive rate limiting, robots handling,
//! and version tracking backed by SQLite.

use driftwatch::config::{
    Config, CrawlConfig, LimiterConfig, OutputConfig, ScraperEntry, UserAgentConfig,
    VersioningConfig,
};
use driftwatch::engine::{EngineState, HttpFetcher, PageExtractor, ScraperEngine};
use driftwatch::limiter::AdaptiveRateLimiter;
use driftwatch::scoring::UrlPrioritizer;
use driftwatch::storage::{open_storage, SqliteArchive, SqliteStorage, Storage};
use driftwatch::versioning::{ContentVersionStore, ScraperContentSettings};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCRAPER_ID: &str = "site";

/// Creates a test configuration with short delays so tests stay fast
fn create_test_config(seeds: Vec<String>, db_path: &str) -> Config {
    Config {
        crawl: CrawlConfig {
            max_concurrent_fetches: 4,
            max_pages_per_run: 20,
            batch_size: 10,
        },
        limiter: LimiterConfig {
            min_delay_ms: 1,
            max_delay_ms: 200,
            default_delay_ms: 5,
            sensitive_delay_ms: 10,
            requests_per_minute: None,
        },
        versioning: VersioningConfig::default(),
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
        scraper: vec![ScraperEntry {
            id: SCRAPER_ID.to_string(),
            name: Some("Test Site".to_string()),
            seeds,
            max_versions_to_keep: None,
            track_changes_history: None,
            notify_on_changes: None,
            notification_email: None,
        }],
    }
}

/// Engine plus handles to the services it runs on
struct Harness {
    engine: Arc<ScraperEngine>,
    prioritizer: Arc<UrlPrioritizer>,
    limiter: Arc<AdaptiveRateLimiter>,
    versions: Arc<ContentVersionStore>,
    storage: Arc<Mutex<SqliteStorage>>,
}

/// Wires services, archive, and components the way the binary does
fn build_harness(config: Config) -> Harness {
    let storage = Arc::new(Mutex::new(
        open_storage(Path::new(&config.output.database_path)).expect("Failed to open DB"),
    ));
    let prioritizer = Arc::new(UrlPrioritizer::new());
    let limiter = Arc::new(AdaptiveRateLimiter::new(config.limiter.clone()));
    let versions = Arc::new(ContentVersionStore::with_archive(Arc::new(
        SqliteArchive::new(storage.clone()),
    )));
    versions.register_scraper(ScraperContentSettings::new(SCRAPER_ID, "Test Site"));

    let engine = Arc::new(ScraperEngine::with_services(
        Arc::new(config),
        prioritizer.clone(),
        limiter.clone(),
        versions.clone(),
    ));
    engine
        .register(Arc::new(PageExtractor::new()))
        .expect("Failed to register extractor");
    engine
        .register(Arc::new(HttpFetcher::new()))
        .expect("Failed to register fetcher");

    Harness {
        engine,
        prioritizer,
        limiter,
        versions,
        storage,
    }
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_tracks_pages_and_versions() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    mount_page(
        &mock_server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome to the test site.</p>
            <a href="{}/page1">Page 1</a>
            <a href="{}/page2">Page 2</a>
            </body></html>"#,
            base_url, base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        "<html><head><title>Page 1</title></head><body><p>First page content.</p></body></html>"
            .to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/page2",
        "<html><head><title>Page 2</title></head><body><p>Second page content.</p></body></html>"
            .to_string(),
    )
    .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let seed = format!("{}/", base_url);
    let config = create_test_config(vec![seed.clone()], db_path.to_str().unwrap());

    let harness = build_harness(config);
    harness.engine.run().await.expect("Crawl failed");
    assert_eq!(harness.engine.state(), EngineState::Completed);

    // All three pages have metadata and a first version
    assert_eq!(harness.prioritizer.page_count(), 3);
    for route in ["/", "/page1", "/page2"] {
        let url = format!("{}{}", base_url, route);
        let metadata = harness
            .prioritizer
            .metadata_for(&url)
            .unwrap_or_else(|| panic!("No metadata for {}", url));
        assert!(metadata.content_length > 0);

        let latest = harness
            .versions
            .latest_version(SCRAPER_ID, &url)
            .unwrap_or_else(|| panic!("No version for {}", url));
        assert_eq!(latest.url, url);
    }

    // The index page has two outbound links
    let index_meta = harness.prioritizer.metadata_for(&seed).unwrap();
    assert_eq!(index_meta.links_count, 2);

    // Persist the snapshot the way the binary does on shutdown
    let snapshot = harness.prioritizer.snapshot();
    {
        let mut store = harness.storage.lock().unwrap();
        store
            .save_page_metadata(&snapshot.pages)
            .expect("Failed to save metadata");
        store
            .save_domain_visits(&snapshot.domain_visits)
            .expect("Failed to save visits");
    }

    // A fresh connection sees the persisted state
    let reopened = open_storage(&db_path).expect("Failed to reopen DB");
    assert_eq!(reopened.count_tracked_pages().unwrap(), 3);
    assert_eq!(reopened.count_versions().unwrap(), 3);
    assert_eq!(reopened.count_versioned_pages().unwrap(), 3);
    assert_eq!(reopened.count_unique_domains().unwrap(), 1);
    assert_eq!(reopened.total_domain_visits().unwrap(), 3);
}

#[tokio::test]
async fn test_unchanged_content_keeps_single_version_across_runs() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    mount_page(
        &mock_server,
        "/",
        "<html><head><title>Stable</title></head><body><p>Never changes.</p></body></html>"
            .to_string(),
    )
    .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("stable.db");
    let seed = format!("{}/", base_url);

    // First run records the initial version
    let first = build_harness(create_test_config(
        vec![seed.clone()],
        db_path.to_str().unwrap(),
    ));
    first.engine.run().await.expect("First crawl failed");
    let initial = first
        .versions
        .latest_version(SCRAPER_ID, &seed)
        .expect("No version after first run");
    drop(first);

    // Second run starts cold, reloads history from the archive, and must
    // recognize the unchanged content
    let second = build_harness(create_test_config(
        vec![seed.clone()],
        db_path.to_str().unwrap(),
    ));
    second.engine.run().await.expect("Second crawl failed");
    assert_eq!(second.engine.state(), EngineState::Completed);

    let history = second.versions.versions_for(SCRAPER_ID, &seed);
    assert_eq!(history.len(), 1, "Unchanged content grew a new version");
    assert_eq!(history[0].version_date, initial.version_date);
    assert_eq!(history[0].content_hash, initial.content_hash);

    let reopened = open_storage(&db_path).expect("Failed to reopen DB");
    assert_eq!(reopened.count_versions().unwrap(), 1);
}

#[tokio::test]
async fn test_rate_limited_fetch_backs_off() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("throttle.db");
    let seed = format!("{}/throttled", base_url);
    let config = create_test_config(vec![seed.clone()], db_path.to_str().unwrap());

    let harness = build_harness(config);
    harness.engine.run().await.expect("Crawl failed");
    assert_eq!(harness.engine.state(), EngineState::Completed);

    // One request went out, got throttled, and the delay doubled from the
    // 5ms default
    let profile = harness
        .limiter
        .profile("127.0.0.1")
        .await
        .expect("No profile for mock host");
    assert_eq!(profile.requests_made, 1);
    assert_eq!(profile.error_count, 1);
    assert_eq!(profile.success_count, 0);
    assert_eq!(profile.current_delay, Duration::from_millis(10));

    // A throttled page is neither versioned nor counted as visited
    assert!(harness.versions.latest_version(SCRAPER_ID, &seed).is_none());
    assert!(harness.prioritizer.metadata_for(&seed).is_none());
}

#[tokio::test]
async fn test_robots_disallow_blocks_fetch() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, "User-agent: *\nDisallow: /admin").await;
    mount_page(
        &mock_server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{}/allowed">Allowed Page</a>
            <a href="{}/admin">Admin Page</a>
            </body></html>"#,
            base_url, base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/allowed",
        "<html><head><title>Allowed</title></head><body><p>Fine to fetch.</p></body></html>"
            .to_string(),
    )
    .await;
    // The disallowed page must never be requested
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("robots.db");
    let seed = format!("{}/", base_url);
    let config = create_test_config(vec![seed.clone()], db_path.to_str().unwrap());

    let harness = build_harness(config);
    harness.engine.run().await.expect("Crawl failed");

    let allowed_url = format!("{}/allowed", base_url);
    let admin_url = format!("{}/admin", base_url);

    assert!(harness.prioritizer.metadata_for(&allowed_url).is_some());
    assert!(harness.prioritizer.metadata_for(&admin_url).is_none());
    assert!(harness
        .versions
        .versions_for(SCRAPER_ID, &admin_url)
        .is_empty());

    // The denied URL still went through admission before the robots check,
    // so all three URLs count as requests while only two fetched
    let profile = harness
        .limiter
        .profile("127.0.0.1")
        .await
        .expect("No profile for mock host");
    assert_eq!(profile.requests_made, 3);
    assert_eq!(profile.success_count, 2);
    assert_eq!(profile.error_count, 0);

    // Wiremock verifies the expect(0) on /admin when the server drops
}

#[tokio::test]
async fn test_crawl_delay_marks_domain_sensitive() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, "User-agent: *\nAllow: /\nCrawl-delay: 10").await;
    mount_page(
        &mock_server,
        "/",
        "<html><head><title>Slow</title></head><body><p>Please be gentle.</p></body></html>"
            .to_string(),
    )
    .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("sensitive.db");
    let seed = format!("{}/", base_url);
    let config = create_test_config(vec![seed.clone()], db_path.to_str().unwrap());

    let harness = build_harness(config);
    harness.engine.run().await.expect("Crawl failed");
    assert_eq!(harness.engine.state(), EngineState::Completed);

    // The page was still fetched, but the declared crawl-delay flagged the
    // domain and its delay now sits on the sensitive floor
    assert!(harness.prioritizer.metadata_for(&seed).is_some());
    let profile = harness
        .limiter
        .profile("127.0.0.1")
        .await
        .expect("No profile for mock host");
    assert!(profile.is_sensitive);
    assert!(profile.current_delay >= Duration::from_millis(10));
    assert_eq!(profile.requests_made, 1);
}
