//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end against an on-disk store.

use safarnama::config::Config;
use safarnama::crawler::{HttpFetcher, SiteCrawler};
use safarnama::output::write_sitemap;
use safarnama::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use safarnama::{LlmClient, SearchClient, UrlStatus};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at `db_path`
fn create_test_config(db_path: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.delay_ms = 0;
    config.crawler.request_timeout_secs = 5;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.user_agent.crawler_version = "1.0.0".to_string();
    config.output.database_path = db_path.display().to_string();
    config.llm.enabled = false;
    config
}

fn create_crawler(config: &Config) -> SiteCrawler<HttpFetcher, SqliteStorage> {
    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let fetcher = HttpFetcher::new(&config.user_agent).unwrap();
    SiteCrawler::new(config.clone(), fetcher, storage).unwrap()
}

async fn mount_html(server: &MockServer, route: &str, body: &str, expected: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"));
    match expected {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

/// Home links to /page1 and /page2; /page1 links to /page3
async fn mount_site(server: &MockServer, expected: Option<u64>) {
    mount_html(
        server,
        "/",
        r#"<html><head><title>Home</title></head><body>
        <a href="/page1">Page 1</a>
        <a href="/page2">Page 2</a>
        <script>var x = "<a href='/hidden'>";</script>
        </body></html>"#,
        expected,
    )
    .await;
    mount_html(
        server,
        "/page1",
        r#"<html><body><p>Content 1</p><a href="/page3">Page 3</a></body></html>"#,
        expected,
    )
    .await;
    mount_html(server, "/page2", "<html><body><p>Content 2</p></body></html>", expected).await;
    mount_html(server, "/page3", "<html><body><p>Content 3</p></body></html>", expected).await;
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    mount_site(&server, None).await;
    let base = server.uri();

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("crawl.db"));
    let mut crawler = create_crawler(&config);

    let visited = crawler.crawl(&base, 1).await.unwrap();
    assert_eq!(visited.len(), 3);
    assert!(visited.contains(&format!("{}/", base)));
    assert!(visited.contains(&format!("{}/page1", base)));
    assert!(visited.contains(&format!("{}/page2", base)));
    assert!(!visited.contains(&format!("{}/hidden", base)));

    let counts = crawler.stats();
    assert_eq!(counts.fetched, 3);
    crawler.close().unwrap();

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let home = storage.get(&format!("{}/", base)).unwrap().unwrap();
    assert_eq!(home.depth, 0);
    assert_eq!(home.status, UrlStatus::Fetched);
    assert!(home.content_type.unwrap().starts_with("text/html"));

    let page1 = storage.get(&format!("{}/page1", base)).unwrap().unwrap();
    assert_eq!(page1.depth, 1);

    let page3 = storage.get(&format!("{}/page3", base)).unwrap().unwrap();
    assert_eq!(page3.depth, 2);
    assert_eq!(page3.status, UrlStatus::Pending);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counts.fetched, 3);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_resume_never_refetches() {
    let server = MockServer::start().await;
    mount_site(&server, Some(1)).await;
    let base = server.uri();

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("crawl.db"));

    let mut first = create_crawler(&config);
    first.crawl(&base, 1).await.unwrap();
    first.close().unwrap();

    // A new process over the same store picks up /page3 only
    let mut second = create_crawler(&config);
    let visited = second.crawl(&base, 2).await.unwrap();
    assert_eq!(visited.len(), 4);
    assert_eq!(second.stats().fetched, 1);
    second.close().unwrap();

    let mut third = create_crawler(&config);
    third.crawl(&base, 2).await.unwrap();
    assert_eq!(third.stats().total(), 0);
}

#[tokio::test]
async fn test_robots_disallow_and_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/",
        r#"<a href="/private/data">private</a><a href="/gone">gone</a><a href="/data.zip">zip</a>"#,
        None,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/private/data"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.zip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let base = server.uri();

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("crawl.db"));
    let mut crawler = create_crawler(&config);
    let visited = crawler.crawl(&base, 1).await.unwrap();

    assert_eq!(visited.len(), 4);
    let counts = crawler.stats();
    assert_eq!(counts.fetched, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.skipped, 2);

    let storage = crawler.storage();
    let store = storage.lock().unwrap();
    let private = store.get(&format!("{}/private/data", base)).unwrap().unwrap();
    assert_eq!(private.status, UrlStatus::Skipped);
    let gone = store.get(&format!("{}/gone", base)).unwrap().unwrap();
    assert_eq!(gone.status, UrlStatus::Failed);
    assert_eq!(gone.error_message.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_llm_enrichment_persisted() {
    let site = MockServer::start().await;
    mount_html(
        &site,
        "/",
        "<html><head><title>Home</title></head><body><p>Rust crawlers</p></body></html>",
        None,
    )
    .await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"choices":[{"message":{"content":"```json\n{\"summary\":\"About crawlers\",\"tags\":[\"rust\",\"web\"]}\n```"}}]}"#,
        ))
        .expect(1)
        .mount(&llm)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir.path().join("crawl.db"));
    config.llm.enabled = true;
    config.llm.endpoint = format!("{}/v1/chat/completions", llm.uri());

    let client = LlmClient::new(&config.llm, &config.user_agent.header_value()).unwrap();
    let mut crawler = create_crawler(&config).with_llm(client);
    crawler.crawl(&site.uri(), 0).await.unwrap();

    let storage = crawler.storage();
    let store = storage.lock().unwrap();
    let home = store.get(&format!("{}/", site.uri())).unwrap().unwrap();
    assert_eq!(home.status, UrlStatus::Fetched);
    assert_eq!(home.summary.as_deref(), Some("About crawlers"));
    assert_eq!(home.tags, Some(vec!["rust".to_string(), "web".to_string()]));
}

#[tokio::test]
async fn test_llm_failure_keeps_page_fetched() {
    let site = MockServer::start().await;
    mount_html(&site, "/", "<p>text</p>", None).await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"choices":[{"message":{"content":"not json at all"}}]}"#,
        ))
        .mount(&llm)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir.path().join("crawl.db"));
    config.llm.endpoint = format!("{}/v1/chat/completions", llm.uri());

    let client = LlmClient::new(&config.llm, "TestBot/1.0.0").unwrap();
    let mut crawler = create_crawler(&config).with_llm(client);
    crawler.crawl(&site.uri(), 0).await.unwrap();

    assert_eq!(crawler.stats().fetched, 1);
    let storage = crawler.storage();
    let store = storage.lock().unwrap();
    let home = store.get(&format!("{}/", site.uri())).unwrap().unwrap();
    assert_eq!(home.status, UrlStatus::Fetched);
    assert!(home.summary.is_none());
}

#[tokio::test]
async fn test_search_results_seed_crawl() {
    let site = MockServer::start().await;
    mount_html(&site, "/doc", r#"<p>doc</p><a href="/next">next</a>"#, None).await;
    mount_html(&site, "/next", "<p>next</p>", None).await;

    let search = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"results":[{{"url":"{}/doc","title":"Doc","content":"a doc"}}]}}"#,
            site.uri()
        )))
        .mount(&search)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir.path().join("crawl.db"));
    config.search.instances = vec![format!("{}/search", search.uri())];

    let mut client = SearchClient::new(&config.search, "TestBot/1.0.0").unwrap();
    let result = client.search("docs").await.unwrap();
    assert_eq!(result.instance, format!("{}/search", search.uri()));

    let mut crawler = create_crawler(&config);
    for url in result.urls() {
        assert!(crawler.add_search_result(url).unwrap());
    }
    let visited = crawler.crawl_frontier(1).await.unwrap();

    assert!(visited.contains(&format!("{}/doc", site.uri())));
    assert!(visited.contains(&format!("{}/next", site.uri())));
}

#[tokio::test]
async fn test_sitemap_from_visited_set() {
    let server = MockServer::start().await;
    mount_site(&server, None).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("crawl.db"));
    let mut crawler = create_crawler(&config);
    let visited = crawler.crawl(&server.uri(), 1).await.unwrap();

    let sitemap = dir.path().join("sitemap.xml");
    write_sitemap(&visited, &sitemap).unwrap();

    let xml = std::fs::read_to_string(&sitemap).unwrap();
    assert_eq!(xml.matches("<loc>").count(), 3);
    assert!(xml.contains(&format!("<loc>{}/page1</loc>", server.uri())));
}
