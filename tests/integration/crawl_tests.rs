//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use catscrape::config::{Config, RetryPolicy};
use catscrape::crawler::Coordinator;
use catscrape::state::CrawlPhase;
use catscrape::CrawlReport;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with fast retries and robots.txt disabled
fn create_test_config(seeds: Vec<String>, output: &Path) -> Config {
    let mut config = Config::default();
    config.seeds = seeds;
    config.crawler.respect_robots = false;
    config.crawler.timeout_ms = 5_000;
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        backoff_factor: 2.0,
    };
    config.output.path = output.display().to_string();
    config
}

/// An HTML response with the right content type
fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html")
}

/// A listing page with plain images and an optional rel=next link
fn listing(images: &[&str], next: Option<&str>) -> String {
    let mut body = String::from("<html><body><ul class=\"products\">");
    for image in images {
        body.push_str(&format!("<li><img src=\"{}\" alt=\"product\"></li>", image));
    }
    body.push_str("</ul>");
    if let Some(next) = next {
        body.push_str(&format!("<a rel=\"next\" href=\"{}\">Next</a>", next));
    }
    body.push_str("</body></html>");
    body
}

fn output_in(dir: &TempDir) -> PathBuf {
    dir.path().join("out/images.txt")
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("Failed to read output file")
        .lines()
        .map(str::to_string)
        .collect()
}

async fn run(config: Config) -> CrawlReport {
    Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed")
}

#[tokio::test]
async fn test_full_paginated_crawl() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Page 1: a lazy image over a placeholder, a srcset, and a picture element
    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(
            r#"<html><body>
            <img src="/static/placeholder.gif" data-src="https://cdn.example.com/p/1.jpg">
            <img srcset="https://cdn.example.com/p/2-small.jpg 320w, https://cdn.example.com/p/2-large.jpg 1200w">
            <picture><source data-srcset="https://cdn.example.com/p/3.webp"><img src="/img/3.jpg"></picture>
            <nav class="pagination"><a href="/shoes/2">Next</a></nav>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Page 2: one duplicate from page 1 (tracking parameter), one new image
    Mock::given(method("GET"))
        .and(path("/shoes/2"))
        .respond_with(html(listing(
            &[
                "https://cdn.example.com/p/1.jpg?utm_source=listing",
                "https://cdn.example.com/p/4.jpg",
            ],
            Some("/shoes/3"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Page 3: last page, no next link
    Mock::given(method("GET"))
        .and(path("/shoes/3"))
        .respond_with(html(listing(&["https://cdn.example.com/p/5.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert!(report.is_success());
    assert_eq!(report.counters.succeeded, 3);
    assert_eq!(report.counters.failed, 0);
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.unique_images, 6);

    assert_eq!(
        read_lines(&output),
        vec![
            "https://cdn.example.com/p/1.jpg".to_string(),
            "https://cdn.example.com/p/2-large.jpg".to_string(),
            "https://cdn.example.com/p/3.webp".to_string(),
            format!("{}/img/3.jpg", mock_server.uri()),
            "https://cdn.example.com/p/4.jpg".to_string(),
            "https://cdn.example.com/p/5.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_numeric_increment_pagination() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "1"))
        .respond_with(html(listing(&["https://cdn.example.com/a.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "2"))
        .respond_with(html(listing(&["https://cdn.example.com/b.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Past the end: an empty listing ends the increment
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "3"))
        .respond_with(html("<html><body><p>No products</p></body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/list?page=1", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.succeeded, 3);
    assert_eq!(
        read_lines(&output),
        vec!["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"]
    );
}

#[tokio::test]
async fn test_partial_failure_keeps_other_pages() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for n in [1, 2, 4, 5] {
        let image = format!("https://cdn.example.com/cat{}.jpg", n);
        Mock::given(method("GET"))
            .and(path(format!("/cat/{}", n)))
            .respond_with(html(listing(&[image.as_str()], None)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    // Page 3 fails every attempt and is tried exactly max_attempts times
    Mock::given(method("GET"))
        .and(path("/cat/3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let seeds = (1..=5)
        .map(|n| format!("{}/cat/{}", mock_server.uri(), n))
        .collect();
    let report = run(create_test_config(seeds, &output)).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert!(report.is_success());
    assert_eq!(report.counters.succeeded, 4);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.failures.get("http_server_error"), Some(&1));
    assert_eq!(report.unique_images, 4);

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 4);
    assert!(!lines.iter().any(|line| line.contains("cat3")));
}

#[tokio::test]
async fn test_failed_page_ends_its_chain() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["https://cdn.example.com/1.jpg"], Some("/shoes/2"))))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shoes/2"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shoes/3"))
        .respond_with(html(listing(&["https://cdn.example.com/3.jpg"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(read_lines(&output), vec!["https://cdn.example.com/1.jpg"]);
}

#[tokio::test]
async fn test_self_referencing_next_link_terminates() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(html(listing(&["https://cdn.example.com/x.jpg"], Some("/loop/"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/loop", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.succeeded, 1);
    assert_eq!(report.unique_images, 1);
}

#[tokio::test]
async fn test_two_page_cycle_terminates() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(listing(&["https://cdn.example.com/a.jpg"], Some("/b"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(listing(&["https://cdn.example.com/b.jpg"], Some("/a?utm_source=nav"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/a", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.counters.succeeded, 2);
    assert_eq!(report.unique_images, 2);
}

#[tokio::test]
async fn test_unreachable_seed_aborts_with_empty_file() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // 404 is not retried
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/missing", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Aborted);
    assert!(!report.is_success());
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.counters.attempts, 1);
    assert_eq!(report.failures.get("http_client_error"), Some(&1));
    assert!(output.exists());
    assert!(read_lines(&output).is_empty());
}

#[tokio::test]
async fn test_non_html_seed_is_not_retried() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/feed", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Aborted);
    assert_eq!(report.failures.get("parse_error"), Some(&1));
}

#[tokio::test]
async fn test_transient_error_recovers() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // First attempt gets a 503, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html(listing(&["https://cdn.example.com/ok.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/flaky", mock_server.uri())], &output);
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.succeeded, 1);
    assert_eq!(report.counters.attempts, 2);
    assert_eq!(read_lines(&output), vec!["https://cdn.example.com/ok.jpg"]);
}

#[tokio::test]
async fn test_robots_disallow_skips_page() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["https://cdn.example.com/1.jpg"], Some("/private/2"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/2"))
        .respond_with(html(listing(&["https://cdn.example.com/secret.jpg"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    config.crawler.respect_robots = true;
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.disallowed, 1);
    assert_eq!(read_lines(&output), vec!["https://cdn.example.com/1.jpg"]);
}

#[tokio::test]
async fn test_missing_robots_allows_all() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["https://cdn.example.com/1.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    config.crawler.respect_robots = true;
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.disallowed, 0);
    assert_eq!(report.unique_images, 1);
}

#[tokio::test]
async fn test_equivalent_seeds_fetched_once() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["https://cdn.example.com/1.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let base = mock_server.uri();
    let seeds = vec![
        format!("{}/shoes", base),
        format!("{}/shoes/?utm_source=mail#top", base),
    ];
    let report = run(create_test_config(seeds, &output)).await;

    assert_eq!(report.counters.enqueued, 1);
    assert_eq!(report.counters.succeeded, 1);
}

#[tokio::test]
async fn test_max_pages_limit() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for n in 1..=5 {
        let image = format!("https://cdn.example.com/{}.jpg", n);
        let next = format!("/pages/{}", n + 1);
        Mock::given(method("GET"))
            .and(path(format!("/pages/{}", n)))
            .respond_with(html(listing(&[image.as_str()], Some(next.as_str()))))
            .mount(&mock_server)
            .await;
    }

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/pages/1", mock_server.uri())], &output);
    config.crawler.max_pages = 2;
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert_eq!(report.counters.succeeded, 2);
    assert_eq!(report.unique_images, 2);
}

#[tokio::test]
async fn test_concurrency_one_with_many_seeds() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for n in 1..=6 {
        let image = format!("https://cdn.example.com/s{}.jpg", n);
        Mock::given(method("GET"))
            .and(path(format!("/seed/{}", n)))
            .respond_with(
                html(listing(&[image.as_str()], None)).set_delay(Duration::from_millis(20)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let output = output_in(&dir);
    let seeds = (1..=6)
        .map(|n| format!("{}/seed/{}", mock_server.uri(), n))
        .collect();
    let mut config = create_test_config(seeds, &output);
    config.crawler.max_concurrency = 1;
    let report = run(config).await;

    // With a single slot, completion order equals seed order
    let lines = read_lines(&output);
    let expected: Vec<String> = (1..=6)
        .map(|n| format!("https://cdn.example.com/s{}.jpg", n))
        .collect();
    assert_eq!(lines, expected);
    assert_eq!(report.counters.succeeded, 6);
}

#[tokio::test]
async fn test_stop_before_run_abandons_seeds() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["https://cdn.example.com/1.jpg"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    let coordinator = Coordinator::new(config).unwrap();
    coordinator.stop_handle().stop();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.phase, CrawlPhase::Aborted);
    assert_eq!(report.counters.abandoned, 1);
    assert!(output.exists());
}

#[tokio::test]
async fn test_deadline_aborts_with_partial_results() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(html(listing(&["https://cdn.example.com/fast.jpg"], Some("/slow"))))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            html(listing(&["https://cdn.example.com/slow.jpg"], None))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/fast", mock_server.uri())], &output);
    config.crawler.deadline_secs = Some(1);

    let started = std::time::Instant::now();
    let report = run(config).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.phase, CrawlPhase::Aborted);
    assert!(report.is_success());
    assert_eq!(report.counters.abandoned, 1);
    assert_eq!(read_lines(&output), vec!["https://cdn.example.com/fast.jpg"]);
}

#[tokio::test]
async fn test_download_dir_saves_images() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["/img/red.png", "/img/blue.png", "/img/gone.png"], None)))
        .mount(&mock_server)
        .await;

    for name in ["red", "blue"] {
        Mock::given(method("GET"))
            .and(path(format!("/img/{}.png", name)))
            .respond_with(ResponseTemplate::new(200).set_body_raw(name.as_bytes().to_vec(), "image/png"))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/img/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let download_dir = dir.path().join("images");
    let mut config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    config.output.download_dir = Some(download_dir.display().to_string());
    let report = run(config).await;

    let downloads = report.downloads.expect("Downloads should be reported");
    assert_eq!(downloads.attempted, 3);
    assert_eq!(downloads.saved, 2);
    assert_eq!(downloads.failed, 1);

    let mut saved: Vec<String> = std::fs::read_dir(&download_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    saved.sort();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().any(|name| name.ends_with("-red.png")));
    assert!(saved.iter().any(|name| name.ends_with("-blue.png")));
}

#[tokio::test]
async fn test_unusable_download_dir_keeps_results() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["/img/a.jpg", "/img/b.jpg"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    // A regular file where the download directory's parent should be
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").unwrap();

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    config.output.download_dir = Some(blocker.join("images").display().to_string());
    let report = run(config).await;

    assert_eq!(report.phase, CrawlPhase::Done);
    assert!(report.is_success());
    assert_eq!(report.unique_images, 2);
    assert_eq!(read_lines(&output).len(), 2);

    let downloads = report.downloads.expect("Downloads should be reported");
    assert_eq!(downloads.attempted, 2);
    assert_eq!(downloads.saved, 0);
    assert_eq!(downloads.failed, 2);
    assert!(downloads.error.is_some());
}

#[tokio::test]
async fn test_deadline_covers_slow_robots() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nAllow: /")
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["/img/a.jpg"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    config.crawler.respect_robots = true;
    config.crawler.deadline_secs = Some(1);

    let started = std::time::Instant::now();
    let report = run(config).await;

    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(report.phase, CrawlPhase::Aborted);
    assert_eq!(report.counters.abandoned, 1);
    assert_eq!(report.unique_images, 0);
    assert!(read_lines(&output).is_empty());
}

#[tokio::test]
async fn test_stop_interrupts_robots_preload() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(4)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shoes"))
        .respond_with(html(listing(&["/img/a.jpg"], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let output = output_in(&dir);
    let mut config = create_test_config(vec![format!("{}/shoes", mock_server.uri())], &output);
    config.crawler.respect_robots = true;

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();
    });

    let started = std::time::Instant::now();
    let report = coordinator.run().await.expect("Crawl failed");

    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(report.phase, CrawlPhase::Aborted);
    assert_eq!(report.counters.abandoned, 1);
    assert_eq!(report.counters.enqueued, 0);
}
