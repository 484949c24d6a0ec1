// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use newsrs::config::settings::FetcherSettings;
use newsrs::fetcher::{FetchError, Fetcher};
use newsrs::utils::cancel::CancelToken;

fn fetcher_settings() -> FetcherSettings {
    FetcherSettings {
        request_timeout_ms: 5_000,
        per_host_interval_ms: 0,
        user_agent: "newsrs-test/1.0".to_string(),
        respect_robots: false,
    }
}

/// 测试成功抓取返回响应体
#[tokio::test]
async fn test_fetch_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_settings(), 3).unwrap();
    let result = fetcher
        .fetch(&format!("{}/page", server.uri()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(result.body, "<html>ok</html>");
}

/// 测试瞬时5xx失败在退避后重试并最终成功
#[tokio::test]
async fn test_transient_error_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_settings(), 3).unwrap();
    let result = fetcher
        .fetch(&format!("{}/flaky", server.uri()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.body, "recovered");
}

/// 测试4xx（非429）立即失败，不重试
#[tokio::test]
async fn test_permanent_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_settings(), 3).unwrap();
    let result = fetcher
        .fetch(&format!("{}/gone", server.uri()), &CancelToken::new())
        .await;

    assert!(matches!(result, Err(FetchError::Permanent(_))));
    // expect(1)在server drop时校验没有发生重试
}

/// 测试429响应遵循Retry-After提示
#[tokio::test]
async fn test_429_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "1"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_string("after limit"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_settings(), 3).unwrap();
    let started = Instant::now();
    let result = fetcher
        .fetch(&format!("{}/limited", server.uri()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.body, "after limit");
    // 提示1秒，重试应等待约1秒而非默认退避
    assert!(started.elapsed() >= Duration::from_millis(900));
}

/// 测试重试耗尽后返回瞬时错误
#[tokio::test]
async fn test_transient_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let mut settings = fetcher_settings();
    settings.request_timeout_ms = 5_000;
    // max_retries=2：两次尝试后放弃
    let fetcher = Fetcher::new(&settings, 2).unwrap();
    let result = fetcher
        .fetch(&format!("{}/down", server.uri()), &CancelToken::new())
        .await;

    assert!(matches!(result, Err(FetchError::Transient(_))));
}

/// 测试robots.txt禁止的URL被拒绝
#[tokio::test]
async fn test_robots_disallow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut settings = fetcher_settings();
    settings.respect_robots = true;
    let fetcher = Fetcher::new(&settings, 3).unwrap();
    let result = fetcher
        .fetch(&format!("{}/private/page", server.uri()), &CancelToken::new())
        .await;

    assert!(matches!(result, Err(FetchError::RobotsDisallowed)));
}
