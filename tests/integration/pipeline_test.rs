// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use newsrs::pipeline::PipelineCoordinator;

use super::helpers::{article_html, read_jsonl, test_settings};

async fn mount_article(server: &MockServer, route: &str, title: &str, link: &str) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html(title, link)))
        .mount(server)
        .await;
}

/// 测试完整流水线：抓取、提取并输出两篇文章
#[tokio::test]
async fn test_pipeline_emits_extracted_articles() {
    let server = MockServer::start().await;
    mount_article(&server, "/news/1", "First Story", "/articles/1").await;
    mount_article(&server, "/news/2", "Second Story", "/articles/2").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let settings = test_settings(
        vec![
            format!("{}/news/1", server.uri()),
            format!("{}/news/2", server.uri()),
        ],
        &sink_path,
    );

    let coordinator = PipelineCoordinator::new(&settings).await.unwrap();
    let summary = coordinator.run().await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.deduped, 0);
    assert_eq!(summary.failed_terminal, 0);

    let records = read_jsonl(&sink_path);
    assert_eq!(records.len(), 2);
    let mut titles: Vec<_> = records
        .iter()
        .map(|r| r["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["First Story", "Second Story"]);
    // 线上契约字段
    assert!(records[0]["fingerprint"].is_string());
    assert!(records[0]["publishedAt"].is_string());
    assert_eq!(records[0]["source"], "test-site");
    assert!(records[0].get("sentimentScore").is_none());
}

/// 测试相同内容的两个URL只输出一条记录
#[tokio::test]
async fn test_pipeline_dedupes_identical_articles() {
    let server = MockServer::start().await;
    // 标题和链接相同，指纹一致
    mount_article(&server, "/mirror/a", "Same Story", "/articles/same").await;
    mount_article(&server, "/mirror/b", "Same Story", "/articles/same").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let settings = test_settings(
        vec![
            format!("{}/mirror/a", server.uri()),
            format!("{}/mirror/b", server.uri()),
        ],
        &sink_path,
    );

    let summary = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.deduped, 1);
    assert_eq!(read_jsonl(&sink_path).len(), 1);
}

/// 测试标题选择器未命中时记录被丢弃，流水线继续
#[tokio::test]
async fn test_pipeline_drops_extraction_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>no headline here</p></body></html>"),
        )
        .mount(&server)
        .await;
    mount_article(&server, "/ok", "Good Story", "/articles/good").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let settings = test_settings(
        vec![
            format!("{}/broken", server.uri()),
            format!("{}/ok", server.uri()),
        ],
        &sink_path,
    );

    let summary = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.dropped_extraction_errors, 1);
    assert_eq!(summary.failed_terminal, 0);

    let records = read_jsonl(&sink_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "Good Story");
}

/// 测试永久失败恰好计入一次终态失败
#[tokio::test]
async fn test_pipeline_counts_terminal_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_article(&server, "/ok", "Good Story", "/articles/good").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let settings = test_settings(
        vec![
            format!("{}/missing", server.uri()),
            format!("{}/ok", server.uri()),
        ],
        &sink_path,
    );

    let summary = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.failed_terminal, 1);
    assert_eq!(read_jsonl(&sink_path).len(), 1);
}

/// 测试幂等性：索引不变时重跑产生零条新记录
#[tokio::test]
async fn test_pipeline_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_article(&server, "/news/1", "First Story", "/articles/1").await;
    mount_article(&server, "/news/2", "Second Story", "/articles/2").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let index_path = dir.path().join("dedup_index.json");
    let seeds = vec![
        format!("{}/news/1", server.uri()),
        format!("{}/news/2", server.uri()),
    ];

    let mut settings = test_settings(seeds.clone(), &sink_path);
    settings.dedup.index_path = index_path.to_string_lossy().into_owned();

    let first = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;
    assert_eq!(first.deduped, 0);
    assert_eq!(read_jsonl(&sink_path).len(), 2);

    // 第二次运行：相同种子、持久化的索引
    let second_sink = dir.path().join("out2.jsonl");
    let mut settings = test_settings(seeds, &second_sink);
    settings.dedup.index_path = index_path.to_string_lossy().into_owned();

    let second = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;
    assert_eq!(second.extracted, 2);
    assert_eq!(second.deduped, 2);
    assert_eq!(read_jsonl(&second_sink).len(), 0);
}

/// 测试损坏的索引文件不阻止启动
#[tokio::test]
async fn test_pipeline_survives_corrupt_dedup_index() {
    let server = MockServer::start().await;
    mount_article(&server, "/news/1", "First Story", "/articles/1").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let index_path = dir.path().join("dedup_index.json");
    std::fs::write(&index_path, b"\x00garbage{{{").unwrap();

    let mut settings = test_settings(vec![format!("{}/news/1", server.uri())], &sink_path);
    settings.dedup.index_path = index_path.to_string_lossy().into_owned();

    let summary = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;

    // 索引降级为空，运行正常完成
    assert_eq!(summary.fetched, 1);
    assert_eq!(read_jsonl(&sink_path).len(), 1);
}

/// 测试关键词过滤丢弃不匹配的文章
#[tokio::test]
async fn test_pipeline_keyword_filter() {
    let server = MockServer::start().await;
    mount_article(&server, "/news/rust", "Rust Conference Announced", "/articles/rust").await;
    mount_article(&server, "/news/other", "Gardening Tips", "/articles/other").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let mut settings = test_settings(
        vec![
            format!("{}/news/rust", server.uri()),
            format!("{}/news/other", server.uri()),
        ],
        &sink_path,
    );
    settings.crawl.keywords = vec!["Rust".to_string()];

    let summary = PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.filtered, 1);
    let records = read_jsonl(&sink_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "Rust Conference Announced");
}

/// 测试情感评分阶段启用时输出评分字段
#[tokio::test]
async fn test_pipeline_sentiment_stage() {
    let server = MockServer::start().await;
    mount_article(&server, "/news/good", "Record growth celebrates success", "/a").await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let mut settings = test_settings(vec![format!("{}/news/good", server.uri())], &sink_path);
    settings.sentiment.enabled = true;

    PipelineCoordinator::new(&settings)
        .await
        .unwrap()
        .run()
        .await;

    let records = read_jsonl(&sink_path);
    assert_eq!(records.len(), 1);
    let score = records[0]["sentimentScore"].as_f64().unwrap();
    assert!(score > 0.0 && score <= 1.0);
}

/// 测试没有匹配模式的种子URL是启动错误
#[tokio::test]
async fn test_pipeline_rejects_unmatched_seed() {
    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let mut settings = test_settings(vec!["https://unmatched.example/".to_string()], &sink_path);
    settings.schemas[0].url_pattern = r"^https://only-this\.example/".to_string();

    let result = PipelineCoordinator::new(&settings).await;
    assert!(result.is_err());
}

/// 测试硬取消放弃进行中的工作并报告部分结果
#[tokio::test]
async fn test_pipeline_cancellation_reports_partial_results() {
    let server = MockServer::start().await;
    mount_article(&server, "/news/fast", "Fast Story", "/articles/fast").await;
    Mock::given(method("GET"))
        .and(path("/news/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Slow Story", "/articles/slow"))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let sink_path = dir.path().join("out.jsonl");
    let settings = test_settings(
        vec![
            format!("{}/news/fast", server.uri()),
            format!("{}/news/slow", server.uri()),
        ],
        &sink_path,
    );

    let coordinator = PipelineCoordinator::new(&settings).await.unwrap();
    let handle = coordinator.handle();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel();
    });

    // 慢请求被放弃，运行远早于30秒的响应延迟结束
    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("cancelled run must not wait for in-flight responses");
    canceller.await.unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(read_jsonl(&sink_path).len(), 1);
}
