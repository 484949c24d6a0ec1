// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;

use newsrs::config::settings::{
    CrawlSettings, DedupSettings, FetcherSettings, MetricsSettings, SentimentSettings, Settings,
    SinkSettings,
};
use newsrs::domain::models::schema::SiteSchema;

/// 指向测试服务器的通用站点模式
pub fn article_schema() -> SiteSchema {
    SiteSchema {
        name: "test-site".to_string(),
        url_pattern: ".*".to_string(),
        title_selector: "h1.headline".to_string(),
        link_selector: "a.article-link".to_string(),
        summary_selector: Some("p.summary".to_string()),
        date_selector: Some("time.published".to_string()),
    }
}

/// 构建指向测试服务器的配置
///
/// 去重索引默认仅内存，限速间隔为0以保持测试快速
pub fn test_settings(seed_urls: Vec<String>, sink_path: &Path) -> Settings {
    Settings {
        crawl: CrawlSettings {
            seed_urls,
            keywords: vec![],
            concurrency: 4,
            max_retries: 3,
        },
        fetcher: FetcherSettings {
            request_timeout_ms: 5_000,
            per_host_interval_ms: 0,
            user_agent: "newsrs-test/1.0".to_string(),
            respect_robots: false,
        },
        dedup: DedupSettings {
            index_path: String::new(),
        },
        sink: SinkSettings {
            format: "jsonl".to_string(),
            path: sink_path.to_string_lossy().into_owned(),
        },
        sentiment: SentimentSettings { enabled: false },
        metrics: MetricsSettings {
            enabled: false,
            listen: "127.0.0.1:0".to_string(),
        },
        schemas: vec![article_schema()],
    }
}

/// 生成一篇符合测试模式的文章页面
pub fn article_html(title: &str, link: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="headline">{}</h1>
            <p class="summary">Summary of {}</p>
            <time class="published" datetime="2024-03-01T08:00:00Z">March 1</time>
            <a class="article-link" href="{}">Read more</a>
        </body></html>"#,
        title, title, link
    )
}

/// 读取JSON Lines输出文件
pub fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}
