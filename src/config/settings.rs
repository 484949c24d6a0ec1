// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::models::schema::{SchemaError, SiteSchema};

/// 应用程序配置设置
///
/// 包含抓取、限速、去重、输出和情感评分等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 抓取运行配置
    pub crawl: CrawlSettings,
    /// HTTP抓取配置
    pub fetcher: FetcherSettings,
    /// 去重索引配置
    pub dedup: DedupSettings,
    /// 输出配置
    pub sink: SinkSettings,
    /// 情感评分配置
    pub sentiment: SentimentSettings,
    /// 指标导出配置
    pub metrics: MetricsSettings,
    /// 站点模式列表
    #[serde(default)]
    pub schemas: Vec<SiteSchema>,
}

/// 抓取运行配置设置
#[derive(Debug, Deserialize)]
pub struct CrawlSettings {
    /// 种子URL列表
    #[serde(default)]
    pub seed_urls: Vec<String>,
    /// 关键词列表，非空时过滤不匹配的文章
    #[serde(default)]
    pub keywords: Vec<String>,
    /// 工作者并发数
    pub concurrency: usize,
    /// 单个请求的最大重试次数
    pub max_retries: u32,
}

/// HTTP抓取配置设置
#[derive(Debug, Deserialize)]
pub struct FetcherSettings {
    /// 单次请求超时时间（毫秒），同时约束限速等待
    pub request_timeout_ms: u64,
    /// 同一主机两次请求之间的最小间隔（毫秒）
    pub per_host_interval_ms: u64,
    /// User-Agent请求头
    pub user_agent: String,
    /// 是否遵循robots.txt
    pub respect_robots: bool,
}

/// 去重索引配置设置
#[derive(Debug, Deserialize)]
pub struct DedupSettings {
    /// 索引持久化路径，空字符串表示仅内存索引
    pub index_path: String,
}

/// 输出配置设置
#[derive(Debug, Deserialize)]
pub struct SinkSettings {
    /// 输出格式 (jsonl, csv)
    pub format: String,
    /// 输出文件路径
    pub path: String,
}

/// 情感评分配置设置
#[derive(Debug, Deserialize)]
pub struct SentimentSettings {
    /// 是否启用情感评分阶段
    pub enabled: bool,
}

/// 指标导出配置设置
#[derive(Debug, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用Prometheus导出器
    pub enabled: bool,
    /// 导出器监听地址
    pub listen: String,
}

/// 配置错误类型
///
/// 启动阶段唯一允许到达进程边界的错误，任何工作开始前即报告
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// 配置加载失败
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    /// 缺少种子URL
    #[error("No seed URLs configured")]
    NoSeedUrls,

    /// 无效的站点模式
    #[error("Invalid site schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    /// 种子URL没有匹配的站点模式
    #[error("No schema matches seed URL: {0}")]
    NoSchemaForSeed(String),

    /// 无效的输出格式
    #[error("Invalid sink format '{0}', expected 'jsonl' or 'csv'")]
    InvalidSinkFormat(String),

    /// HTTP客户端构建失败
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// 输出文件打开失败
    #[error("Failed to open sink at '{path}': {source}")]
    Sink {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Default crawl settings
            .set_default("crawl.concurrency", 8)?
            .set_default("crawl.max_retries", 3)?
            // Default fetcher settings
            .set_default("fetcher.request_timeout_ms", 10_000)?
            .set_default("fetcher.per_host_interval_ms", 500)?
            .set_default(
                "fetcher.user_agent",
                "Mozilla/5.0 (compatible; newsrs/1.0; +http://newsrs.dev)",
            )?
            .set_default("fetcher.respect_robots", true)?
            // Default dedup settings
            .set_default("dedup.index_path", "./data/dedup_index.json")?
            // Default sink settings
            .set_default("sink.format", "jsonl")?
            .set_default("sink.path", "./out/articles.jsonl")?
            // Default sentiment settings
            .set_default("sentiment.enabled", false)?
            // Default metrics settings
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen", "0.0.0.0:9000")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("NEWSRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 校验配置
    ///
    /// 种子URL缺失、站点模式非法或输出格式未知均为致命错误，
    /// 在任何抓取开始前报告
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.crawl.seed_urls.is_empty() {
            return Err(ConfigurationError::NoSeedUrls);
        }

        for schema in &self.schemas {
            schema.validate()?;
        }

        match self.sink.format.as_str() {
            "jsonl" | "csv" => {}
            other => return Err(ConfigurationError::InvalidSinkFormat(other.to_string())),
        }

        Ok(())
    }
}
