// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// CSV输出
pub mod csv;
/// JSON Lines输出
pub mod json;
/// 情感评分阶段
pub mod sentiment;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::settings::{ConfigurationError, SinkSettings};
use crate::domain::models::article::ArticleRecord;

/// 输出错误类型
#[derive(Error, Debug)]
pub enum SinkError {
    /// I/O错误
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 输出记录
///
/// 写入Sink的线上契约，每条记录一个JSON对象或一行CSV。
/// `sentiment_score`仅在情感评分阶段启用时出现，评分失败为null。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub url: String,
    pub title: String,
    pub summary: String,
    /// ISO-8601格式的发布时间，无法解析时为null
    pub published_at: Option<String>,
    pub source: String,
    pub fingerprint: String,
    /// 外层None表示评分阶段未启用（字段省略），
    /// 内层None表示评分失败（字段为null）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<Option<f32>>,
}

impl OutputRecord {
    /// 根据文章记录构建输出记录
    ///
    /// # 参数
    ///
    /// * `article` - 提取出的文章记录
    /// * `sentiment_score` - 评分阶段的结果，阶段未启用时为None
    pub fn from_article(article: &ArticleRecord, sentiment_score: Option<Option<f32>>) -> Self {
        Self {
            url: article.url.clone(),
            title: article.title.clone(),
            summary: article.summary.clone(),
            published_at: article.published_at.map(|dt| dt.to_rfc3339()),
            source: article.source.clone(),
            fingerprint: article.fingerprint.clone(),
            sentiment_score,
        }
    }
}

/// 记录输出特质
///
/// 接收校验后的记录。实现必须保证flush后记录落盘，
/// 协调器在所有退出路径（包括取消）上调用flush。
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// 输出一条记录
    async fn emit(&mut self, record: &OutputRecord) -> Result<(), SinkError>;

    /// 刷新缓冲的记录
    async fn flush(&mut self) -> Result<(), SinkError>;
}

/// 根据输出配置构建Sink
///
/// # 参数
///
/// * `settings` - 输出配置
/// * `include_sentiment` - CSV输出是否包含情感评分列
pub async fn from_settings(
    settings: &SinkSettings,
    include_sentiment: bool,
) -> Result<Box<dyn RecordSink>, ConfigurationError> {
    let map_err = |e: std::io::Error| ConfigurationError::Sink {
        path: settings.path.clone(),
        source: e,
    };

    match settings.format.as_str() {
        "jsonl" => Ok(Box::new(
            json::JsonLinesSink::create(&settings.path).await.map_err(map_err)?,
        )),
        "csv" => Ok(Box::new(
            csv::CsvSink::create(&settings.path, include_sentiment)
                .await
                .map_err(map_err)?,
        )),
        other => Err(ConfigurationError::InvalidSinkFormat(other.to_string())),
    }
}
