// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 文章记录实体
///
/// 提取阶段的不可变产物。指纹在创建时计算，
/// 在去重索引中唯一标识该文章。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// 文章URL（已解析为绝对路径）
    pub url: String,
    /// 文章标题
    pub title: String,
    /// 文章摘要，选择器未命中时为空字符串
    pub summary: String,
    /// 发布时间，无法解析时为None
    pub published_at: Option<DateTime<Utc>>,
    /// 来源站点名称
    pub source: String,
    /// 内容指纹
    pub fingerprint: String,
}

impl ArticleRecord {
    /// 创建新的文章记录
    ///
    /// 指纹根据规范化后的标题和URL计算，创建后不再变化
    pub fn new(
        url: String,
        title: String,
        summary: String,
        published_at: Option<DateTime<Utc>>,
        source: String,
    ) -> Self {
        let fingerprint = fingerprint(&title, &url);
        Self {
            url,
            title,
            summary,
            published_at,
            source,
            fingerprint,
        }
    }
}

/// 计算文章指纹
///
/// 对规范化后的标题和URL做SHA-256哈希。规范化会折叠空白字符
/// 并转换为小写，从而容忍琐碎的格式差异。
///
/// # 参数
///
/// * `title` - 文章标题
/// * `url` - 已解析的绝对URL
///
/// # 返回值
///
/// 十六进制编码的指纹字符串
pub fn fingerprint(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(title).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize(url).as_bytes());
    hex::encode(hasher.finalize())
}

/// 规范化文本：折叠空白并转换为小写
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
