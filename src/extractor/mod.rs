// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 发布时间解析
pub mod dates;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::domain::models::article::ArticleRecord;
use crate::domain::models::schema::SiteSchema;
use crate::utils::url_utils;

/// 提取错误类型
///
/// 对流水线非致命：记录被丢弃并计入运行报告，但运行继续。
/// 同一内容不会解析出不同结果，因此提取错误从不重试。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    /// 必填字段的选择器未命中
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// 模式中的选择器非法（启动校验后不应出现）
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// 提取器
///
/// 根据站点模式从HTML内容中提取文章记录。解析器工作在
/// 容错模式，残缺的标记本身不会导致失败，只有解析成功后
/// 必填字段缺失才会报错。
pub struct Extractor;

impl Extractor {
    /// 提取文章记录
    ///
    /// 按顺序应用模式的选择器：标题（必填）、链接（必填，
    /// 相对路径解析为绝对URL）、摘要（可选，未命中为空字符串）、
    /// 发布时间（可选，无法解析为None）。
    ///
    /// # 参数
    ///
    /// * `body` - 原始HTML内容
    /// * `schema` - 匹配到的站点模式
    /// * `base_url` - 用于解析相对链接的基准URL
    ///
    /// # 返回值
    ///
    /// * `Ok(ArticleRecord)` - 提取成功
    /// * `Err(ExtractionError)` - 必填字段缺失
    pub fn extract(
        body: &str,
        schema: &SiteSchema,
        base_url: &Url,
    ) -> Result<ArticleRecord, ExtractionError> {
        let document = Html::parse_document(body);

        let title = select_text(&document, &schema.title_selector)?
            .ok_or(ExtractionError::MissingRequiredField("title"))?;

        let link = select_link(&document, &schema.link_selector, base_url)?
            .ok_or(ExtractionError::MissingRequiredField("link"))?;

        let summary = match &schema.summary_selector {
            Some(selector) => select_text(&document, selector)?.unwrap_or_default(),
            None => String::new(),
        };

        let published_at = match &schema.date_selector {
            Some(selector) => select_date(&document, selector)?,
            None => None,
        };

        Ok(ArticleRecord::new(
            link,
            title,
            summary,
            published_at,
            schema.name.clone(),
        ))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|_| ExtractionError::InvalidSelector(selector.to_string()))
}

/// 收集元素的文本内容并折叠空白
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 选择首个命中元素的非空文本
fn select_text(document: &Html, selector: &str) -> Result<Option<String>, ExtractionError> {
    let selector = parse_selector(selector)?;
    Ok(document
        .select(&selector)
        .map(|element| element_text(&element))
        .find(|text| !text.is_empty()))
}

/// 选择首个命中元素的链接并解析为绝对URL
///
/// 优先使用href属性，无href时回退到元素文本
fn select_link(
    document: &Html,
    selector: &str,
    base_url: &Url,
) -> Result<Option<String>, ExtractionError> {
    let selector = parse_selector(selector)?;
    for element in document.select(&selector) {
        let candidate = match element.value().attr("href") {
            Some(href) => href.trim().to_string(),
            None => element_text(&element),
        };
        if candidate.is_empty() {
            continue;
        }
        if let Ok(resolved) = url_utils::resolve_url(base_url, &candidate) {
            return Ok(Some(resolved.to_string()));
        }
    }
    Ok(None)
}

/// 选择首个可解析的发布时间
///
/// 优先使用datetime属性（`<time>`元素的惯例），其次元素文本
fn select_date(
    document: &Html,
    selector: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, ExtractionError> {
    let selector = parse_selector(selector)?;
    for element in document.select(&selector) {
        let raw = match element.value().attr("datetime") {
            Some(datetime) => datetime.to_string(),
            None => element_text(&element),
        };
        if let Some(parsed) = dates::parse_published_at(&raw) {
            return Ok(Some(parsed));
        }
    }
    Ok(None)
}
