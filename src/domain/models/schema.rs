// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 站点模式
///
/// 描述如何从某个站点的页面中提取文章字段。启动时加载并校验，
/// 之后只读，所有工作者共享，无需加锁。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSchema {
    /// 站点名称，作为输出记录的来源字段
    pub name: String,
    /// URL匹配模式（正则表达式）
    pub url_pattern: String,
    /// 标题选择器（必填字段）
    pub title_selector: String,
    /// 链接选择器（必填字段）
    pub link_selector: String,
    /// 摘要选择器，未命中时输出空字符串
    #[serde(default)]
    pub summary_selector: Option<String>,
    /// 发布时间选择器，无法解析时输出null
    #[serde(default)]
    pub date_selector: Option<String>,
}

/// 模式错误类型
#[derive(Error, Debug)]
pub enum SchemaError {
    /// 无效的CSS选择器
    #[error("Invalid selector in schema '{schema}': {selector}")]
    InvalidSelector { schema: String, selector: String },

    /// 无效的URL匹配模式
    #[error("Invalid url_pattern in schema '{schema}': {source}")]
    InvalidPattern {
        schema: String,
        #[source]
        source: regex::Error,
    },
}

impl SiteSchema {
    /// 校验模式中所有选择器和URL正则是否合法
    pub fn validate(&self) -> Result<(), SchemaError> {
        Regex::new(&self.url_pattern).map_err(|e| SchemaError::InvalidPattern {
            schema: self.name.clone(),
            source: e,
        })?;

        let selectors = [
            Some(&self.title_selector),
            Some(&self.link_selector),
            self.summary_selector.as_ref(),
            self.date_selector.as_ref(),
        ];
        for selector in selectors.into_iter().flatten() {
            if Selector::parse(selector).is_err() {
                return Err(SchemaError::InvalidSelector {
                    schema: self.name.clone(),
                    selector: selector.clone(),
                });
            }
        }
        Ok(())
    }
}

/// 站点模式注册表
///
/// 持有全部已校验的模式及其预编译的URL正则，
/// 按配置顺序进行首个匹配。
pub struct SchemaRegistry {
    entries: Vec<(Regex, SiteSchema)>,
}

impl SchemaRegistry {
    /// 构建注册表
    ///
    /// # 参数
    ///
    /// * `schemas` - 配置中声明的站点模式列表
    ///
    /// # 返回值
    ///
    /// * `Ok(SchemaRegistry)` - 全部模式校验通过
    /// * `Err(SchemaError)` - 任一模式的选择器或正则非法
    pub fn new(schemas: Vec<SiteSchema>) -> Result<Self, SchemaError> {
        let mut entries = Vec::with_capacity(schemas.len());
        for schema in schemas {
            schema.validate()?;
            let pattern = Regex::new(&schema.url_pattern).map_err(|e| SchemaError::InvalidPattern {
                schema: schema.name.clone(),
                source: e,
            })?;
            entries.push((pattern, schema));
        }
        Ok(Self { entries })
    }

    /// 按URL匹配站点模式，返回首个命中的模式
    pub fn match_url(&self, url: &str) -> Option<&SiteSchema> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.is_match(url))
            .map(|(_, schema)| schema)
    }

    /// 按名称查找站点模式
    pub fn get(&self, name: &str) -> Option<&SiteSchema> {
        self.entries
            .iter()
            .find(|(_, schema)| schema.name == name)
            .map(|(_, schema)| schema)
    }

    /// 注册表中的模式数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 注册表是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
