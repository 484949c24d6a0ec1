// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use url::Url;

/// 缓存的Robots.txt内容
#[derive(Clone)]
struct CachedRobots {
    content: String,
    expires_at: Instant,
}

/// Robots.txt检查器
///
/// 按主机抓取并缓存robots.txt。抓取失败或404视为无限制，
/// robots检查永远不会使运行失败。
pub struct RobotsChecker {
    /// HTTP客户端，与抓取器共享连接池
    client: Client,
    /// User-Agent，同时用于抓取和匹配
    user_agent: String,
    /// 内存缓存
    cache: Mutex<HashMap<String, CachedRobots>>,
}

/// 缓存有效期
const CACHE_TTL: Duration = Duration::from_secs(3600);

impl RobotsChecker {
    /// 创建新的Robots检查器实例
    pub fn new(client: Client, user_agent: String) -> Self {
        Self {
            client,
            user_agent,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 检查URL是否被允许访问
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let content = match self.robots_content(url).await {
            Some(content) => content,
            None => return true,
        };

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&content, &self.user_agent, url.as_str())
    }

    /// 获取Robots.txt内容（带缓存）
    ///
    /// 返回None表示robots.txt不可用，调用方按无限制处理
    async fn robots_content(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let robots_url = match url.port() {
            Some(port) => format!("{}://{}:{}/robots.txt", url.scheme(), host, port),
            None => format!("{}://{}/robots.txt", url.scheme(), host),
        };

        {
            let mut cache = self.cache.lock();
            if let Some(cached) = cache.get(&robots_url) {
                if cached.expires_at > Instant::now() {
                    return Some(cached.content.clone());
                }
                cache.remove(&robots_url);
            }
        }

        let content = match self
            .client
            .get(&robots_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
                // 404 is a valid response, meaning no robots.txt
                String::new()
            }
            Ok(resp) => {
                tracing::debug!("Unexpected robots.txt status {} from {}", resp.status(), robots_url);
                String::new()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt from {}: {}", robots_url, e);
                String::new()
            }
        };

        let mut cache = self.cache.lock();
        cache.insert(
            robots_url,
            CachedRobots {
                content: content.clone(),
                expires_at: Instant::now() + CACHE_TTL,
            },
        );

        Some(content)
    }
}
