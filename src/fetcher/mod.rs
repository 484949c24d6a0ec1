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

/// 按主机限速
pub mod politeness;
/// 重试退避策略
pub mod retry_policy;
/// Robots.txt检查
pub mod robots;

use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::settings::{ConfigurationError, FetcherSettings};
use crate::fetcher::politeness::HostLimiter;
use crate::fetcher::retry_policy::RetryPolicy;
use crate::fetcher::robots::RobotsChecker;
use crate::utils::cancel::CancelToken;
use crate::utils::url_utils;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 瞬时失败（超时、5xx、连接重置），退避后重试
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// 限速等待超过请求超时
    #[error("Rate limit wait exceeded request timeout")]
    RateLimitTimeout,

    /// 永久失败（4xx非429、DNS解析失败、非法URL），不重试
    #[error("Permanent fetch failure: {0}")]
    Permanent(String),

    /// robots.txt禁止访问
    #[error("Disallowed by robots.txt")]
    RobotsDisallowed,

    /// 运行被取消，进行中的请求被放弃
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// 判断错误是否可在抓取器内部重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// 抓取结果
///
/// 由产生它的工作者短暂持有，交给提取器后即丢弃
#[derive(Debug)]
pub struct FetchResult {
    /// 响应的最终URL（重定向后）
    pub url: String,
    /// HTTP状态码
    pub status: u16,
    /// 响应体
    pub body: String,
    /// 本次成功尝试的耗时
    pub elapsed: Duration,
}

/// 单次尝试的失败，可能携带服务器的Retry-After提示
struct AttemptError {
    error: FetchError,
    retry_after: Option<Duration>,
}

/// 抓取器
///
/// 持有共享的HTTP客户端（连接复用）、按主机限速器和重试策略。
/// 瞬时失败在内部按退避计划重试，永久失败立即返回。
pub struct Fetcher {
    client: Client,
    limiter: HostLimiter,
    robots: Option<RobotsChecker>,
    retry_policy: RetryPolicy,
    request_timeout: Duration,
}

impl Fetcher {
    /// 创建新的抓取器实例
    ///
    /// # 参数
    ///
    /// * `settings` - 抓取配置
    /// * `max_retries` - 瞬时失败的最大重试次数
    pub fn new(settings: &FetcherSettings, max_retries: u32) -> Result<Self, ConfigurationError> {
        let request_timeout = Duration::from_millis(settings.request_timeout_ms);
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        let robots = settings
            .respect_robots
            .then(|| RobotsChecker::new(client.clone(), settings.user_agent.clone()));

        Ok(Self {
            client,
            limiter: HostLimiter::new(Duration::from_millis(settings.per_host_interval_ms)),
            robots,
            retry_policy: RetryPolicy::with_max_retries(max_retries),
            request_timeout,
        })
    }

    /// 执行HTTP抓取
    ///
    /// 每次尝试前申请主机槽位并检查取消信号。429响应优先使用
    /// `Retry-After`提示（秒数形式），否则按退避计划等待。
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `cancel` - 运行级取消令牌
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResult)` - 抓取成功
    /// * `Err(FetchError)` - 重试耗尽或不可重试的失败
    pub async fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<FetchResult, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::Permanent(format!("malformed URL '{}': {}", url, e)))?;
        let host = url_utils::host_key(&parsed)
            .ok_or_else(|| FetchError::Permanent(format!("URL has no host: {}", url)))?;

        if let Some(robots) = &self.robots {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if !robots.is_allowed(&parsed).await {
                return Err(FetchError::RobotsDisallowed);
            }
        }

        let mut attempt = 1u32;
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            // 限速等待以整体请求超时为上限
            let deadline = Instant::now() + self.request_timeout;
            tokio::select! {
                res = self.limiter.acquire(&host, deadline) => {
                    res.map_err(|_| FetchError::RateLimitTimeout)?;
                }
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            }

            let outcome = tokio::select! {
                res = self.attempt(&parsed) => res,
                // 取消时放弃进行中的请求，连接随future丢弃而关闭
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            };

            let failure = match outcome {
                Ok(result) => return Ok(result),
                Err(failure) => failure,
            };

            if !failure.error.is_retryable() || !self.retry_policy.should_retry(attempt) {
                return Err(failure.error);
            }

            let delay = failure
                .retry_after
                .unwrap_or_else(|| self.retry_policy.calculate_backoff(attempt));
            debug!(
                "Retrying {} in {:?} (attempt {}/{})",
                parsed, delay, attempt, self.retry_policy.max_retries
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            }
            attempt += 1;
        }
    }

    /// 执行单次请求并分类结果
    async fn attempt(&self, url: &Url) -> Result<FetchResult, AttemptError> {
        metrics::counter!("newsrs_fetch_attempts_total").increment(1);
        let started = Instant::now();

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(AttemptError {
                    error: classify_request_error(&e),
                    retry_after: None,
                })
            }
        };

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = parse_retry_after(&response)
                .map(|hint| hint.min(self.retry_policy.max_backoff));
            return Err(AttemptError {
                error: FetchError::Transient("429 Too Many Requests".to_string()),
                retry_after,
            });
        }
        if status.is_server_error() {
            return Err(AttemptError {
                error: FetchError::Transient(format!("server error: {}", status)),
                retry_after: None,
            });
        }
        if status.is_client_error() {
            return Err(AttemptError {
                error: FetchError::Permanent(format!("client error: {}", status)),
                retry_after: None,
            });
        }

        let final_url = response.url().to_string();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Err(AttemptError {
                    error: FetchError::Transient(format!("failed to read body: {}", e)),
                    retry_after: None,
                })
            }
        };

        Ok(FetchResult {
            url: final_url,
            status: status.as_u16(),
            body,
            elapsed: started.elapsed(),
        })
    }
}

/// 解析429响应的Retry-After请求头（仅支持秒数形式）
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// 将reqwest错误分类为瞬时或永久失败
///
/// DNS解析失败是永久的，超时和连接中断是瞬时的
fn classify_request_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Transient(format!("timeout: {}", error));
    }

    let chain = error_chain(error);
    if chain.contains("dns") || chain.contains("name or service not known") {
        return FetchError::Permanent(format!("dns failure: {}", error));
    }

    FetchError::Transient(chain)
}

/// 拼接错误及其来源链的小写描述
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message.to_lowercase()
}
