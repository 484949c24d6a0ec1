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

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::config::settings::{ConfigurationError, Settings};
use crate::dedup::DedupIndex;
use crate::domain::models::article::ArticleRecord;
use crate::domain::models::request::FetchRequest;
use crate::domain::models::schema::SchemaRegistry;
use crate::fetcher::{FetchError, Fetcher};
use crate::pipeline::frontier::Frontier;
use crate::pipeline::report::{RunReport, RunSummary};
use crate::pipeline::worker::CrawlWorker;
use crate::sink::sentiment::{LexiconScorer, SentimentScorer};
use crate::sink::RecordSink;
use crate::utils::cancel::CancelToken;

/// 流水线共享状态
///
/// 由协调器创建，所有工作者通过Arc共享。除前沿队列、去重索引
/// 和Sink锁之外没有全局可变状态。
pub(crate) struct PipelineContext {
    pub(crate) frontier: Frontier,
    pub(crate) fetcher: Fetcher,
    pub(crate) registry: SchemaRegistry,
    pub(crate) dedup: DedupIndex,
    pub(crate) sink: tokio::sync::Mutex<Box<dyn RecordSink>>,
    pub(crate) scorer: Option<Box<dyn SentimentScorer>>,
    /// 小写化的关键词列表，空表示不过滤
    pub(crate) keywords: Vec<String>,
    pub(crate) report: RunReport,
    pub(crate) cancel: CancelToken,
    /// 尚未进入终态的请求数
    pending: AtomicUsize,
    idle_notify: Notify,
}

impl PipelineContext {
    /// 判断文章是否命中关键词过滤
    pub(crate) fn keyword_match(&self, article: &ArticleRecord) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", article.title, article.summary).to_lowercase();
        self.keywords.iter().any(|kw| haystack.contains(kw))
    }

    /// 一个请求进入终态
    pub(crate) fn task_done(&self) {
        self.task_done_n(1);
    }

    fn task_done_n(&self, count: usize) {
        if count == 0 {
            return;
        }
        if self.pending.fetch_sub(count, Ordering::AcqRel) == count {
            self.idle_notify.notify_waiters();
        }
    }

    /// 等待所有请求进入终态
    async fn wait_idle(&self) {
        loop {
            let notified = self.idle_notify.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 处理抓取失败
    ///
    /// 协调器边界：所有每请求错误在这里转换为状态转换。
    /// 限速超时在尝试次数允许时重新入队，其余失败进入终态
    /// 并计入运行报告。
    pub(crate) fn handle_fetch_failure(&self, mut request: FetchRequest, error: FetchError) {
        match error {
            FetchError::Cancelled => {
                // 被放弃的请求不计入任何终态，运行经由取消分支退出
            }
            FetchError::RateLimitTimeout if request.can_retry() => {
                warn!(
                    "Rate limit timeout for {}, requeueing (attempt {}/{})",
                    request.url, request.attempt_count, request.max_retries
                );
                if request.requeue().is_ok() && self.frontier.push(request) {
                    return;
                }
                // 队列已关闭，无法重试
                self.report.incr_failed_terminal();
                self.task_done();
            }
            error => {
                warn!(
                    "Request for {} failed terminally after {} attempt(s): {}",
                    request.url, request.attempt_count, error
                );
                let _ = request.fail_terminal();
                self.report.incr_failed_terminal();
                self.task_done();
            }
        }
    }

    /// 优雅关闭：停止接纳新请求，丢弃未开始的请求
    fn graceful_shutdown(&self) {
        let discarded = self.frontier.discard_queued();
        if discarded > 0 {
            info!("Discarded {} queued requests on shutdown", discarded);
        }
        self.task_done_n(discarded);
    }
}

/// 流水线控制句柄
///
/// 供信号处理等外部任务触发关闭，克隆廉价
#[derive(Clone)]
pub struct PipelineHandle {
    ctx: Arc<PipelineContext>,
}

impl PipelineHandle {
    /// 优雅关闭：停止接纳新请求，等待进行中的工作完成
    pub fn shutdown(&self) {
        info!("Graceful shutdown requested");
        self.ctx.graceful_shutdown();
    }

    /// 硬取消：立即放弃进行中的工作，报告部分结果
    pub fn cancel(&self) {
        warn!("Hard cancellation requested, abandoning in-flight work");
        self.ctx.cancel.cancel();
    }

    /// 当前运行报告快照
    pub fn report(&self) -> RunSummary {
        self.ctx.report.snapshot()
    }
}

/// 流水线协调器
///
/// 用种子URL填充前沿队列，启动有界工作者池，在队列耗尽或
/// 取消后收尾：排空工作者、刷新Sink、持久化去重索引并输出
/// 运行报告。
pub struct PipelineCoordinator {
    ctx: Arc<PipelineContext>,
    concurrency: usize,
}

impl PipelineCoordinator {
    /// 构建流水线
    ///
    /// 校验配置并解析每个种子URL的站点模式。任何配置问题
    /// 在此返回，抓取尚未开始。
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    ///
    /// # 返回值
    ///
    /// * `Ok(PipelineCoordinator)` - 就绪的流水线
    /// * `Err(ConfigurationError)` - 配置非法
    pub async fn new(settings: &Settings) -> Result<Self, ConfigurationError> {
        settings.validate()?;

        let registry = SchemaRegistry::new(settings.schemas.clone())?;

        let mut seeds = Vec::with_capacity(settings.crawl.seed_urls.len());
        for url in &settings.crawl.seed_urls {
            let schema = registry
                .match_url(url)
                .ok_or_else(|| ConfigurationError::NoSchemaForSeed(url.clone()))?;
            seeds.push(FetchRequest::new(
                url.clone(),
                schema.name.clone(),
                settings.crawl.max_retries,
            ));
        }

        let fetcher = Fetcher::new(&settings.fetcher, settings.crawl.max_retries)?;

        let dedup = if settings.dedup.index_path.is_empty() {
            DedupIndex::in_memory()
        } else {
            DedupIndex::load(Path::new(&settings.dedup.index_path))
        };

        let sink = crate::sink::from_settings(&settings.sink, settings.sentiment.enabled).await?;
        let scorer: Option<Box<dyn SentimentScorer>> = if settings.sentiment.enabled {
            Some(Box::new(LexiconScorer))
        } else {
            None
        };

        let ctx = Arc::new(PipelineContext {
            frontier: Frontier::new(),
            fetcher,
            registry,
            dedup,
            sink: tokio::sync::Mutex::new(sink),
            scorer,
            keywords: settings
                .crawl
                .keywords
                .iter()
                .map(|kw| kw.to_lowercase())
                .collect(),
            report: RunReport::default(),
            cancel: CancelToken::new(),
            pending: AtomicUsize::new(seeds.len()),
            idle_notify: Notify::new(),
        });

        for seed in seeds {
            ctx.frontier.push(seed);
        }

        Ok(Self {
            ctx,
            concurrency: settings.crawl.concurrency.max(1),
        })
    }

    /// 获取控制句柄
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            ctx: self.ctx.clone(),
        }
    }

    /// 运行流水线直到完成或取消
    ///
    /// # 返回值
    ///
    /// 运行报告快照。取消时报告覆盖已完成的部分工作。
    pub async fn run(self) -> RunSummary {
        info!(
            "Starting pipeline: {} seed(s), {} worker(s)",
            self.ctx.frontier.len(),
            self.concurrency
        );

        let mut handles = Vec::with_capacity(self.concurrency);
        for id in 0..self.concurrency {
            let worker = CrawlWorker::new(id, self.ctx.clone());
            handles.push(tokio::spawn(async move { worker.run().await }));
        }

        tokio::select! {
            _ = self.ctx.wait_idle() => {
                info!("Frontier drained, stopping workers");
            }
            _ = self.ctx.cancel.cancelled() => {
                warn!("Cancelled, reporting partial results");
            }
        }

        self.ctx.frontier.close();
        futures::future::join_all(handles).await;

        // Sink在所有退出路径上刷新，包括取消
        if let Err(e) = self.ctx.sink.lock().await.flush().await {
            error!("Failed to flush sink: {}", e);
        }
        if let Err(e) = self.ctx.dedup.persist() {
            warn!("Failed to persist dedup index: {}", e);
        }

        let summary = self.ctx.report.snapshot();
        info!("Run report: {}", summary);
        summary
    }
}
