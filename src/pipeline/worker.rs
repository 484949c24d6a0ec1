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

use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::domain::models::request::FetchRequest;
use crate::extractor::Extractor;
use crate::pipeline::coordinator::PipelineContext;
use crate::sink::OutputRecord;

/// 抓取工作者
///
/// 从前沿队列拉取请求，依次经过抓取、提取、去重并输出到Sink。
/// 每请求错误在协调器边界转换为状态转换，工作者本身从不失败。
pub(crate) struct CrawlWorker {
    id: usize,
    ctx: Arc<PipelineContext>,
}

impl CrawlWorker {
    /// 创建新的抓取工作者实例
    pub(crate) fn new(id: usize, ctx: Arc<PipelineContext>) -> Self {
        Self { id, ctx }
    }

    /// 运行工作者循环
    ///
    /// 队列关闭排空或收到取消信号后退出
    pub(crate) async fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            let request = tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                request = self.ctx.frontier.pop() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.process(request).await;
        }

        debug!("Worker {} stopped", self.id);
    }

    #[instrument(skip(self, request), fields(worker = self.id, url = %request.url))]
    async fn process(&self, mut request: FetchRequest) {
        if let Err(e) = request.start_fetch() {
            error!("Dropping request in unexpected state: {}", e);
            self.ctx.task_done();
            return;
        }

        let fetch = match self.ctx.fetcher.fetch(&request.url, &self.ctx.cancel).await {
            Ok(fetch) => fetch,
            Err(e) => {
                self.ctx.handle_fetch_failure(request, e);
                return;
            }
        };
        self.ctx.report.incr_fetched();
        debug!(
            "Fetched {} ({} bytes, status {}, {:?})",
            fetch.url,
            fetch.body.len(),
            fetch.status,
            fetch.elapsed
        );

        // 状态转换前检查取消信号
        if self.ctx.cancel.is_cancelled() {
            return;
        }
        if let Err(e) = request.start_extract() {
            error!("Dropping request in unexpected state: {}", e);
            self.ctx.task_done();
            return;
        }

        let schema = match self.ctx.registry.get(&request.schema) {
            Some(schema) => schema,
            None => {
                // 种子入队时已解析模式，运行中注册表不变
                error!("Schema '{}' vanished from registry", request.schema);
                let _ = request.fail_terminal();
                self.ctx.report.incr_failed_terminal();
                self.ctx.task_done();
                return;
            }
        };

        // 相对链接以响应的最终URL为基准解析
        let base_url = match Url::parse(&fetch.url) {
            Ok(base_url) => base_url,
            Err(e) => {
                error!("Response URL unparsable for {}: {}", request.url, e);
                let _ = request.fail_terminal();
                self.ctx.report.incr_failed_terminal();
                self.ctx.task_done();
                return;
            }
        };

        let article = match Extractor::extract(&fetch.body, schema, &base_url) {
            Ok(article) => article,
            Err(e) => {
                warn!("Extraction failed for {}: {}", request.url, e);
                self.ctx.report.incr_dropped_extraction();
                let _ = request.drop_record();
                self.ctx.task_done();
                return;
            }
        };
        self.ctx.report.incr_extracted();

        if !self.ctx.keyword_match(&article) {
            debug!("Article filtered by keywords: {}", article.url);
            self.ctx.report.incr_filtered();
            let _ = request.drop_record();
            self.ctx.task_done();
            return;
        }

        if !self.ctx.dedup.check_and_insert(&article.fingerprint) {
            debug!("Duplicate article dropped: {}", article.url);
            self.ctx.report.incr_deduped();
            let _ = request.drop_record();
            self.ctx.task_done();
            return;
        }

        // 评分失败置null，从不中断流水线
        let sentiment = self.ctx.scorer.as_ref().map(|scorer| {
            let text = format!("{} {}", article.title, article.summary);
            scorer.score(&text)
        });

        let record = OutputRecord::from_article(&article, sentiment);
        {
            let mut sink = self.ctx.sink.lock().await;
            if let Err(e) = sink.emit(&record).await {
                error!("Failed to emit record for {}: {}", article.url, e);
            }
        }

        let _ = request.emit();
        self.ctx.task_done();
    }
}
