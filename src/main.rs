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

use newsrs::config::settings::Settings;
use newsrs::pipeline::PipelineCoordinator;
use newsrs::utils::{metrics, telemetry};
use tokio::signal;
use tracing::info;

/// 主函数
///
/// 应用程序入口点。配置加载失败或启动错误以非零退出码结束，
/// 正常完成（包括部分丢弃和取消后的部分结果）退出码为0。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting newsrs...");

    // 2. Load and validate configuration
    let settings = Settings::new()?;
    settings.validate()?;
    info!("Configuration loaded");

    // 3. Optional Prometheus metrics exporter
    if settings.metrics.enabled {
        metrics::init_metrics(&settings.metrics.listen);
    }

    // 4. Build the pipeline (seeds resolved, sink opened, dedup index loaded)
    let coordinator = PipelineCoordinator::new(&settings).await?;
    let handle = coordinator.handle();

    // 5. Shutdown signals: first Ctrl-C drains in-flight work,
    //    second abandons it and reports partial results
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            handle.shutdown();
        }
        if signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    // 6. Run to completion
    let summary = coordinator.run().await;
    info!(
        "Done: {} article(s) emitted, {} terminal failure(s)",
        summary
            .extracted
            .saturating_sub(summary.deduped + summary.filtered),
        summary.failed_terminal
    );

    Ok(())
}
