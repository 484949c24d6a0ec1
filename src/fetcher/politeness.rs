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

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// 限速等待超过截止时间
#[derive(Error, Debug)]
#[error("Politeness wait would exceed the request deadline")]
pub struct AcquireTimeout;

/// 按主机限速器
///
/// 每个主机独立维护一个令牌槽位，保证同一主机两次请求之间
/// 至少间隔配置的时长。跨主机互不影响。
pub struct HostLimiter {
    /// 最小请求间隔
    interval: Duration,
    /// 各主机的下一个空闲槽位
    slots: DashMap<String, Arc<Mutex<Instant>>>,
}

impl HostLimiter {
    /// 创建新的按主机限速器
    ///
    /// # 参数
    ///
    /// * `interval` - 同一主机两次请求之间的最小间隔
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slots: DashMap::new(),
        }
    }

    /// 申请指定主机的请求槽位
    ///
    /// 预定最早可用的槽位并等待到该时刻。槽位晚于`deadline`时
    /// 不等待，直接返回错误，调用方将其映射为`RateLimitTimeout`。
    ///
    /// # 参数
    ///
    /// * `host` - 主机键（小写主机名）
    /// * `deadline` - 最晚可接受的槽位时刻
    pub async fn acquire(&self, host: &str, deadline: Instant) -> Result<(), AcquireTimeout> {
        let slot = {
            let entry = self
                .slots
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Instant::now())))
                .clone();
            let mut next_free = entry.lock();

            let now = Instant::now();
            let slot = if *next_free > now { *next_free } else { now };
            if slot > deadline {
                return Err(AcquireTimeout);
            }
            *next_free = slot + self.interval;
            slot
        };

        metrics::counter!("newsrs_host_requests_total", "host" => host.to_string()).increment(1);

        tokio::time::sleep_until(slot).await;
        Ok(())
    }

    /// 已见过的主机数量
    pub fn host_count(&self) -> usize {
        self.slots.len()
    }
}
