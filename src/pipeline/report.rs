// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 运行报告计数器
///
/// 工作者并发累加，关闭时快照输出。终态失败永远不会被
/// 静默丢弃，全部计入failed_terminal。
#[derive(Debug, Default)]
pub struct RunReport {
    fetched: AtomicU64,
    extracted: AtomicU64,
    deduped: AtomicU64,
    dropped_extraction_errors: AtomicU64,
    filtered: AtomicU64,
    failed_terminal: AtomicU64,
}

impl RunReport {
    /// 成功抓取一个页面
    pub fn incr_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// 成功提取一条文章记录
    pub fn incr_extracted(&self) {
        self.extracted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("newsrs_articles_extracted_total").increment(1);
    }

    /// 因指纹重复丢弃一条记录
    pub fn incr_deduped(&self) {
        self.deduped.fetch_add(1, Ordering::Relaxed);
    }

    /// 因提取错误丢弃一条记录
    pub fn incr_dropped_extraction(&self) {
        self.dropped_extraction_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 因关键词不匹配丢弃一条记录
    pub fn incr_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// 一个请求进入终态失败
    pub fn incr_failed_terminal(&self) {
        self.failed_terminal.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("newsrs_requests_failed_total").increment(1);
    }

    /// 生成当前计数的快照
    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            fetched: self.fetched.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            deduped: self.deduped.load(Ordering::Relaxed),
            dropped_extraction_errors: self.dropped_extraction_errors.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            failed_terminal: self.failed_terminal.load(Ordering::Relaxed),
        }
    }
}

/// 运行报告快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// 成功抓取的页面数
    pub fetched: u64,
    /// 成功提取的文章数
    pub extracted: u64,
    /// 因指纹重复丢弃的记录数
    pub deduped: u64,
    /// 因提取错误丢弃的记录数
    pub dropped_extraction_errors: u64,
    /// 因关键词不匹配丢弃的记录数
    pub filtered: u64,
    /// 终态失败的请求数
    pub failed_terminal: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "fetched={} extracted={} deduped={} dropped_extraction_errors={} filtered={} failed_terminal={}",
            self.fetched,
            self.extracted,
            self.deduped,
            self.dropped_extraction_errors,
            self.filtered,
            self.failed_terminal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_reflects_counts() {
        let report = RunReport::default();
        report.incr_fetched();
        report.incr_fetched();
        report.incr_extracted();
        report.incr_deduped();
        report.incr_failed_terminal();

        let summary = report.snapshot();
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.deduped, 1);
        assert_eq!(summary.dropped_extraction_errors, 0);
        assert_eq!(summary.failed_terminal, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let report = Arc::new(RunReport::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let report = report.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    report.incr_fetched();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(report.snapshot().fetched, 1600);
    }
}
