// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tokio::sync::Notify;

use crate::domain::models::request::FetchRequest;

/// 前沿队列条目
///
/// 按优先级降序排列，同优先级按入队顺序（FIFO）
struct Entry {
    priority: i32,
    seq: u64,
    request: FetchRequest,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // 大顶堆：优先级高者先出，同优先级时seq小者先出
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    closed: bool,
}

/// 前沿队列
///
/// 多生产者多消费者的优先级队列。关闭后拒绝新请求，
/// 等待中的消费者被唤醒并收到None。
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    /// 创建新的前沿队列
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// 入队请求
    ///
    /// # 返回值
    ///
    /// 队列已关闭时返回false，请求被拒绝
    pub fn push(&self, request: FetchRequest) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return false;
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(Entry {
                priority: request.priority,
                seq,
                request,
            });
        }
        self.notify.notify_waiters();
        true
    }

    /// 出队请求
    ///
    /// 队列为空时挂起等待。返回None表示队列已关闭且无剩余请求。
    pub async fn pop(&self) -> Option<FetchRequest> {
        loop {
            // 在检查前创建等待句柄，避免丢失唤醒
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(entry) = inner.heap.pop() {
                    return Some(entry.request);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// 关闭队列
    ///
    /// 之后的push被拒绝，剩余请求仍可出队
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// 关闭队列并丢弃所有未开始的请求
    ///
    /// # 返回值
    ///
    /// 被丢弃的请求数量
    pub fn discard_queued(&self) -> usize {
        let discarded = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            let discarded = inner.heap.len();
            inner.heap.clear();
            discarded
        };
        self.notify.notify_waiters();
        discarded
    }

    /// 队列中的请求数量
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// 队列是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }
}
