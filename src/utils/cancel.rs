// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::sync::watch;

/// 运行级取消令牌
///
/// 在每次状态转换和阻塞I/O前检查。触发后，进行中的抓取
/// 被放弃而不是等待完成。克隆是廉价的，所有克隆共享同一信号。
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// 创建新的取消令牌
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// 触发取消
    ///
    /// 所有等待`cancelled()`的任务被唤醒，幂等
    pub fn cancel(&self) {
        // send only fails when every receiver is gone, which cannot
        // happen while this token holds one
        let _ = self.sender.send(true);
    }

    /// 是否已取消
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if *receiver.borrow() {
            return;
        }
        while receiver.changed().await.is_ok() {
            if *receiver.borrow() {
                return;
            }
        }
        // Sender未触发即被丢弃时保持挂起，select!的其他分支负责退出
        std::future::pending::<()>().await;
    }
}
