// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// 抓取请求实体
///
/// 表示前沿队列中一个待抓取的URL。请求具有优先级、
/// 重试计数和状态机，状态机约束其生命周期内的合法转换。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// 请求唯一标识符
    pub id: Uuid,
    /// 目标URL
    pub url: String,
    /// 请求优先级，数值越大优先级越高
    pub priority: i32,
    /// 匹配到的站点模式名称
    pub schema: String,
    /// 请求状态
    pub status: RequestStatus,
    /// 已尝试次数
    pub attempt_count: u32,
    /// 最大重试次数
    pub max_retries: u32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始抓取时间
    pub started_at: Option<DateTime<Utc>>,
    /// 终态时间
    pub completed_at: Option<DateTime<Utc>>,
}

/// 请求状态枚举
///
/// 状态转换遵循以下流程：
/// Queued → Fetching → Extracting → Emitted/Dropped
/// Fetching → Queued（重试）或 FailedTerminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// 已入队，等待工作者拉取
    #[default]
    Queued,
    /// 抓取中
    Fetching,
    /// 提取中
    Extracting,
    /// 已输出，记录写入Sink
    Emitted,
    /// 已丢弃（提取失败、重复或关键词过滤）
    Dropped,
    /// 终态失败，不再重试
    FailedTerminal,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestStatus::Queued => write!(f, "queued"),
            RequestStatus::Fetching => write!(f, "fetching"),
            RequestStatus::Extracting => write!(f, "extracting"),
            RequestStatus::Emitted => write!(f, "emitted"),
            RequestStatus::Dropped => write!(f, "dropped"),
            RequestStatus::FailedTerminal => write!(f, "failed_terminal"),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidStateTransition(RequestStatus, &'static str),
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]", self.url, self.status)
    }
}

impl FetchRequest {
    /// 创建一个新的抓取请求
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `schema` - 匹配到的站点模式名称
    /// * `max_retries` - 最大重试次数
    ///
    /// # 返回值
    ///
    /// 返回处于Queued状态的新请求
    pub fn new(url: String, schema: String, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            priority: 0,
            schema,
            status: RequestStatus::Queued,
            attempt_count: 0,
            max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// 开始抓取
    ///
    /// 将请求状态从Queued变更为Fetching，并递增尝试次数
    pub fn start_fetch(&mut self) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Queued => {
                self.status = RequestStatus::Fetching;
                self.attempt_count += 1;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other, "fetching")),
        }
    }

    /// 开始提取
    pub fn start_extract(&mut self) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Fetching => {
                self.status = RequestStatus::Extracting;
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other, "extracting")),
        }
    }

    /// 标记输出完成
    pub fn emit(&mut self) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Extracting => {
                self.status = RequestStatus::Emitted;
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other, "emitted")),
        }
    }

    /// 丢弃记录
    ///
    /// 提取失败、指纹重复或关键词过滤时调用，流水线继续运行
    pub fn drop_record(&mut self) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Extracting => {
                self.status = RequestStatus::Dropped;
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other, "dropped")),
        }
    }

    /// 重新入队等待重试
    pub fn requeue(&mut self) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Fetching => {
                self.status = RequestStatus::Queued;
                self.started_at = None;
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other, "queued")),
        }
    }

    /// 标记终态失败
    ///
    /// 超过最大重试次数或遇到永久性错误时调用
    pub fn fail_terminal(&mut self) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Queued | RequestStatus::Fetching => {
                self.status = RequestStatus::FailedTerminal;
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other, "failed_terminal")),
        }
    }

    /// 判断请求是否可以重试
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_retries
    }
}
