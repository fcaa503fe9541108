// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;
use url::Url;

/// 爬取任务实体
///
/// 表示对一个URL的一次逻辑访问，携带该访问发生的深度和
/// 所属来源。任务由遍历控制器创建并独占持有，直到交给
/// 抓取工作器处理；到达终止状态（成功或失败）后销毁。
#[derive(Debug, Clone)]
pub struct CrawlTask {
    /// 目标URL
    pub url: Url,
    /// 当前深度，种子为0
    pub depth: u32,
    /// 所属来源名称
    pub source: String,
    /// 任务状态
    pub state: TaskState,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Fetching → {Succeeded | Retrying → Fetching | Failed}
///
/// Succeeded和Failed为终止状态；Retrying仅在剩余重试次数
/// 允许时回到Fetching。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// 等待中，任务已创建但尚未开始抓取
    #[default]
    Pending,
    /// 抓取中，任务正在执行一次抓取尝试
    Fetching,
    /// 重试中，上一次尝试失败且允许重试
    Retrying,
    /// 已成功，终止状态
    Succeeded,
    /// 已失败，终止状态
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Fetching => write!(f, "fetching"),
            TaskState::Retrying => write!(f, "retrying"),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "fetching" => Ok(TaskState::Fetching),
            "retrying" => Ok(TaskState::Retrying),
            "succeeded" => Ok(TaskState::Succeeded),
            "failed" => Ok(TaskState::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，当任务状态转换不符合生命周期规则时发生
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误，当配置或输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl CrawlTask {
    /// 创建一个新的爬取任务
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    /// * `depth` - 任务深度，种子为0
    /// * `source` - 所属来源名称
    pub fn new(url: Url, depth: u32, source: impl Into<String>) -> Self {
        Self {
            url,
            depth,
            source: source.into(),
            state: TaskState::Pending,
            created_at: Utc::now(),
        }
    }

    /// 基于父任务创建子任务
    ///
    /// 子任务深度为父任务深度加一，来源继承自父任务。
    pub fn child(&self, url: Url) -> Self {
        Self::new(url, self.depth + 1, self.source.clone())
    }

    /// 开始一次抓取尝试
    ///
    /// 将任务状态从Pending或Retrying变更为Fetching
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 转换成功
    /// * `Err(DomainError)` - 状态转换失败
    pub fn begin_fetch(&mut self) -> Result<(), DomainError> {
        match self.state {
            TaskState::Pending | TaskState::Retrying => {
                self.state = TaskState::Fetching;
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记任务进入重试
    ///
    /// 将任务状态从Fetching变更为Retrying
    pub fn mark_retrying(&mut self) -> Result<(), DomainError> {
        match self.state {
            TaskState::Fetching => {
                self.state = TaskState::Retrying;
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记任务成功完成
    ///
    /// 将任务状态从Fetching变更为Succeeded
    pub fn mark_succeeded(&mut self) -> Result<(), DomainError> {
        match self.state {
            TaskState::Fetching => {
                self.state = TaskState::Succeeded;
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记任务失败
    ///
    /// 将任务状态从Fetching变更为Failed
    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        match self.state {
            TaskState::Fetching => {
                self.state = TaskState::Failed;
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 判断任务是否处于终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TaskState::Succeeded | TaskState::Failed)
    }
}

/// 单次抓取尝试
///
/// 每次重试创建一个新实例；同一任务生命周期内最多存在
/// `max_retries + 1` 个实例。
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// 尝试序号，从1开始
    pub number: u32,
    /// 开始时间
    pub started_at: Instant,
}

impl FetchAttempt {
    /// 创建一次新的抓取尝试
    pub fn new(number: u32) -> Self {
        Self {
            number,
            started_at: Instant::now(),
        }
    }

    /// 自尝试开始以来经过的时间
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
