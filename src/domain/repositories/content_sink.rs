// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::content::ExtractedContent;

/// 下游存储错误类型
#[derive(Error, Debug)]
pub enum SinkError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 其他错误
    #[error("Sink error: {0}")]
    Other(String),
}

/// 内容下游存储特质
///
/// 接收提取出的内容记录。发送失败由核心记录日志并计数，
/// 核心不重试发送；重试（如有）是下游自己的职责。
#[async_trait]
pub trait ContentSink: Send + Sync {
    /// 发送一条内容记录
    ///
    /// # 参数
    ///
    /// * `content` - 内容记录，所有权随调用转移
    async fn emit(&self, content: ExtractedContent) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: ContentSink + ?Sized> ContentSink for std::sync::Arc<T> {
    async fn emit(&self, content: ExtractedContent) -> Result<(), SinkError> {
        (**self).emit(content).await
    }
}
