// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::models::content::ExtractedContent;
use crate::domain::repositories::content_sink::{ContentSink, SinkError};

/// 内存下游存储
///
/// 将记录保存在内存中，供测试断言使用。
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ExtractedContent>>,
}

impl MemorySink {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 已接收记录的拷贝
    pub fn records(&self) -> Vec<ExtractedContent> {
        self.records.lock().clone()
    }

    /// 已接收的记录数
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// 是否未接收任何记录
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ContentSink for MemorySink {
    async fn emit(&self, content: ExtractedContent) -> Result<(), SinkError> {
        self.records.lock().push(content);
        Ok(())
    }
}
