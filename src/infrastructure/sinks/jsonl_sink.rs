// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::models::content::ExtractedContent;
use crate::domain::repositories::content_sink::{ContentSink, SinkError};

/// JSON Lines下游存储
///
/// 每条内容记录序列化为一行JSON追加到目标文件。
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// 创建（或打开）目标文件
    ///
    /// 父目录不存在时自动创建，文件以追加模式打开。
    ///
    /// # 参数
    ///
    /// * `path` - 输出文件路径
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// 输出文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContentSink for JsonlSink {
    async fn emit(&self, content: ExtractedContent) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&content)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
