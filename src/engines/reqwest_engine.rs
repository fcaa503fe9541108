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

use crate::engines::traits::{FetchEngine, FetchError, FetchErrorKind, FetchResponse};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use url::Url;

/// 抓取引擎
///
/// 基于reqwest实现的HTTP抓取引擎。客户端按来源构建一次，
/// 携带该来源的User-Agent与请求超时；响应体以流式读取并
/// 在超过大小上限时提前中止。
pub struct ReqwestEngine {
    client: reqwest::Client,
    max_body_size: usize,
}

impl ReqwestEngine {
    /// 创建新的抓取引擎实例
    ///
    /// # 参数
    ///
    /// * `user_agent` - User-Agent请求头
    /// * `timeout` - 单次请求超时
    /// * `max_body_size` - 响应体大小上限（字节）
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestEngine)` - 构建成功的引擎
    /// * `Err(FetchError)` - 客户端构建失败
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        max_body_size: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(FetchError::from)?;

        Ok(Self {
            client,
            max_body_size,
        })
    }
}

#[async_trait]
impl FetchEngine for ReqwestEngine {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let started = Instant::now();
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from)?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(FetchError::from)? {
            if buf.len() + chunk.len() > self.max_body_size {
                return Err(FetchError::new(
                    FetchErrorKind::BodyTooLarge,
                    format!("response body exceeds {} bytes", self.max_body_size),
                ));
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            status_code,
            body: String::from_utf8_lossy(&buf).into_owned(),
            content_type,
            final_url,
            response_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
