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

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;
use url::Url;

/// 抓取错误种类
///
/// 由抓取能力在产生错误时标注的封闭枚举。重试策略只依据
/// 种类做决策，不检查错误文本。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// 请求超时
    Timeout,
    /// 临时性网络错误（连接重置、中断等）
    Temporary,
    /// TLS握手失败
    TlsHandshake,
    /// 连接被拒绝
    ConnectionRefused,
    /// DNS解析失败
    Dns,
    /// HTTP 5xx响应
    ServerError,
    /// HTTP 4xx响应
    ClientError,
    /// 响应体超过大小上限
    BodyTooLarge,
    /// 无效URL
    InvalidUrl,
    /// 其他错误
    Other,
}

impl FetchErrorKind {
    /// 判断该种类的错误是否可重试
    ///
    /// 超时、临时性网络错误、TLS握手失败、连接被拒绝和
    /// 服务端5xx响应可重试；其余立即终止。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout
                | FetchErrorKind::Temporary
                | FetchErrorKind::TlsHandshake
                | FetchErrorKind::ConnectionRefused
                | FetchErrorKind::ServerError
        )
    }

    /// 根据HTTP状态码派生失败种类
    ///
    /// # 返回值
    ///
    /// 2xx/3xx返回None，5xx返回ServerError，4xx返回ClientError
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            500..=599 => Some(FetchErrorKind::ServerError),
            400..=499 => Some(FetchErrorKind::ClientError),
            _ => None,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::Temporary => write!(f, "temporary"),
            FetchErrorKind::TlsHandshake => write!(f, "tls_handshake"),
            FetchErrorKind::ConnectionRefused => write!(f, "connection_refused"),
            FetchErrorKind::Dns => write!(f, "dns"),
            FetchErrorKind::ServerError => write!(f, "server_error"),
            FetchErrorKind::ClientError => write!(f, "client_error"),
            FetchErrorKind::BodyTooLarge => write!(f, "body_too_large"),
            FetchErrorKind::InvalidUrl => write!(f, "invalid_url"),
            FetchErrorKind::Other => write!(f, "other"),
        }
    }
}

/// 抓取错误
#[derive(Error, Debug)]
#[error("fetch failed ({kind}): {message}")]
pub struct FetchError {
    /// 错误种类
    pub kind: FetchErrorKind,
    /// 错误描述
    pub message: String,
}

impl FetchError {
    /// 创建抓取错误
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<reqwest::Error> for FetchError {
    /// 将reqwest错误映射到封闭的错误种类
    ///
    /// 通过类型化谓词和IO错误链判断，不做字符串匹配。
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_builder() {
            FetchErrorKind::InvalidUrl
        } else if error.is_connect() {
            match io_error_kind(&error) {
                Some(std::io::ErrorKind::ConnectionRefused) => FetchErrorKind::ConnectionRefused,
                Some(
                    std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected,
                ) => FetchErrorKind::Temporary,
                Some(std::io::ErrorKind::TimedOut) => FetchErrorKind::Timeout,
                Some(std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof) => {
                    FetchErrorKind::TlsHandshake
                }
                _ => FetchErrorKind::Other,
            }
        } else if error.is_body() || error.is_decode() {
            FetchErrorKind::Temporary
        } else {
            FetchErrorKind::Other
        };

        Self { kind, message }
    }
}

/// 在错误源链中查找底层IO错误种类
fn io_error_kind(error: &(dyn StdError + 'static)) -> Option<std::io::ErrorKind> {
    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = inner.source();
    }
    None
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应正文
    pub body: String,
    /// 内容类型
    pub content_type: String,
    /// 重定向后的最终URL
    pub final_url: Url,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 抓取引擎特质
///
/// 遍历控制器消费的HTTP抓取能力。实现方负责超时与响应体
/// 大小的约束，并在错误上标注种类。
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// 抓取一个URL
    ///
    /// HTTP错误状态（4xx/5xx）作为正常响应返回，由调用方
    /// 根据状态码决定后续处理；网络层失败返回带种类的错误。
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
