// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 判断URL是否为http(s)协议
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// 计算会话内去重使用的规范化键
///
/// 丢弃fragment，路径去除末尾斜杠（根路径除外）；主机
/// 小写与默认端口的省略由Url解析本身保证，查询串原样
/// 保留。
pub fn normalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    url.to_string()
}
