// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use parking_lot::Mutex;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use url::Url;

/// 缓存的robots.txt内容
#[derive(Clone)]
struct CachedRobots {
    content: String,
    expires_at: Instant,
}

/// Robots.txt检查器
///
/// 按域名抓取并缓存robots.txt，回答URL是否允许访问。
/// 抓取失败或非200响应按允许全部处理并缓存一个TTL周期，
/// 可用性优先于严格性。
pub struct RobotsChecker {
    client: Client,
    cache: Mutex<HashMap<String, CachedRobots>>,
    ttl: Duration,
}

impl RobotsChecker {
    /// 创建新的Robots检查器实例
    ///
    /// # 参数
    ///
    /// * `user_agent` - 抓取robots.txt使用的User-Agent
    /// * `ttl` - 缓存有效期
    pub fn new(user_agent: &str, ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    /// 检查URL是否被允许访问
    ///
    /// # 参数
    ///
    /// * `url` - 待检查的URL
    /// * `user_agent` - 爬虫User-Agent
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 允许访问
    /// * `Ok(false)` - 被robots.txt禁止
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> Result<bool> {
        let origin = origin_of(url)?;
        let content = self.get_robots_content(&origin).await?;
        if content.is_empty() {
            return Ok(true);
        }

        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&content, user_agent, url.as_str()))
    }

    /// 获取域名的robots.txt内容，优先读缓存
    async fn get_robots_content(&self, origin: &str) -> Result<String> {
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.get(origin) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.content.clone());
                }
            }
        }

        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!(url = %robots_url, "Fetching robots.txt");

        let content = match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_default()
            }
            Ok(response) => {
                tracing::debug!(
                    status = response.status().as_u16(),
                    "robots.txt not available, allowing all"
                );
                String::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "robots.txt fetch failed, allowing all");
                String::new()
            }
        };

        let mut cache = self.cache.lock();
        cache.insert(
            origin.to_string(),
            CachedRobots {
                content: content.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok(content)
    }
}

fn origin_of(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL '{}' has no host", url))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
