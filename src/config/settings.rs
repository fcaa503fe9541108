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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::domain::models::content::SelectorMap;
use crate::domain::models::source::{
    default_article_patterns, default_listing_patterns, default_marker_selectors, ClassifierConfig,
    DomainRule, SourceConfig,
};
use crate::domain::models::task::DomainError;

/// 应用程序配置设置
///
/// 包含爬虫全局配置、输出配置和各来源的爬取参数
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 爬虫全局配置
    pub crawler: CrawlerSettings,
    /// 输出配置
    pub output: OutputSettings,
    /// 来源列表
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
}

/// 爬虫全局配置设置
#[derive(Debug, Deserialize)]
pub struct CrawlerSettings {
    /// 是否遵循robots.txt
    pub respect_robots: bool,
    /// robots.txt缓存有效期（秒）
    pub robots_cache_ttl_secs: u64,
}

/// 输出配置设置
#[derive(Debug, Deserialize)]
pub struct OutputSettings {
    /// JSON Lines输出文件路径
    pub path: String,
}

/// 单个来源的配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    /// 来源名称
    pub name: String,
    /// 种子URL
    pub base_url: String,
    /// 最大遍历深度
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// 并发度
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// 同域名两次请求的最小间隔（毫秒）
    #[serde(default)]
    pub rate_limit_ms: u64,
    /// 叠加的随机延迟上限（毫秒）
    #[serde(default)]
    pub random_delay_ms: u64,
    /// User-Agent，缺省使用内置值
    #[serde(default)]
    pub user_agent: Option<String>,
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 响应体大小上限（字节）
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// 允许爬取的域名，为空时取种子URL的主机
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// 单URL最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试退避初始单位（毫秒）
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    /// 字段选择器映射
    pub selectors: SelectorMap,
    /// 列表页URL路径模式，覆盖内置默认
    #[serde(default)]
    pub listing_patterns: Option<Vec<String>>,
    /// 文章页URL路径模式，覆盖内置默认
    #[serde(default)]
    pub article_patterns: Option<Vec<String>>,
    /// 文章页模式命中后是否要求DOM标记佐证
    #[serde(default)]
    pub require_marker: Option<bool>,
    /// 佐证性DOM标记选择器，覆盖内置默认
    #[serde(default)]
    pub marker_selectors: Option<Vec<String>>,
    /// 附加域名速率规则，按顺序优先于来源级默认规则
    #[serde(default)]
    pub domain_rules: Vec<DomainRuleSettings>,
}

/// 域名速率规则配置
#[derive(Debug, Clone, Deserialize)]
pub struct DomainRuleSettings {
    /// 域名glob模式
    pub pattern: String,
    /// 并发上限，缺省取来源级并发度
    #[serde(default)]
    pub parallelism: Option<usize>,
    /// 最小派发间隔（毫秒），缺省取来源级配置
    #[serde(default)]
    pub rate_limit_ms: Option<u64>,
    /// 随机抖动上限（毫秒），缺省取来源级配置
    #[serde(default)]
    pub random_delay_ms: Option<u64>,
}

fn default_max_depth() -> u32 {
    2
}

fn default_parallelism() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    5 * 1024 * 1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; pressrs/0.1; +http://pressrs.dev)";

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Crawler defaults
            .set_default("crawler.respect_robots", true)?
            .set_default("crawler.robots_cache_ttl_secs", 3600)?
            // Output defaults
            .set_default("output.path", "./output/articles.jsonl")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("PRESSRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl SourceSettings {
    /// 解析为引擎可用的来源配置
    ///
    /// 种子URL解析、域名推导与选择器校验都在此完成，
    /// 配置问题在引擎启动前暴露。
    ///
    /// # 参数
    ///
    /// * `crawler` - 爬虫全局配置
    ///
    /// # 返回值
    ///
    /// * `Ok(SourceConfig)` - 解析完成的来源配置
    /// * `Err(DomainError)` - 配置无效
    pub fn resolve(&self, crawler: &CrawlerSettings) -> Result<SourceConfig, DomainError> {
        if self.base_url.trim().is_empty() {
            return Err(DomainError::ValidationError(format!(
                "source '{}' has an empty base URL",
                self.name
            )));
        }
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            DomainError::ValidationError(format!(
                "source '{}' has an invalid base URL: {}",
                self.name, e
            ))
        })?;

        let mut allowed_domains: Vec<String> = self
            .allowed_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        if allowed_domains.is_empty() {
            let host = base_url.host_str().ok_or_else(|| {
                DomainError::ValidationError(format!(
                    "source '{}' base URL has no host",
                    self.name
                ))
            })?;
            allowed_domains.push(host.to_ascii_lowercase());
        }

        let classifier = ClassifierConfig {
            listing_patterns: self
                .listing_patterns
                .clone()
                .unwrap_or_else(default_listing_patterns),
            article_patterns: self
                .article_patterns
                .clone()
                .unwrap_or_else(default_article_patterns),
            require_marker: self.require_marker.unwrap_or(true),
            marker_selectors: self
                .marker_selectors
                .clone()
                .unwrap_or_else(default_marker_selectors),
        };

        let mut domain_rules: Vec<DomainRule> = self
            .domain_rules
            .iter()
            .map(|rule| DomainRule {
                pattern: rule.pattern.clone(),
                parallelism: rule.parallelism.unwrap_or(self.parallelism),
                base_delay: Duration::from_millis(rule.rate_limit_ms.unwrap_or(self.rate_limit_ms)),
                random_jitter: Duration::from_millis(
                    rule.random_delay_ms.unwrap_or(self.random_delay_ms),
                ),
            })
            .collect();
        if !domain_rules.iter().any(|rule| rule.pattern == "*") {
            domain_rules.push(DomainRule {
                pattern: "*".to_string(),
                parallelism: self.parallelism,
                base_delay: Duration::from_millis(self.rate_limit_ms),
                random_jitter: Duration::from_millis(self.random_delay_ms),
            });
        }

        let config = SourceConfig {
            name: self.name.clone(),
            base_url,
            max_depth: self.max_depth,
            parallelism: self.parallelism,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_body_size: self.max_body_size,
            allowed_domains,
            max_retries: self.max_retries,
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
            selectors: self.selectors.clone(),
            classifier,
            domain_rules,
            respect_robots: crawler.respect_robots,
        };
        config.validate()?;
        Ok(config)
    }
}
