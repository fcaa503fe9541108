// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::domain::models::content::SelectorMap;
use crate::domain::models::task::DomainError;

/// 域名速率规则
///
/// 将并发度与请求间隔策略绑定到一个域名glob模式上。
/// `*`匹配任意字符序列，例如`*.example.com`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRule {
    /// 域名glob模式
    pub pattern: String,
    /// 该规则下允许的最大并发抓取数
    pub parallelism: usize,
    /// 两次派发之间的最小间隔
    pub base_delay: Duration,
    /// 叠加在最小间隔上的随机抖动上限
    pub random_jitter: Duration,
}

/// 分类器策略配置
///
/// 列表页模式的优先级高于文章页模式；文章页模式命中后
/// 是否还需要DOM标记佐证由`require_marker`控制。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// 列表页URL路径模式（正则）
    pub listing_patterns: Vec<String>,
    /// 文章页URL路径模式（正则）
    pub article_patterns: Vec<String>,
    /// 文章页模式命中后是否要求DOM标记佐证
    pub require_marker: bool,
    /// 佐证性DOM标记选择器
    pub marker_selectors: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            listing_patterns: default_listing_patterns(),
            article_patterns: default_article_patterns(),
            require_marker: true,
            marker_selectors: default_marker_selectors(),
        }
    }
}

/// 默认列表页路径模式
pub fn default_listing_patterns() -> Vec<String> {
    [
        "/category/",
        "/categories/",
        "/tag/",
        "/tags/",
        "/search",
        "/archive",
        "/feed",
        "/page/[0-9]+",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// 默认文章页路径模式
pub fn default_article_patterns() -> Vec<String> {
    [
        "/article/",
        "/articles/",
        "/news/",
        "/post/",
        "/posts/",
        "/story/",
        "/[0-9]{4}/[0-9]{2}/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// 默认DOM标记选择器
pub fn default_marker_selectors() -> Vec<String> {
    ["time", ".details", "article"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 来源配置
///
/// 单个爬取来源的全部已解析参数，在引擎启动前由配置层
/// 解析并校验完成，对核心只读。
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// 来源名称
    pub name: String,
    /// 种子URL
    pub base_url: Url,
    /// 最大遍历深度
    pub max_depth: u32,
    /// 工作器数量，同时也是默认规则的并发上限
    pub parallelism: usize,
    /// User-Agent
    pub user_agent: String,
    /// 单次请求超时
    pub request_timeout: Duration,
    /// 响应体大小上限（字节）
    pub max_body_size: usize,
    /// 允许爬取的域名集合（小写），子域名视为允许
    pub allowed_domains: Vec<String>,
    /// 单URL最大重试次数
    pub max_retries: u32,
    /// 重试退避的初始单位时长
    pub backoff_unit: Duration,
    /// 字段选择器映射
    pub selectors: SelectorMap,
    /// 分类器策略
    pub classifier: ClassifierConfig,
    /// 域名速率规则，末尾保证存在一条`*`兜底规则
    pub domain_rules: Vec<DomainRule>,
    /// 是否遵循robots.txt
    pub respect_robots: bool,
}

impl SourceConfig {
    /// 校验来源配置
    ///
    /// 构造期快速失败：空名称、空种子URL、无主机名的种子、
    /// 零并发、零大小上限以及非法选择器都在此处拒绝。
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "source name is empty".to_string(),
            ));
        }
        if self.base_url.host_str().is_none() {
            return Err(DomainError::ValidationError(format!(
                "base URL '{}' has no host",
                self.base_url
            )));
        }
        if self.parallelism == 0 {
            return Err(DomainError::ValidationError(
                "parallelism must be greater than zero".to_string(),
            ));
        }
        if self.max_body_size == 0 {
            return Err(DomainError::ValidationError(
                "max_body_size must be greater than zero".to_string(),
            ));
        }
        if self.allowed_domains.is_empty() {
            return Err(DomainError::ValidationError(
                "allowed_domains is empty".to_string(),
            ));
        }
        for rule in &self.domain_rules {
            if rule.parallelism == 0 {
                return Err(DomainError::ValidationError(format!(
                    "domain rule '{}' has zero parallelism",
                    rule.pattern
                )));
            }
        }
        self.selectors.validate()?;
        Ok(())
    }

    /// 判断主机是否属于允许的域名集合
    ///
    /// 精确匹配或作为允许域名的子域名均视为允许。
    pub fn is_domain_allowed(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.allowed_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SourceConfig {
        SourceConfig {
            name: "example".to_string(),
            base_url: Url::parse("https://news.example.com/").unwrap(),
            max_depth: 2,
            parallelism: 4,
            user_agent: "pressrs/0.1".to_string(),
            request_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
            allowed_domains: vec!["example.com".to_string()],
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
            selectors: SelectorMap {
                title: "h1".to_string(),
                body: "div.content".to_string(),
                author: None,
                published_at: None,
                categories: None,
                tags: None,
                canonical: None,
            },
            classifier: ClassifierConfig::default(),
            domain_rules: vec![DomainRule {
                pattern: "*".to_string(),
                parallelism: 4,
                base_delay: Duration::ZERO,
                random_jitter: Duration::ZERO,
            }],
            respect_robots: false,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let mut c = config();
        c.parallelism = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_allowed_domains() {
        let mut c = config();
        c.allowed_domains.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_domain_allowed_includes_subdomains() {
        let c = config();
        assert!(c.is_domain_allowed("example.com"));
        assert!(c.is_domain_allowed("news.example.com"));
        assert!(c.is_domain_allowed("NEWS.Example.COM"));
        assert!(!c.is_domain_allowed("example.org"));
        assert!(!c.is_domain_allowed("notexample.com"));
    }
}
