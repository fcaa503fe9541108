// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use pressrs::crawler::controller::CrawlEngine;
use pressrs::domain::models::content::SelectorMap;
use pressrs::domain::models::source::{ClassifierConfig, DomainRule, SourceConfig};
use pressrs::domain::services::metrics_collector::CrawlMetrics;
use pressrs::engines::reqwest_engine::ReqwestEngine;
use pressrs::infrastructure::sinks::MemorySink;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 针对wiremock实例的来源配置
///
/// 退避单位压短以保证测试耗时可控。
pub fn source_for(server: &MockServer) -> SourceConfig {
    let base_url = Url::parse(&server.uri()).unwrap();
    let host = base_url.host_str().unwrap().to_string();

    SourceConfig {
        name: "test-source".to_string(),
        base_url,
        max_depth: 2,
        parallelism: 2,
        user_agent: "pressrs-test/0.1".to_string(),
        request_timeout: Duration::from_secs(5),
        max_body_size: 1024 * 1024,
        allowed_domains: vec![host],
        max_retries: 3,
        backoff_unit: Duration::from_millis(10),
        selectors: SelectorMap {
            title: "h1.title".to_string(),
            body: "div.content".to_string(),
            author: Some("span.author".to_string()),
            published_at: Some("time".to_string()),
            categories: None,
            tags: None,
            canonical: None,
        },
        classifier: ClassifierConfig::default(),
        domain_rules: vec![DomainRule {
            pattern: "*".to_string(),
            parallelism: 2,
            base_delay: Duration::ZERO,
            random_jitter: Duration::ZERO,
        }],
        respect_robots: false,
    }
}

/// 构建使用真实抓取引擎的爬取引擎
pub fn engine_for(
    config: SourceConfig,
) -> (
    CrawlEngine<ReqwestEngine, MemorySink>,
    Arc<MemorySink>,
    Arc<CrawlMetrics>,
) {
    let fetcher = Arc::new(
        ReqwestEngine::new(
            &config.user_agent,
            config.request_timeout,
            config.max_body_size,
        )
        .unwrap(),
    );
    let sink = Arc::new(MemorySink::new());
    let metrics = Arc::new(CrawlMetrics::new());
    let engine = CrawlEngine::new(config, fetcher, sink.clone(), metrics.clone(), None).unwrap();
    (engine, sink, metrics)
}

/// 注册一个固定HTML页面
pub async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// 生成一个文章页，带time元素作为DOM标记
pub fn article_page(title: &str, extra: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="title">{}</h1>
            <span class="author">Test Author</span>
            <time datetime="2024-03-20T10:00:00Z">March 20</time>
            <div class="content">Body of {}.</div>
            {}
        </body></html>"#,
        title, title, extra
    )
}

/// 生成一个列表页
pub fn listing_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}
