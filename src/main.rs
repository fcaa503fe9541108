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

use pressrs::config::settings::Settings;
use pressrs::crawler::controller::CrawlEngine;
use pressrs::domain::services::metrics_collector::CrawlMetrics;
use pressrs::engines::reqwest_engine::ReqwestEngine;
use pressrs::infrastructure::observability::metrics::init_metrics;
use pressrs::infrastructure::sinks::JsonlSink;
use pressrs::utils::robots::RobotsChecker;
use pressrs::utils::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并依次爬取配置的
/// 各个来源
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting pressrs...");

    // Initialize Prometheus Metrics
    init_metrics()?;

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded, {} sources", settings.sources.len());

    if settings.sources.is_empty() {
        warn!("No sources configured, nothing to crawl");
        return Ok(());
    }

    // 3. Initialize sink
    let sink = Arc::new(JsonlSink::create(&settings.output.path).await?);
    info!(path = %settings.output.path, "Output sink ready");

    // 4. Crawl each source
    for source_settings in &settings.sources {
        let source = match source_settings.resolve(&settings.crawler) {
            Ok(source) => source,
            Err(e) => {
                error!(source = %source_settings.name, error = %e, "Invalid source configuration, skipping");
                continue;
            }
        };

        let fetcher = Arc::new(ReqwestEngine::new(
            &source.user_agent,
            source.request_timeout,
            source.max_body_size,
        )?);

        let robots = if source.respect_robots {
            Some(RobotsChecker::new(
                &source.user_agent,
                Duration::from_secs(settings.crawler.robots_cache_ttl_secs),
            )?)
        } else {
            None
        };

        let metrics = Arc::new(CrawlMetrics::new());
        let seed = source.base_url.to_string();
        let engine = CrawlEngine::new(source, fetcher, sink.clone(), metrics, robots)?;

        // Ctrl-C triggers graceful cancellation of the running crawl
        let stopper = engine.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stopper.stop();
            }
        });

        match engine.start(&seed).await {
            Ok(snapshot) => {
                info!(
                    processed = snapshot.processed_count,
                    errors = snapshot.error_count,
                    elements = snapshot.elements_processed,
                    "Source crawl summary"
                );
            }
            Err(e) => {
                error!(error = %e, "Source crawl failed");
            }
        }
        ctrl_c.abort();
    }

    info!("All sources processed");
    Ok(())
}
