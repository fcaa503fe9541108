// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// 初始化指标系统
///
/// 安装Prometheus recorder并注册爬取引擎的各项监控指标。
/// 未调用时各指标宏退化为空操作，引擎照常工作。
pub fn init_metrics() -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder.install()?;

    describe_counter!(
        "crawl_tasks_submitted_total",
        "Total number of crawl tasks accepted into the frontier"
    );
    describe_counter!(
        "crawl_tasks_completed_total",
        "Total number of crawl tasks completed"
    );
    describe_counter!(
        "crawl_tasks_failed_total",
        "Total number of crawl tasks failed"
    );
    describe_counter!(
        "crawl_pages_processed_total",
        "Total number of pages successfully extracted"
    );
    describe_counter!("crawl_errors_total", "Total number of errors recorded");
    describe_counter!(
        "crawl_fetch_failures_total",
        "Total number of fetch failures by error kind"
    );
    describe_counter!(
        "crawl_retry_exhausted_total",
        "Total number of URLs that exhausted their retries"
    );
    describe_counter!(
        "crawl_elements_processed_total",
        "Total number of DOM elements processed during extraction"
    );
    describe_histogram!(
        "crawl_processing_duration_seconds",
        "Duration of crawl task processing in seconds"
    );

    Ok(())
}
