// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 指标快照
///
/// 某一时刻的进程级计数器读数。
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// 成功处理（提取）的页面数
    pub processed_count: u64,
    /// 错误总数，包含抓取、提取、时间戳解析和下游发送错误
    pub error_count: u64,
    /// 已处理的DOM元素数
    pub elements_processed: u64,
    /// 重试耗尽次数
    pub retry_exhausted_count: u64,
    /// 累计处理时长
    pub processing_time_ms: u64,
    /// 最近一次成功处理的时间
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// 爬取指标收集器
///
/// 进程级线程安全计数器，生命周期覆盖整个爬取会话，
/// 仅由显式`reset`清零。所有写操作在无界并发调用下安全。
/// 同时将各事件镜像到`metrics`门面，未安装recorder时
/// 镜像为空操作。
#[derive(Debug, Default)]
pub struct CrawlMetrics {
    processed_count: AtomicU64,
    error_count: AtomicU64,
    elements_processed: AtomicU64,
    retry_exhausted_count: AtomicU64,
    processing_time_ms: AtomicU64,
    last_processed_at: RwLock<Option<DateTime<Utc>>>,
}

impl CrawlMetrics {
    /// 创建新的指标收集器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功处理的页面
    pub fn record_processed(&self) {
        self.processed_count.fetch_add(1, Ordering::Relaxed);
        *self.last_processed_at.write() = Some(Utc::now());
        counter!("crawl_pages_processed_total").increment(1);
    }

    /// 累加处理时长
    pub fn record_processing_time(&self, duration: Duration) {
        self.processing_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        histogram!("crawl_processing_duration_seconds").record(duration.as_secs_f64());
    }

    /// 累加已处理的元素数
    pub fn record_elements_processed(&self, count: u64) {
        self.elements_processed.fetch_add(count, Ordering::Relaxed);
        counter!("crawl_elements_processed_total").increment(count);
    }

    /// 记录一次错误
    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        counter!("crawl_errors_total").increment(1);
    }

    /// 记录一次重试耗尽
    pub fn record_retry_exhausted(&self) {
        self.retry_exhausted_count.fetch_add(1, Ordering::Relaxed);
        counter!("crawl_retry_exhausted_total").increment(1);
    }

    /// 获取当前指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed_count: self.processed_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            elements_processed: self.elements_processed.load(Ordering::Relaxed),
            retry_exhausted_count: self.retry_exhausted_count.load(Ordering::Relaxed),
            processing_time_ms: self.processing_time_ms.load(Ordering::Relaxed),
            last_processed_at: *self.last_processed_at.read(),
        }
    }

    /// 清零全部计数器
    pub fn reset(&self) {
        self.processed_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.elements_processed.store(0, Ordering::Relaxed);
        self.retry_exhausted_count.store(0, Ordering::Relaxed);
        self.processing_time_ms.store(0, Ordering::Relaxed);
        *self.last_processed_at.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let metrics = CrawlMetrics::new();
        metrics.record_processed();
        metrics.record_processed();
        metrics.record_error();
        metrics.record_elements_processed(5);
        metrics.record_retry_exhausted();
        metrics.record_processing_time(Duration::from_millis(120));

        let snap = metrics.snapshot();
        assert_eq!(snap.processed_count, 2);
        assert_eq!(snap.error_count, 1);
        assert_eq!(snap.elements_processed, 5);
        assert_eq!(snap.retry_exhausted_count, 1);
        assert_eq!(snap.processing_time_ms, 120);
        assert!(snap.last_processed_at.is_some());
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = CrawlMetrics::new();
        metrics.record_processed();
        metrics.record_error();
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.processed_count, 0);
        assert_eq!(snap.error_count, 0);
        assert!(snap.last_processed_at.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let metrics = Arc::new(CrawlMetrics::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = metrics.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    m.record_error();
                    m.record_elements_processed(2);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.error_count, 8000);
        assert_eq!(snap.elements_processed, 16000);
    }
}
