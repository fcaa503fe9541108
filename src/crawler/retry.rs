// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::services::metrics_collector::CrawlMetrics;
use crate::engines::traits::FetchErrorKind;

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 延迟指定时长后重试
    Retry(Duration),
    /// 终止，不再重试
    Terminal,
}

/// 退避配置
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// 最大重试次数
    pub max_retries: u32,
    /// 初始退避时间
    pub backoff_unit: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl BackoffConfig {
    /// 计算指定尝试次数的退避时间
    ///
    /// `delay = backoff_unit * backoff_multiplier^attempt`，
    /// 以max_backoff封顶，可叠加抖动。
    ///
    /// # 参数
    ///
    /// * `attempt` - 已失败的尝试次数，首次重试为0
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.backoff_unit.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter && self.jitter_factor > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(final_backoff)
    }
}

/// 每URL重试状态
///
/// 记录URL到已失败尝试次数的映射。仅由重试策略修改；
/// 任务到达终止状态（成功或重试耗尽）时移除对应条目，
/// 使内存占用以在途URL数为界。
#[derive(Debug, Default)]
pub struct RetryState {
    attempts: DashMap<String, u32>,
}

impl RetryState {
    /// 查询URL当前已失败的尝试次数
    pub fn count(&self, url: &str) -> u32 {
        self.attempts.get(url).map(|v| *v).unwrap_or(0)
    }

    /// 累加URL的失败尝试次数
    fn increment(&self, url: &str) {
        *self.attempts.entry(url.to_string()).or_insert(0) += 1;
    }

    /// 移除URL的重试状态
    fn clear(&self, url: &str) {
        self.attempts.remove(url);
    }

    /// 判断URL是否仍有重试状态
    pub fn contains(&self, url: &str) -> bool {
        self.attempts.contains_key(url)
    }

    /// 当前有重试状态的URL数
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// 重试/退避策略
///
/// 将抓取失败分为可重试与终止两类，并以指数退避安排重试。
/// 每次失败（无论是否重试）都会累加错误计数；在一次或多次
/// 重试后转为终止时，额外累加重试耗尽计数。
pub struct RetryPolicy {
    config: BackoffConfig,
    state: RetryState,
    metrics: Arc<CrawlMetrics>,
}

impl RetryPolicy {
    /// 创建新的重试策略实例
    ///
    /// # 参数
    ///
    /// * `config` - 退避配置
    /// * `metrics` - 指标收集器
    pub fn new(config: BackoffConfig, metrics: Arc<CrawlMetrics>) -> Self {
        Self {
            config,
            state: RetryState::default(),
            metrics,
        }
    }

    /// 评估一次抓取失败
    ///
    /// 仅当错误种类可重试且尝试次数未达上限时返回Retry；
    /// 否则返回Terminal并清除该URL的重试状态。
    ///
    /// # 参数
    ///
    /// * `url` - 失败的URL
    /// * `kind` - 错误种类
    ///
    /// # 返回值
    ///
    /// 重试决策
    pub fn evaluate(&self, url: &str, kind: FetchErrorKind) -> Decision {
        self.metrics.record_error();
        metrics::counter!("crawl_fetch_failures_total", "kind" => kind.to_string()).increment(1);

        let attempts = self.state.count(url);
        if kind.is_retryable() && attempts < self.config.max_retries {
            self.state.increment(url);
            Decision::Retry(self.config.calculate_backoff(attempts))
        } else {
            if attempts > 0 {
                self.metrics.record_retry_exhausted();
            }
            self.state.clear(url);
            Decision::Terminal
        }
    }

    /// 记录抓取成功，清除该URL的重试状态
    pub fn on_success(&self, url: &str) {
        self.state.clear(url);
    }

    /// 查询URL当前已失败的尝试次数
    pub fn attempts(&self, url: &str) -> u32 {
        self.state.count(url)
    }

    /// 重试状态视图，供测试检查内存边界
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// 最大重试次数
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}
