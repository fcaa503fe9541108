// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::domain::models::source::DomainRule;

/// 调速器错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GovernorError {
    /// 爬取已取消，等待被中断
    #[error("crawl cancelled while waiting for a slot")]
    Cancelled,
}

/// 并发槽位许可
///
/// 释放语义由Drop承担：许可销毁时对应规则的并发槽位即被
/// 归还，保证恰好释放一次。
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

/// 规则运行时状态
struct RuleState {
    semaphore: Arc<Semaphore>,
    /// 下一次允许派发的时刻，兼作上次派发的记录
    next_dispatch: Mutex<Option<Instant>>,
}

/// 速率与并发调速器
///
/// 按域名glob规则约束在途抓取数，并在同一规则的两次派发
/// 之间施加最小间隔加随机抖动。首个匹配的规则生效；末尾
/// 的`*`兜底规则由配置解析保证存在。
pub struct RateGovernor {
    rules: Vec<(DomainRule, RuleState)>,
    cancel_rx: watch::Receiver<bool>,
}

impl RateGovernor {
    /// 创建新的调速器实例
    ///
    /// # 参数
    ///
    /// * `rules` - 域名速率规则，不能为空
    /// * `cancel_rx` - 取消信号接收端
    pub fn new(rules: Vec<DomainRule>, cancel_rx: watch::Receiver<bool>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let state = RuleState {
                    semaphore: Arc::new(Semaphore::new(rule.parallelism)),
                    next_dispatch: Mutex::new(None),
                };
                (rule, state)
            })
            .collect();

        Self { rules, cancel_rx }
    }

    /// 获取一个抓取槽位
    ///
    /// 阻塞（协作式）直到匹配规则的在途抓取数低于其并发
    /// 上限，随后若该规则配置了派发间隔，则再等待自上次
    /// 派发起的`[base_delay, base_delay + random_jitter)`。
    /// 取消信号触发时立即返回错误。
    ///
    /// # 参数
    ///
    /// * `host` - 目标主机名
    ///
    /// # 返回值
    ///
    /// * `Ok(SlotPermit)` - 许可，销毁时释放槽位
    /// * `Err(GovernorError)` - 等待期间爬取被取消
    pub async fn acquire(&self, host: &str) -> Result<SlotPermit, GovernorError> {
        let mut cancel_rx = self.cancel_rx.clone();
        if *cancel_rx.borrow() {
            return Err(GovernorError::Cancelled);
        }

        let (rule, state) = self.match_rule(host);

        let permit = tokio::select! {
            permit = state.semaphore.clone().acquire_owned() => {
                match permit {
                    Ok(p) => p,
                    Err(_) => return Err(GovernorError::Cancelled),
                }
            }
            _ = cancel_rx.changed() => return Err(GovernorError::Cancelled),
        };

        if !rule.base_delay.is_zero() || !rule.random_jitter.is_zero() {
            let target = self.reserve_dispatch(rule, state);
            let now = Instant::now();
            if target > now {
                tokio::select! {
                    _ = tokio::time::sleep_until(target) => {}
                    _ = cancel_rx.changed() => return Err(GovernorError::Cancelled),
                }
            }
        }

        Ok(SlotPermit { _permit: permit })
    }

    /// 为一次派发预约时刻
    ///
    /// 在锁内计算并推进该规则的派发时间线，使并发调用方
    /// 各自拿到彼此间隔不小于base_delay的派发时刻。
    fn reserve_dispatch(&self, rule: &DomainRule, state: &RuleState) -> Instant {
        let spacing = rule.base_delay + sample_jitter(rule.random_jitter);
        let now = Instant::now();

        let mut next = state.next_dispatch.lock();
        let target = match *next {
            Some(previous) => (previous + spacing).max(now),
            None => now,
        };
        *next = Some(target);
        target
    }

    /// 查找首个匹配主机的规则，无匹配时落到末尾兜底规则
    fn match_rule(&self, host: &str) -> (&DomainRule, &RuleState) {
        let host = host.to_ascii_lowercase();
        let found = self
            .rules
            .iter()
            .find(|(rule, _)| glob_match(&rule.pattern, &host))
            .or_else(|| self.rules.last());
        let (rule, state) = found.expect("governor requires at least one rule");
        (rule, state)
    }

    /// 指定主机所匹配规则的当前可用槽位数
    pub fn available_permits(&self, host: &str) -> usize {
        self.match_rule(host).1.semaphore.available_permits()
    }
}

fn sample_jitter(jitter: Duration) -> Duration {
    if jitter.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(rand::random_range(0.0..jitter.as_secs_f64()))
    }
}

/// 域名glob匹配
///
/// `*`匹配任意（可为空的）字符序列，其余字符逐一比较，
/// 不区分大小写由调用方保证。
pub fn glob_match(pattern: &str, input: &str) -> bool {
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    let input: Vec<char> = input.chars().collect();

    let (mut p, mut i) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while i < input.len() {
        if p < pattern.len() && (pattern[p] == input[i]) {
            p += 1;
            i += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, i));
            p += 1;
        } else if let Some((star_p, star_i)) = star {
            // 回溯：让上一个*多吞一个字符
            p = star_p + 1;
            i = star_i + 1;
            star = Some((star_p, star_i + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
