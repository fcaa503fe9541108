// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 爬取执行模块
///
/// 实现遍历控制、速率/并发调速和重试退避
pub mod controller;
pub mod governor;
pub mod retry;

pub use controller::{CrawlEngine, CrawlError, SubmitOutcome};
pub use governor::{RateGovernor, SlotPermit};
pub use retry::{BackoffConfig, Decision, RetryPolicy, RetryState};
