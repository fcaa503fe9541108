// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含内容分类、字段提取和指标收集等核心业务服务
pub mod classifier;
pub mod extraction_service;
pub mod metrics_collector;

pub use classifier::ContentClassifier;
pub use extraction_service::FieldExtractor;
pub use metrics_collector::{CrawlMetrics, MetricsSnapshot};
