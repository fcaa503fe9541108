// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 定义爬取引擎的核心实体：任务与状态机、已解析文档、
/// 分类结果、提取内容以及来源配置。
pub mod content;
pub mod source;
pub mod task;

pub use content::{
    ClassificationResult, ClassificationSignals, ExtractError, ExtractedContent, ParsedDocument,
    SelectorMap, UrlPatternMatch,
};
pub use source::{ClassifierConfig, DomainRule, SourceConfig};
pub use task::{CrawlTask, DomainError, FetchAttempt, TaskState};
