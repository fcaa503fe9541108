// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::Regex;
use scraper::Selector;
use tracing::debug;

use crate::domain::models::content::{
    ClassificationResult, ClassificationSignals, ParsedDocument, UrlPatternMatch,
};
use crate::domain::models::source::ClassifierConfig;
use crate::domain::models::task::DomainError;

/// 内容分类器
///
/// 判定已解析文档是文章页还是其他内容，用于决定是否进入
/// 字段提取。判定按优先级顺序进行，先命中者生效：
///
/// 1. og:type元数据等于"article"，判为文章；
/// 2. itemtype值包含"article"（不区分大小写），判为文章；
/// 3. URL路径命中列表页模式，立即判为非文章——列表页模式
///    优先于文章页模式；
/// 4. URL路径命中文章页模式，且存在佐证性DOM标记（可配置
///    关闭佐证要求），判为文章；
/// 5. 默认判为非文章。
///
/// 元数据是最可靠的信号；列表页模式是强否定证据，必须
/// 压过较弱的URL正向证据；DOM标记用于避免通用URL形状
/// 造成的误报。
pub struct ContentClassifier {
    listing_patterns: Vec<Regex>,
    article_patterns: Vec<Regex>,
    require_marker: bool,
    marker_selectors: Vec<Selector>,
    meta_type_selector: Selector,
    itemtype_selector: Selector,
}

impl ContentClassifier {
    /// 根据策略配置构建分类器
    ///
    /// 非法的模式正则或标记选择器在此处快速失败。
    ///
    /// # 参数
    ///
    /// * `config` - 分类器策略配置
    ///
    /// # 返回值
    ///
    /// * `Ok(ContentClassifier)` - 构建成功
    /// * `Err(DomainError)` - 配置无效
    pub fn new(config: &ClassifierConfig) -> Result<Self, DomainError> {
        let listing_patterns = compile_patterns(&config.listing_patterns)?;
        let article_patterns = compile_patterns(&config.article_patterns)?;

        let mut marker_selectors = Vec::with_capacity(config.marker_selectors.len());
        for raw in &config.marker_selectors {
            let selector = Selector::parse(raw).map_err(|e| {
                DomainError::ValidationError(format!("invalid marker selector '{}': {}", raw, e))
            })?;
            marker_selectors.push(selector);
        }

        let meta_type_selector = Selector::parse(r#"meta[property="og:type"]"#)
            .map_err(|e| DomainError::ValidationError(e.to_string()))?;
        let itemtype_selector = Selector::parse("[itemtype]")
            .map_err(|e| DomainError::ValidationError(e.to_string()))?;

        Ok(Self {
            listing_patterns,
            article_patterns,
            require_marker: config.require_marker,
            marker_selectors,
            meta_type_selector,
            itemtype_selector,
        })
    }

    /// 对文档进行分类
    ///
    /// 结果在文档上缓存，同一文档只计算一次。
    pub fn classify<'a>(&self, doc: &'a ParsedDocument) -> &'a ClassificationResult {
        doc.classify_once(|| self.compute(doc))
    }

    fn compute(&self, doc: &ParsedDocument) -> ClassificationResult {
        let mut signals = ClassificationSignals {
            meta_type: self.meta_type(doc),
            schema_type: self.schema_type(doc),
            url_pattern: None,
            dom_marker: false,
        };

        // 1. 显式内容类型元数据
        if let Some(meta_type) = &signals.meta_type {
            if meta_type.eq_ignore_ascii_case("article") {
                return ClassificationResult {
                    is_article: true,
                    signals,
                };
            }
        }

        // 2. schema类型包含article
        if let Some(schema_type) = &signals.schema_type {
            if schema_type.to_ascii_lowercase().contains("article") {
                return ClassificationResult {
                    is_article: true,
                    signals,
                };
            }
        }

        let path = doc.url().path();

        // 3. 列表页模式优先，立即否定
        if self.listing_patterns.iter().any(|re| re.is_match(path)) {
            signals.url_pattern = Some(UrlPatternMatch::Listing);
            return ClassificationResult {
                is_article: false,
                signals,
            };
        }

        // 4. 文章页模式需要DOM标记佐证，单独命中不足以判定
        if self.article_patterns.iter().any(|re| re.is_match(path)) {
            signals.url_pattern = Some(UrlPatternMatch::Article);
            signals.dom_marker = self
                .marker_selectors
                .iter()
                .any(|sel| doc.html().select(sel).next().is_some());

            let is_article = !self.require_marker || signals.dom_marker;
            debug!(
                path = path,
                dom_marker = signals.dom_marker,
                is_article = is_article,
                "URL pattern matched article shape"
            );
            return ClassificationResult {
                is_article,
                signals,
            };
        }

        // 5. 默认非文章
        ClassificationResult {
            is_article: false,
            signals,
        }
    }

    fn meta_type(&self, doc: &ParsedDocument) -> Option<String> {
        doc.html()
            .select(&self.meta_type_selector)
            .filter_map(|el| el.value().attr("content"))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    fn schema_type(&self, doc: &ParsedDocument) -> Option<String> {
        doc.html()
            .select(&self.itemtype_selector)
            .filter_map(|el| el.value().attr("itemtype"))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, DomainError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                DomainError::ValidationError(format!("invalid URL pattern '{}': {}", p, e))
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
