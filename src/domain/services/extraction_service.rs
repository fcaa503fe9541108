// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::models::content::{ExtractError, ExtractedContent, ParsedDocument, SelectorMap};
use crate::domain::services::metrics_collector::CrawlMetrics;

/// 发布时间候选格式，按顺序尝试，首个解析成功者生效
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%a, %d %b %Y %H:%M:%S GMT",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// 字段提取器
///
/// 根据选择器映射从已解析文档中产出结构化内容记录。
/// 未命中的选择器产生空值而非错误；title与body是必填
/// 输出，提取后为空则整次提取失败，不发出任何记录。
pub struct FieldExtractor {
    metrics: Arc<CrawlMetrics>,
}

impl FieldExtractor {
    /// 创建新的字段提取器
    pub fn new(metrics: Arc<CrawlMetrics>) -> Self {
        Self { metrics }
    }

    /// 执行字段提取
    ///
    /// # 参数
    ///
    /// * `doc` - 已解析文档
    /// * `selectors` - 选择器映射
    /// * `source` - 来源名称
    ///
    /// # 返回值
    ///
    /// * `Ok(ExtractedContent)` - 提取出的内容记录
    /// * `Err(ExtractError)` - 必填字段为空或选择器无效
    pub fn extract(
        &self,
        doc: &ParsedDocument,
        selectors: &SelectorMap,
        source: &str,
    ) -> Result<ExtractedContent, ExtractError> {
        let title = self.text_joined(doc, Some(&selectors.title))?;
        if title.is_empty() {
            return Err(ExtractError::MissingRequiredField("title"));
        }

        let body = self.text_joined(doc, Some(&selectors.body))?;
        if body.is_empty() {
            return Err(ExtractError::MissingRequiredField("body"));
        }

        let author = self.text_joined(doc, selectors.author.as_deref())?;
        let url = self.canonical_url(doc, selectors)?;
        let published_at = self.published_at(doc, selectors.published_at.as_deref())?;
        let categories = self.tokens(doc, selectors.categories.as_deref())?;
        let tags = self.tokens(doc, selectors.tags.as_deref())?;
        let metadata = self.metadata(doc);

        Ok(ExtractedContent {
            source: source.to_string(),
            title,
            body,
            url,
            published_at,
            author,
            categories,
            tags,
            metadata,
        })
    }

    /// 提取全部匹配元素的文本并以换行拼接
    fn text_joined(
        &self,
        doc: &ParsedDocument,
        selector: Option<&str>,
    ) -> Result<String, ExtractError> {
        let Some(selector) = non_empty(selector) else {
            return Ok(String::new());
        };
        let selector = parse_selector(selector)?;

        let mut parts = Vec::new();
        for element in doc.html().select(&selector) {
            self.metrics.record_elements_processed(1);
            let text = element_text(&element);
            if !text.is_empty() {
                parts.push(text);
            }
        }

        Ok(parts.join("\n"))
    }

    /// 提取全部匹配元素的文本并按空白切分为词条
    ///
    /// 保留文档顺序，允许重复。
    fn tokens(
        &self,
        doc: &ParsedDocument,
        selector: Option<&str>,
    ) -> Result<Vec<String>, ExtractError> {
        let Some(selector) = non_empty(selector) else {
            return Ok(Vec::new());
        };
        let selector = parse_selector(selector)?;

        let mut values = Vec::new();
        for element in doc.html().select(&selector) {
            self.metrics.record_elements_processed(1);
            for token in element.text().flat_map(str::split_whitespace) {
                values.push(token.to_string());
            }
        }

        Ok(values)
    }

    /// 解析规范URL
    ///
    /// 优先canonical链接选择器，缺失时回退到og:url元数据，
    /// 二者皆无时留空。
    fn canonical_url(
        &self,
        doc: &ParsedDocument,
        selectors: &SelectorMap,
    ) -> Result<String, ExtractError> {
        let canonical = selectors
            .canonical
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(r#"link[rel="canonical"]"#);
        let selector = parse_selector(canonical)?;
        if let Some(element) = doc.html().select(&selector).next() {
            self.metrics.record_elements_processed(1);
            if let Some(href) = element.value().attr("href") {
                return Ok(href.trim().to_string());
            }
        }

        let og_url = parse_selector(r#"meta[property="og:url"]"#)?;
        if let Some(element) = doc.html().select(&og_url).next() {
            self.metrics.record_elements_processed(1);
            if let Some(content) = element.value().attr("content") {
                return Ok(content.trim().to_string());
            }
        }

        Ok(String::new())
    }

    /// 解析发布时间
    ///
    /// 取首个匹配元素的datetime属性（缺失时取文本），依次
    /// 尝试固定顺序的格式列表；全部失败时字段留空并累加
    /// 错误计数，提取本身不失败。
    fn published_at(
        &self,
        doc: &ParsedDocument,
        selector: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>, ExtractError> {
        let Some(selector) = non_empty(selector) else {
            return Ok(None);
        };
        let selector = parse_selector(selector)?;

        let Some(element) = doc.html().select(&selector).next() else {
            return Ok(None);
        };
        self.metrics.record_elements_processed(1);

        let raw = element
            .value()
            .attr("datetime")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| element_text(&element));
        if raw.is_empty() {
            return Ok(None);
        }

        match parse_timestamp(&raw) {
            Some(ts) => Ok(Some(ts)),
            None => {
                debug!(value = %raw, "Timestamp did not match any known format");
                self.metrics.record_error();
                Ok(None)
            }
        }
    }

    /// 收集全部meta标签的键值对
    ///
    /// 键取name属性，无name时取property；同键冲突时文档
    /// 顺序靠后者生效。
    fn metadata(&self, doc: &ParsedDocument) -> HashMap<String, String> {
        static SELECTOR: once_cell::sync::Lazy<Selector> =
            once_cell::sync::Lazy::new(|| Selector::parse("meta").expect("static selector"));

        let mut map = HashMap::new();
        for element in doc.html().select(&SELECTOR) {
            let key = element
                .value()
                .attr("name")
                .or_else(|| element.value().attr("property"));
            let (Some(key), Some(content)) = (key, element.value().attr("content")) else {
                continue;
            };
            self.metrics.record_elements_processed(1);
            map.insert(key.to_string(), content.to_string());
        }
        map
    }
}

/// 按固定顺序尝试解析时间戳
///
/// 顺序：RFC3339、RFC1123、RFC1123Z、无时区ISO、
/// `YYYY-MM-DD HH:MM:SS`。无时区格式按UTC处理。
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMATS[0]) {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in &TIMESTAMP_FORMATS[1..] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    None
}

fn non_empty(selector: Option<&str>) -> Option<&str> {
    selector.filter(|s| !s.trim().is_empty())
}

fn parse_selector(raw: &str) -> Result<Selector, ExtractError> {
    Selector::parse(raw).map_err(|e| ExtractError::InvalidSelector(format!("{}: {}", raw, e)))
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
