// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use once_cell::unsync::OnceCell;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// 提取层错误类型
#[derive(Error, Debug)]
pub enum ExtractError {
    /// 无效文档，内容为空或不是可解析的HTML
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// 缺少必填字段，title或body提取结果为空
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// 无效选择器
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// 已解析文档
///
/// 对一次抓取响应的DOM查询句柄，附带来源URL和响应状态码。
/// 生命周期限定在单次抓取尝试内：分类与提取完成后即销毁，
/// 不跨请求缓存。分类结果在首次计算后缓存于文档上，同一
/// 文档不会重复分类。
#[derive(Debug)]
pub struct ParsedDocument {
    html: Html,
    url: Url,
    status_code: u16,
    classification: OnceCell<ClassificationResult>,
}

impl ParsedDocument {
    /// 解析抓取到的HTML内容
    ///
    /// 空内容、不含`<`字符的内容视为无效文档，在任何字段
    /// 提取开始之前快速失败。
    ///
    /// # 参数
    ///
    /// * `body` - 响应正文
    /// * `url` - 文档URL（重定向后的最终URL）
    /// * `status_code` - HTTP状态码
    ///
    /// # 返回值
    ///
    /// * `Ok(ParsedDocument)` - 解析成功的文档
    /// * `Err(ExtractError)` - 内容无效
    pub fn parse(body: &str, url: Url, status_code: u16) -> Result<Self, ExtractError> {
        if body.trim().is_empty() {
            return Err(ExtractError::InvalidDocument("empty content".to_string()));
        }
        if !body.contains('<') {
            return Err(ExtractError::InvalidDocument(
                "content does not look like HTML".to_string(),
            ));
        }

        Ok(Self {
            html: Html::parse_document(body),
            url,
            status_code,
            classification: OnceCell::new(),
        })
    }

    /// 文档URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP状态码
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// DOM查询句柄
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// 获取缓存的分类结果，未分类时计算一次并缓存
    ///
    /// 同一文档的分类只计算一次，后续调用返回缓存值。
    pub fn classify_once<F>(&self, compute: F) -> &ClassificationResult
    where
        F: FnOnce() -> ClassificationResult,
    {
        self.classification.get_or_init(compute)
    }

    /// 已缓存的分类结果
    pub fn classification(&self) -> Option<&ClassificationResult> {
        self.classification.get()
    }

    /// 收集文档中的所有超链接
    ///
    /// 返回原始href值，不做解析；相对链接的解析由调用方
    /// 基于文档URL完成。
    pub fn links(&self) -> Vec<String> {
        static SELECTOR: once_cell::sync::Lazy<Selector> =
            once_cell::sync::Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

        self.html
            .select(&SELECTOR)
            .filter_map(|el| el.value().attr("href"))
            .map(|href| href.to_string())
            .collect()
    }
}

/// 内容分类结果
///
/// 对一个已解析文档的文章/非文章二元判定，以及做出该判定
/// 时观察到的各项信号。每个文档只派生一次，不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// 是否为文章页面
    pub is_article: bool,
    /// 分类信号
    pub signals: ClassificationSignals,
}

/// 分类信号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSignals {
    /// 内容类型元数据字段（og:type）的值
    pub meta_type: Option<String>,
    /// schema类型（itemtype属性）的值
    pub schema_type: Option<String>,
    /// URL路径模式匹配结果
    pub url_pattern: Option<UrlPatternMatch>,
    /// 是否存在佐证性DOM标记
    pub dom_marker: bool,
}

/// URL路径模式匹配类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPatternMatch {
    /// 命中列表页模式（分类、标签、搜索、归档、feed等）
    Listing,
    /// 命中文章页模式
    Article,
}

/// 提取出的结构化内容
///
/// 由字段提取器从一个已解析文档和一份选择器映射产出；
/// 发送给下游存储后所有权随之转移，核心不再持有引用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// 来源名称
    pub source: String,
    /// 标题，必填
    pub title: String,
    /// 正文，必填
    pub body: String,
    /// 规范URL，canonical链接或og:url，二者皆无时为空
    pub url: String,
    /// 发布时间，所有格式均解析失败时为空
    pub published_at: Option<DateTime<Utc>>,
    /// 作者
    pub author: String,
    /// 分类列表，保留文档顺序，允许重复
    pub categories: Vec<String>,
    /// 标签列表，保留文档顺序，允许重复
    pub tags: Vec<String>,
    /// 元数据键值对，来自全部meta标签
    pub metadata: HashMap<String, String>,
}

/// 选择器映射
///
/// 从逻辑字段名到选择器字符串的映射，由来源配置提供，
/// 对核心只读。title与body为必填选择器。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorMap {
    /// 标题选择器
    pub title: String,
    /// 正文选择器
    pub body: String,
    /// 作者选择器
    #[serde(default)]
    pub author: Option<String>,
    /// 发布时间选择器
    #[serde(default)]
    pub published_at: Option<String>,
    /// 分类选择器
    #[serde(default)]
    pub categories: Option<String>,
    /// 标签选择器
    #[serde(default)]
    pub tags: Option<String>,
    /// 规范链接选择器，默认`link[rel="canonical"]`
    #[serde(default)]
    pub canonical: Option<String>,
}

impl SelectorMap {
    /// 校验选择器映射
    ///
    /// title与body选择器必须非空，且全部选择器必须可解析。
    /// 在构造期调用，避免运行时逐任务失败。
    pub fn validate(&self) -> Result<(), super::task::DomainError> {
        use super::task::DomainError;

        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "selector for required field 'title' is empty".to_string(),
            ));
        }
        if self.body.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "selector for required field 'body' is empty".to_string(),
            ));
        }

        let configured = [
            Some(self.title.as_str()),
            Some(self.body.as_str()),
            self.author.as_deref(),
            self.published_at.as_deref(),
            self.categories.as_deref(),
            self.tags.as_deref(),
            self.canonical.as_deref(),
        ];
        for selector in configured.into_iter().flatten() {
            if selector.trim().is_empty() {
                continue;
            }
            Selector::parse(selector).map_err(|e| {
                DomainError::ValidationError(format!("invalid selector '{}': {}", selector, e))
            })?;
        }

        Ok(())
    }
}
