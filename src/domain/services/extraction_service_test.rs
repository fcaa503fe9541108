// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::*;
use crate::domain::models::content::SelectorMap;
use chrono::TimeZone;
use url::Url;

fn selectors() -> SelectorMap {
    SelectorMap {
        title: "h1.title".to_string(),
        body: "div.content".to_string(),
        author: Some("span.author".to_string()),
        published_at: Some("time".to_string()),
        categories: Some("a.category".to_string()),
        tags: Some("a.tag".to_string()),
        canonical: None,
    }
}

fn extractor() -> (FieldExtractor, Arc<CrawlMetrics>) {
    let metrics = Arc::new(CrawlMetrics::new());
    (FieldExtractor::new(metrics.clone()), metrics)
}

fn doc(html: &str) -> ParsedDocument {
    ParsedDocument::parse(html, Url::parse("https://example.com/news/1").unwrap(), 200).unwrap()
}

#[test]
fn test_extract_full_document() {
    let html = r#"
        <html>
            <head>
                <title>ignored</title>
                <link rel="canonical" href="https://example.com/news/1">
                <meta property="og:url" content="https://example.com/og/1">
                <meta name="description" content="A test page">
                <meta property="og:type" content="article">
            </head>
            <body>
                <h1 class="title">Breaking News</h1>
                <span class="author">Jane Doe</span>
                <time datetime="2024-03-20T10:00:00Z">March 20</time>
                <div class="content"><p>First paragraph.</p><p>Second paragraph.</p></div>
                <a class="category" href="/category/world">World</a>
                <a class="tag" href="/tag/breaking">breaking</a>
                <a class="tag" href="/tag/news">news today</a>
            </body>
        </html>
    "#;

    let (extractor, _) = extractor();
    let content = extractor.extract(&doc(html), &selectors(), "example").unwrap();

    assert_eq!(content.source, "example");
    assert_eq!(content.title, "Breaking News");
    assert_eq!(content.body, "First paragraph. Second paragraph.");
    assert_eq!(content.author, "Jane Doe");
    assert_eq!(content.url, "https://example.com/news/1");
    assert_eq!(
        content.published_at,
        Some(chrono::Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap())
    );
    assert_eq!(content.categories, vec!["World"]);
    assert_eq!(content.tags, vec!["breaking", "news", "today"]);
    assert_eq!(
        content.metadata.get("description").map(String::as_str),
        Some("A test page")
    );
    assert_eq!(
        content.metadata.get("og:type").map(String::as_str),
        Some("article")
    );
}

#[test]
fn test_missing_title_is_an_error() {
    let html = r#"<html><body><div class="content">Body text</div></body></html>"#;
    let (extractor, _) = extractor();
    let err = extractor
        .extract(&doc(html), &selectors(), "example")
        .unwrap_err();
    assert_eq!(err.to_string(), "missing required field: title");
}

#[test]
fn test_missing_body_is_an_error() {
    let html = r#"<html><body><h1 class="title">Title</h1></body></html>"#;
    let (extractor, _) = extractor();
    let err = extractor
        .extract(&doc(html), &selectors(), "example")
        .unwrap_err();
    assert_eq!(err.to_string(), "missing required field: body");
}

#[test]
fn test_optional_fields_default_to_empty() {
    let html = r#"
        <html><body>
            <h1 class="title">Title</h1>
            <div class="content">Body</div>
        </body></html>
    "#;
    let (extractor, _) = extractor();
    let content = extractor.extract(&doc(html), &selectors(), "example").unwrap();

    assert!(content.author.is_empty());
    assert!(content.url.is_empty());
    assert!(content.published_at.is_none());
    assert!(content.categories.is_empty());
    assert!(content.tags.is_empty());
}

#[test]
fn test_canonical_falls_back_to_og_url() {
    let html = r#"
        <html>
            <head><meta property="og:url" content="https://example.com/og/1"></head>
            <body><h1 class="title">Title</h1><div class="content">Body</div></body>
        </html>
    "#;
    let (extractor, _) = extractor();
    let content = extractor.extract(&doc(html), &selectors(), "example").unwrap();
    assert_eq!(content.url, "https://example.com/og/1");
}

#[test]
fn test_timestamp_custom_fallback_format() {
    // 无时区的自定义格式按UTC解析出同一时刻
    let html = r#"
        <html><body>
            <h1 class="title">Title</h1>
            <div class="content">Body</div>
            <time>2024-03-20 10:00:00</time>
        </body></html>
    "#;
    let (extractor, _) = extractor();
    let content = extractor.extract(&doc(html), &selectors(), "example").unwrap();
    assert_eq!(
        content.published_at,
        Some(chrono::Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap())
    );
}

#[test]
fn test_unparsable_timestamp_counts_error_but_extraction_succeeds() {
    let html = r#"
        <html><body>
            <h1 class="title">Title</h1>
            <div class="content">Body</div>
            <time>yesterday afternoon</time>
        </body></html>
    "#;
    let (extractor, metrics) = extractor();
    let content = extractor.extract(&doc(html), &selectors(), "example").unwrap();
    assert!(content.published_at.is_none());
    assert_eq!(metrics.snapshot().error_count, 1);
}

#[test]
fn test_elements_processed_metric_counts_matches() {
    let html = r##"
        <html><body>
            <h1 class="title">Title</h1>
            <div class="content">Body</div>
            <a class="tag" href="#">one</a>
            <a class="tag" href="#">two</a>
        </body></html>
    "##;
    let (extractor, metrics) = extractor();
    extractor.extract(&doc(html), &selectors(), "example").unwrap();
    // title + body + 两个tag元素
    assert!(metrics.snapshot().elements_processed >= 4);
}

#[test]
fn test_metadata_collision_last_wins() {
    let html = r#"
        <html>
            <head>
                <meta name="author" content="first">
                <meta name="author" content="second">
            </head>
            <body><h1 class="title">Title</h1><div class="content">Body</div></body>
        </html>
    "#;
    let (extractor, _) = extractor();
    let content = extractor.extract(&doc(html), &selectors(), "example").unwrap();
    assert_eq!(
        content.metadata.get("author").map(String::as_str),
        Some("second")
    );
}

#[test]
fn test_parse_timestamp_format_ladder() {
    let expected = chrono::Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap();

    assert_eq!(parse_timestamp("2024-03-20T10:00:00Z"), Some(expected));
    assert_eq!(
        parse_timestamp("Wed, 20 Mar 2024 10:00:00 GMT"),
        Some(expected)
    );
    assert_eq!(
        parse_timestamp("Wed, 20 Mar 2024 10:00:00 +0000"),
        Some(expected)
    );
    assert_eq!(parse_timestamp("2024-03-20T10:00:00"), Some(expected));
    assert_eq!(parse_timestamp("2024-03-20 10:00:00"), Some(expected));
    assert_eq!(parse_timestamp("not a date"), None);
}
