// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::{article_page, engine_for, source_for};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_server_errors_retried_until_success() {
    let server = MockServer::start().await;

    // 前两次503，之后200
    Mock::given(method("GET"))
        .and(path("/news/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_page("Recovered", "")))
        .mount(&server)
        .await;

    let (engine, sink, metrics) = engine_for(source_for(&server));
    engine
        .start(&format!("{}/news/1", server.uri()))
        .await
        .unwrap();

    assert_eq!(sink.len(), 1);
    assert_eq!(sink.records()[0].title, "Recovered");

    let snap = metrics.snapshot();
    assert_eq!(snap.processed_count, 1);
    // 两次5xx失败均计入错误
    assert_eq!(snap.error_count, 2);
    assert_eq!(snap.retry_exhausted_count, 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/news/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (engine, sink, metrics) = engine_for(source_for(&server));
    engine
        .start(&format!("{}/news/1", server.uri()))
        .await
        .unwrap();

    assert!(sink.is_empty());

    // max_retries=3 → 不多于4次抓取尝试
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);

    let snap = metrics.snapshot();
    assert_eq!(snap.error_count, 4);
    assert_eq!(snap.retry_exhausted_count, 1);
}

#[tokio::test]
async fn test_client_error_is_terminal_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, sink, metrics) = engine_for(source_for(&server));
    engine
        .start(&format!("{}/gone", server.uri()))
        .await
        .unwrap();

    assert!(sink.is_empty());
    let snap = metrics.snapshot();
    assert_eq!(snap.error_count, 1);
    assert_eq!(snap.retry_exhausted_count, 0);
}

#[tokio::test]
async fn test_crawl_continues_after_individual_failures() {
    let server = MockServer::start().await;

    crate::helpers::mount_page(
        &server,
        "/",
        &crate::helpers::listing_page(&["/news/ok", "/news/bad"]),
    )
    .await;
    crate::helpers::mount_page(&server, "/news/ok", &article_page("Fine", "")).await;
    Mock::given(method("GET"))
        .and(path("/news/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (engine, sink, metrics) = engine_for(source_for(&server));
    engine.start(&server.uri()).await.unwrap();

    // 单个URL的失败不影响整体会话
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.records()[0].title, "Fine");
    assert_eq!(metrics.snapshot().processed_count, 1);
    assert!(metrics.snapshot().error_count >= 4);
}
