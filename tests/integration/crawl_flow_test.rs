// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::{article_page, engine_for, listing_page, mount_page, source_for};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_end_to_end_crawl_extracts_articles() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        &listing_page(&["/news/1", "/news/2", "/category/world"]),
    )
    .await;
    mount_page(&server, "/news/1", &article_page("First Article", "")).await;
    mount_page(&server, "/news/2", &article_page("Second Article", "")).await;
    // 列表页本身不发出记录，但其链接被跟进
    mount_page(&server, "/category/world", &listing_page(&["/news/3"])).await;
    mount_page(&server, "/news/3", &article_page("Third Article", "")).await;

    let (engine, sink, metrics) = engine_for(source_for(&server));
    let snapshot = engine.start(&server.uri()).await.unwrap();

    let mut titles: Vec<String> = sink.records().iter().map(|r| r.title.clone()).collect();
    titles.sort();
    assert_eq!(titles, vec!["First Article", "Second Article", "Third Article"]);

    // 指标一致性：N次成功提取
    assert_eq!(snapshot.processed_count, 3);
    assert_eq!(metrics.snapshot().processed_count, 3);
    assert!(snapshot.last_processed_at.is_some());
    assert!(snapshot.elements_processed > 0);

    let record = sink
        .records()
        .into_iter()
        .find(|r| r.title == "First Article")
        .unwrap();
    assert_eq!(record.source, "test-source");
    assert_eq!(record.author, "Test Author");
    assert!(record.published_at.is_some());
    assert!(record.body.contains("First Article"));
}

#[tokio::test]
async fn test_same_url_fetched_exactly_once() {
    let server = MockServer::start().await;

    // 三个入口都指向同一篇文章的不同写法
    mount_page(
        &server,
        "/",
        &listing_page(&["/news/1", "/news/1/", "/news/1#comments"]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/news/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(article_page("Single", "")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (engine, sink, _) = engine_for(source_for(&server));
    engine.start(&server.uri()).await.unwrap();

    assert_eq!(sink.len(), 1);
    // expect(1) 由MockServer在drop时校验
}

#[tokio::test]
async fn test_depth_bound_enforced() {
    let server = MockServer::start().await;

    mount_page(&server, "/", &listing_page(&["/news/1"])).await;
    mount_page(
        &server,
        "/news/1",
        &article_page("Depth One", r#"<a href="/news/2">deeper</a>"#),
    )
    .await;
    mount_page(
        &server,
        "/news/2",
        &article_page("Depth Two", r#"<a href="/news/3">too deep</a>"#),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/news/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_page("Depth Three", "")))
        .expect(0)
        .mount(&server)
        .await;

    let (engine, sink, _) = engine_for(source_for(&server));
    engine.start(&server.uri()).await.unwrap();

    let titles: Vec<String> = sink.records().iter().map(|r| r.title.clone()).collect();
    assert!(titles.contains(&"Depth One".to_string()));
    assert!(titles.contains(&"Depth Two".to_string()));
    assert!(!titles.contains(&"Depth Three".to_string()));
}

#[tokio::test]
async fn test_offsite_links_never_fetched() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        &listing_page(&["/news/1", "https://malicious.invalid/news/1"]),
    )
    .await;
    mount_page(&server, "/news/1", &article_page("Onsite", "")).await;

    let (engine, sink, metrics) = engine_for(source_for(&server));
    engine.start(&server.uri()).await.unwrap();

    assert_eq!(sink.len(), 1);
    // 站外URL被过滤在提交阶段，从未进入抓取（否则必然产生错误计数）
    assert_eq!(metrics.snapshot().error_count, 0);
    // 只有本站的两个页面被请求
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_listing_page_with_article_path_not_emitted() {
    let server = MockServer::start().await;

    // URL同时命中列表页和文章页模式：列表页优先，不提取
    mount_page(
        &server,
        "/category/news/article/42",
        &article_page("Should Not Emit", ""),
    )
    .await;

    let mut config = source_for(&server);
    config.max_depth = 0;
    let (engine, sink, _) = engine_for(config);
    engine
        .start(&format!("{}/category/news/article/42", server.uri()))
        .await
        .unwrap();

    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_graceful_stop_halts_admission() {
    let server = MockServer::start().await;

    let many: Vec<String> = (0..64).map(|i| format!("/news/{}", i)).collect();
    let refs: Vec<&str> = many.iter().map(String::as_str).collect();
    mount_page(&server, "/", &listing_page(&refs)).await;
    for route in &many {
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_page("Slow", ""))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .mount(&server)
            .await;
    }

    let (engine, sink, _) = engine_for(source_for(&server));
    let runner = {
        let engine = engine.clone();
        let uri = server.uri();
        tokio::spawn(async move { engine.start(&uri).await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    engine.stop();
    runner.await.unwrap().unwrap();

    // 取消后不再处理剩余任务
    assert!(sink.len() < 64, "stop did not halt the crawl");
}
