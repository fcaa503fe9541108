// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::{article_page, engine_for, listing_page, mount_page, source_for};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_parallelism_bound_limits_in_flight_fetches() {
    let server = MockServer::start().await;

    let routes: Vec<String> = (0..6).map(|i| format!("/news/{}", i)).collect();
    let refs: Vec<&str> = routes.iter().map(String::as_str).collect();
    mount_page(&server, "/", &listing_page(&refs)).await;

    for route in &routes {
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_page("Slow Page", ""))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;
    }

    let (engine, sink, _) = engine_for(source_for(&server));
    let started = Instant::now();
    engine.start(&server.uri()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(sink.len(), 6);
    // 并发上限为2：6个100ms的页面至少需要3个批次
    assert!(
        elapsed >= Duration::from_millis(280),
        "6 slow pages finished in {:?}, parallelism bound was exceeded",
        elapsed
    );
}

#[tokio::test]
async fn test_rate_limit_spaces_dispatches() {
    let server = MockServer::start().await;

    mount_page(&server, "/", &listing_page(&["/news/1", "/news/2", "/news/3"])).await;
    for route in ["/news/1", "/news/2", "/news/3"] {
        mount_page(&server, route, &article_page("Paced", "")).await;
    }

    let mut config = source_for(&server);
    for rule in &mut config.domain_rules {
        rule.base_delay = Duration::from_millis(50);
    }

    let (engine, sink, _) = engine_for(config);
    let started = Instant::now();
    engine.start(&server.uri()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(sink.len(), 3);
    // 4次派发，相邻至少间隔50ms
    assert!(
        elapsed >= Duration::from_millis(150),
        "dispatches were not spaced: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_single_worker_source_is_sequential() {
    let server = MockServer::start().await;

    mount_page(&server, "/", &listing_page(&["/news/1", "/news/2"])).await;
    for route in ["/news/1", "/news/2"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_page("Sequential", ""))
                    .set_delay(Duration::from_millis(80)),
            )
            .mount(&server)
            .await;
    }

    let mut config = source_for(&server);
    config.parallelism = 1;
    for rule in &mut config.domain_rules {
        rule.parallelism = 1;
    }

    let (engine, sink, _) = engine_for(config);
    let started = Instant::now();
    engine.start(&server.uri()).await.unwrap();

    assert_eq!(sink.len(), 2);
    assert!(started.elapsed() >= Duration::from_millis(160));
}
