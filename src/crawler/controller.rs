// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::crawler::governor::{GovernorError, RateGovernor};
use crate::crawler::retry::{BackoffConfig, Decision, RetryPolicy};
use crate::domain::models::content::{ClassificationResult, ExtractError, ExtractedContent, ParsedDocument};
use crate::domain::models::source::SourceConfig;
use crate::domain::models::task::{CrawlTask, DomainError, FetchAttempt};
use crate::domain::repositories::content_sink::ContentSink;
use crate::domain::services::classifier::ContentClassifier;
use crate::domain::services::extraction_service::FieldExtractor;
use crate::domain::services::metrics_collector::{CrawlMetrics, MetricsSnapshot};
use crate::engines::traits::{FetchEngine, FetchErrorKind, FetchResponse};
use crate::utils::robots::RobotsChecker;
use crate::utils::url_utils;

/// 爬取引擎错误类型
#[derive(Error, Debug)]
pub enum CrawlError {
    /// 种子URL无效或被提交过滤拒绝
    #[error("invalid seed URL: {0}")]
    InvalidSeed(String),

    /// 领域错误
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// 任务提交结果
///
/// 被拒绝的提交是无操作而非错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 已入队
    Enqueued,
    /// 深度超出上限
    DepthExceeded,
    /// 主机不在允许域名内
    DomainFiltered,
    /// 本会话内已访问过（按规范化URL去重）
    Duplicate,
    /// 引擎已取消，不再接纳新任务
    Cancelled,
}

/// 页面同步处理阶段的产物
///
/// 文档句柄不跨越异步边界，分类、提取与链接收集在同一个
/// 同步阶段完成后文档即销毁。
struct StagedPage {
    classification: ClassificationResult,
    content: Option<Result<ExtractedContent, ExtractError>>,
    links: Vec<String>,
}

struct EngineInner<F, S> {
    source: SourceConfig,
    fetcher: Arc<F>,
    sink: Arc<S>,
    governor: RateGovernor,
    retry: RetryPolicy,
    classifier: ContentClassifier,
    extractor: FieldExtractor,
    metrics: Arc<CrawlMetrics>,
    robots: Option<RobotsChecker>,
    /// 本会话已访问的规范化URL集合
    visited: DashMap<String, ()>,
    /// 待处理任务队列
    frontier: Mutex<VecDeque<CrawlTask>>,
    work_notify: Notify,
    /// 已提交但尚未到达终止状态的任务数
    pending: AtomicUsize,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    session_id: Uuid,
}

/// 爬取引擎（遍历控制器）
///
/// 负责决定访问哪些URL、以什么顺序访问，并执行结构性边界：
/// 深度上限、域名过滤和会话内去重。任务经由有界工作器池
/// 处理，工作器数量由来源的并发度决定；抓取经过调速器
/// 调度，失败交给重试策略评估，成功页面依次经过分类、
/// 提取并发送到下游存储，新发现的链接重新提交回控制器。
pub struct CrawlEngine<F, S> {
    inner: Arc<EngineInner<F, S>>,
}

impl<F, S> Clone for CrawlEngine<F, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F, S> CrawlEngine<F, S>
where
    F: FetchEngine + 'static,
    S: ContentSink + 'static,
{
    /// 创建新的爬取引擎实例
    ///
    /// 配置校验和分类器/选择器编译在此处完成，无效配置
    /// 快速失败，不会推迟到逐任务运行时。
    ///
    /// # 参数
    ///
    /// * `source` - 已解析的来源配置
    /// * `fetcher` - 抓取能力
    /// * `sink` - 内容下游存储
    /// * `metrics` - 指标收集器
    /// * `robots` - robots.txt检查器，None时不检查
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlEngine)` - 构建成功的引擎
    /// * `Err(DomainError)` - 配置无效
    pub fn new(
        source: SourceConfig,
        fetcher: Arc<F>,
        sink: Arc<S>,
        metrics: Arc<CrawlMetrics>,
        robots: Option<RobotsChecker>,
    ) -> Result<Self, DomainError> {
        source.validate()?;

        let classifier = ContentClassifier::new(&source.classifier)?;
        let extractor = FieldExtractor::new(metrics.clone());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let governor = RateGovernor::new(source.domain_rules.clone(), cancel_rx.clone());
        let backoff = BackoffConfig {
            max_retries: source.max_retries,
            backoff_unit: source.backoff_unit,
            ..BackoffConfig::default()
        };
        let retry = RetryPolicy::new(backoff, metrics.clone());

        Ok(Self {
            inner: Arc::new(EngineInner {
                source,
                fetcher,
                sink,
                governor,
                retry,
                classifier,
                extractor,
                metrics,
                robots,
                visited: DashMap::new(),
                frontier: Mutex::new(VecDeque::new()),
                work_notify: Notify::new(),
                pending: AtomicUsize::new(0),
                cancel_tx,
                cancel_rx,
                session_id: Uuid::new_v4(),
            }),
        })
    }

    /// 开始遍历
    ///
    /// 提交种子任务并运行工作器池直到前沿耗尽或引擎被
    /// 取消，随后返回会话指标快照。
    ///
    /// # 参数
    ///
    /// * `seed_url` - 种子URL
    pub async fn start(&self, seed_url: &str) -> Result<MetricsSnapshot, CrawlError> {
        let seed = Url::parse(seed_url).map_err(|e| CrawlError::InvalidSeed(e.to_string()))?;
        let task = CrawlTask::new(seed, 0, self.inner.source.name.clone());

        match self.submit(task) {
            SubmitOutcome::Enqueued => {}
            outcome => {
                return Err(CrawlError::InvalidSeed(format!(
                    "seed rejected: {:?}",
                    outcome
                )))
            }
        }

        info!(
            source = %self.inner.source.name,
            session = %self.inner.session_id,
            seed = seed_url,
            workers = self.inner.source.parallelism,
            "Starting crawl"
        );
        let started = Instant::now();

        let handles: Vec<_> = (0..self.inner.source.parallelism)
            .map(|worker_id| {
                let engine = self.clone();
                tokio::spawn(async move { engine.worker_loop(worker_id).await })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Crawl worker panicked: {}", e);
            }
        }

        let snapshot = self.inner.metrics.snapshot();
        info!(
            source = %self.inner.source.name,
            processed = snapshot.processed_count,
            errors = snapshot.error_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Crawl finished"
        );

        Ok(snapshot)
    }

    /// 请求优雅取消
    ///
    /// 停止接纳新任务，并立即中断所有等待槽位或退避中的
    /// 任务；已经过调速器进入抓取的请求自然完成。
    pub fn stop(&self) {
        if !*self.inner.cancel_rx.borrow() {
            info!(source = %self.inner.source.name, "Stop requested");
            let _ = self.inner.cancel_tx.send(true);
            self.inner.work_notify.notify_waiters();
        }
    }

    /// 获取当前指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// 提交一个爬取任务
    ///
    /// 超出深度上限、主机不在允许域名内或URL已访问过的
    /// 任务被拒绝（无操作，非错误）；其余任务进入前沿队列。
    pub fn submit(&self, task: CrawlTask) -> SubmitOutcome {
        let inner = &self.inner;

        if *inner.cancel_rx.borrow() {
            return SubmitOutcome::Cancelled;
        }
        if task.depth > inner.source.max_depth {
            debug!(url = %task.url, depth = task.depth, "Task rejected: depth limit");
            return SubmitOutcome::DepthExceeded;
        }
        let allowed = task
            .url
            .host_str()
            .map(|host| inner.source.is_domain_allowed(host))
            .unwrap_or(false);
        if !allowed {
            debug!(url = %task.url, "Task rejected: host outside allowed domains");
            return SubmitOutcome::DomainFiltered;
        }

        let key = url_utils::normalize(&task.url);
        if inner.visited.insert(key, ()).is_some() {
            return SubmitOutcome::Duplicate;
        }

        counter!("crawl_tasks_submitted_total").increment(1);
        inner.pending.fetch_add(1, Ordering::SeqCst);
        inner.frontier.lock().push_back(task);
        inner.work_notify.notify_one();
        SubmitOutcome::Enqueued
    }

    /// 处理一条新发现的链接
    ///
    /// 相对链接基于所在页面的URL解析为绝对URL，构建深度
    /// 加一的子任务后走常规提交过滤。
    pub fn on_link_discovered(
        &self,
        parent: &CrawlTask,
        base: &Url,
        raw_link: &str,
    ) -> SubmitOutcome {
        let Ok(resolved) = url_utils::resolve_url(base, raw_link) else {
            debug!(parent = %parent.url, link = raw_link, "Discovered link failed to resolve");
            return SubmitOutcome::DomainFiltered;
        };
        if !url_utils::is_http(&resolved) {
            return SubmitOutcome::DomainFiltered;
        }
        self.submit(parent.child(resolved))
    }

    /// 工作器主循环
    ///
    /// 从前沿队列拉取任务处理；队列为空且无在途任务时
    /// 退出，收到取消信号时停止拉取新任务。
    async fn worker_loop(&self, worker_id: usize) {
        let inner = &self.inner;
        debug!(worker_id, "Crawl worker started");

        loop {
            if *inner.cancel_rx.borrow() && inner.frontier.lock().is_empty() {
                break;
            }

            let task = if *inner.cancel_rx.borrow() {
                None
            } else {
                inner.frontier.lock().pop_front()
            };

            match task {
                Some(task) => self.process_task(task).await,
                None => {
                    if inner.pending.load(Ordering::SeqCst) == 0 || *inner.cancel_rx.borrow() {
                        break;
                    }
                    tokio::select! {
                        _ = inner.work_notify.notified() => {}
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                    }
                }
            }
        }

        debug!(worker_id, "Crawl worker stopped");
    }

    /// 处理单个任务直至其终止
    #[instrument(skip(self, task), fields(url = %task.url, depth = task.depth))]
    async fn process_task(&self, mut task: CrawlTask) {
        let started = Instant::now();
        self.run_task(&mut task).await;
        self.inner.metrics.record_processing_time(started.elapsed());

        // 最后一个在途任务结束后唤醒空闲工作器退出
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.work_notify.notify_waiters();
        }
    }

    /// 任务状态机：抓取、按需重试、成功后进入处理管线
    ///
    /// 同一任务的各次尝试严格串行；退避睡眠前释放并发
    /// 槽位，重试时重新获取。
    async fn run_task(&self, task: &mut CrawlTask) {
        let inner = &self.inner;
        let url = task.url.clone();
        let retry_key = url.as_str().to_string();

        if let Some(robots) = &inner.robots {
            match robots.is_allowed(&url, &inner.source.user_agent).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("URL disallowed by robots.txt");
                    return;
                }
                Err(e) => {
                    debug!(error = %e, "robots.txt check failed, proceeding");
                }
            }
        }

        let host = url.host_str().unwrap_or_default().to_string();

        loop {
            let permit = match inner.governor.acquire(&host).await {
                Ok(permit) => permit,
                Err(GovernorError::Cancelled) => {
                    debug!("Cancelled while waiting for a fetch slot");
                    return;
                }
            };

            if let Err(e) = task.begin_fetch() {
                error!(state = %task.state, error = %e, "Task in unexpected state");
                return;
            }

            let attempt = FetchAttempt::new(inner.retry.attempts(&retry_key) + 1);
            debug!(attempt = attempt.number, "Fetching");
            let result = inner.fetcher.fetch(&url).await;
            drop(permit);

            let failure = match &result {
                Ok(response) => FetchErrorKind::from_status(response.status_code)
                    .map(|kind| (kind, format!("HTTP {}", response.status_code))),
                Err(e) => Some((e.kind, e.message.clone())),
            };

            let Some((kind, message)) = failure else {
                let Ok(response) = result else { return };
                inner.retry.on_success(&retry_key);
                self.handle_fetched(task, response).await;
                return;
            };

            match inner.retry.evaluate(&retry_key, kind) {
                Decision::Retry(delay) => {
                    if task.mark_retrying().is_err() {
                        return;
                    }
                    warn!(
                        kind = %kind,
                        error = %message,
                        attempt = attempt.number,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch failed, retry scheduled"
                    );

                    let mut cancel_rx = inner.cancel_rx.clone();
                    if *cancel_rx.borrow() {
                        return;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel_rx.changed() => {
                            debug!("Cancelled during retry backoff");
                            return;
                        }
                    }
                }
                Decision::Terminal => {
                    let _ = task.mark_failed();
                    counter!("crawl_tasks_failed_total").increment(1);
                    error!(
                        kind = %kind,
                        error = %message,
                        attempt = attempt.number,
                        "Fetch failed terminally"
                    );
                    return;
                }
            }
        }
    }

    /// 处理一次成功的抓取响应
    ///
    /// 同步阶段完成分类与提取后，文章记录发送到下游存储，
    /// 页面上发现的链接全部重新提交。
    async fn handle_fetched(&self, task: &mut CrawlTask, response: FetchResponse) {
        let inner = &self.inner;
        let base = response.final_url.clone();

        let staged = match self.process_document(task, &response) {
            Ok(staged) => staged,
            Err(e) => {
                inner.metrics.record_error();
                counter!("crawl_tasks_failed_total").increment(1);
                let _ = task.mark_failed();
                warn!(error = %e, "Document rejected");
                return;
            }
        };

        let mut extraction_failed = false;
        match staged.content {
            Some(Ok(content)) => {
                inner.metrics.record_processed();
                if let Err(e) = inner.sink.emit(content).await {
                    inner.metrics.record_error();
                    error!(error = %e, "Sink emission failed");
                }
            }
            Some(Err(e)) => {
                extraction_failed = true;
                inner.metrics.record_error();
                warn!(error = %e, "Extraction failed, page not emitted");
            }
            None => {
                debug!(
                    is_article = staged.classification.is_article,
                    "Page skipped extraction"
                );
            }
        }

        if extraction_failed {
            let _ = task.mark_failed();
            counter!("crawl_tasks_failed_total").increment(1);
        } else {
            let _ = task.mark_succeeded();
            counter!("crawl_tasks_completed_total").increment(1);
        }

        // 提取失败只影响当前记录，链接发现照常进行
        for raw_link in &staged.links {
            self.on_link_discovered(task, &base, raw_link);
        }
    }

    /// 文档同步处理阶段
    ///
    /// 解析、分类、按需提取并收集链接；DOM句柄的生命周期
    /// 不超出本函数。
    fn process_document(
        &self,
        task: &CrawlTask,
        response: &FetchResponse,
    ) -> Result<StagedPage, ExtractError> {
        let inner = &self.inner;
        let doc = ParsedDocument::parse(
            &response.body,
            response.final_url.clone(),
            response.status_code,
        )?;

        let classification = inner.classifier.classify(&doc).clone();
        debug!(
            is_article = classification.is_article,
            "Page classified"
        );

        let content = if classification.is_article {
            Some(
                inner
                    .extractor
                    .extract(&doc, &inner.source.selectors, &task.source),
            )
        } else {
            None
        };

        let links = if task.depth < inner.source.max_depth {
            doc.links()
        } else {
            Vec::new()
        };

        Ok(StagedPage {
            classification,
            content,
            links,
        })
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
