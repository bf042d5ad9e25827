//! Worker 池 - 编排层
//!
//! ## 职责
//!
//! 把一组 [`Job`] 分发给固定数量的 worker，每个任务恰好产生一个 [`Outcome`]，
//! 由单个汇总任务（[`Aggregator`]）按到达顺序消费。
//!
//! ## 结束握手
//!
//! 1. 全部任务送出后关闭任务通道
//! 2. 每个 worker 读到通道关闭后退出，返回自己的 [`WorkerReport`]（结束信号）
//! 3. 等齐 W 个结束信号；此时所有结果发送端都已释放，结果通道随之关闭
//! 4. 汇总任务读完剩余结果后返回汇总产物
//!
//! 结果通道只会在最后一个 worker 退出后关闭，worker 不可能向已关闭的通道写入。

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::clients::{CompletionRequest, CompletionService};
use crate::models::Job;
use crate::services::RateLimiter;

/// 单个任务的执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeResult {
    /// 补全成功，原始文本（可能为空列表）
    Payloads(Vec<String>),
    /// 补全服务失败（打开句柄或提交出错）
    Failed(String),
}

/// worker 发往汇总任务的消息
#[derive(Debug, Clone)]
pub struct Outcome {
    pub worker_id: usize,
    pub job: Job,
    pub result: OutcomeResult,
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.result, OutcomeResult::Failed(_))
    }
}

/// 汇总阶段：独占地累积一轮中的全部结果
pub trait Aggregator: Send + 'static {
    type Output: Send + 'static;

    fn accept(&mut self, outcome: Outcome);

    fn finish(self) -> Self::Output;
}

/// 单个 worker 的结束信号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub processed: usize,
    pub failed: usize,
}

/// 一轮执行的统计及汇总产物
#[derive(Debug)]
pub struct PoolReport<T> {
    pub jobs_submitted: usize,
    pub outcomes_received: usize,
    pub failed: usize,
    pub workers: Vec<WorkerReport>,
    pub output: T,
}

/// 固定大小的 worker 池
pub struct WorkerPool {
    service: Arc<dyn CompletionService>,
    limiter: Arc<RateLimiter>,
    workers: usize,
}

impl WorkerPool {
    /// `workers` 为 0 时按 1 处理
    pub fn new(service: Arc<dyn CompletionService>, limiter: Arc<RateLimiter>, workers: usize) -> Self {
        Self {
            service,
            limiter,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 执行全部任务，等结束握手完成后返回汇总结果
    pub async fn run<A: Aggregator>(&self, jobs: Vec<Job>, aggregator: A) -> Result<PoolReport<A::Output>> {
        let (job_tx, job_rx) = mpsc::channel::<Job>(1);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<Outcome>(1);

        // 汇总任务：独占 aggregator，直到结果通道关闭
        let collector = tokio::spawn(async move {
            let mut aggregator = aggregator;
            let mut received = 0usize;
            let mut failed = 0usize;
            while let Some(outcome) = outcome_rx.recv().await {
                received += 1;
                if outcome.is_failed() {
                    failed += 1;
                }
                aggregator.accept(outcome);
            }
            (received, failed, aggregator.finish())
        });

        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&job_rx),
                    outcome_tx.clone(),
                    Arc::clone(&self.service),
                    Arc::clone(&self.limiter),
                ))
            })
            .collect();
        // 只保留 worker 手中的发送端
        drop(outcome_tx);

        let jobs_submitted = jobs.len();
        for job in jobs {
            if job_tx.send(job).await.is_err() {
                anyhow::bail!("所有 worker 已退出，任务无法继续分发");
            }
        }
        drop(job_tx);

        let mut workers = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            workers.push(joined.context("worker 异常退出")?);
        }
        debug!("已收到 {} 个 worker 的结束信号", workers.len());

        let (outcomes_received, failed, output) = collector.await.context("汇总任务异常退出")?;

        if outcomes_received != jobs_submitted {
            warn!(
                "⚠️ 结果数量 {} 与任务数量 {} 不一致",
                outcomes_received, jobs_submitted
            );
        }

        Ok(PoolReport {
            jobs_submitted,
            outcomes_received,
            failed,
            workers,
            output,
        })
    }
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    outcomes: mpsc::Sender<Outcome>,
    service: Arc<dyn CompletionService>,
    limiter: Arc<RateLimiter>,
) -> WorkerReport {
    let mut report = WorkerReport {
        worker_id,
        ..Default::default()
    };

    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        let result = execute(service.as_ref(), &limiter, &job).await;
        report.processed += 1;
        if matches!(result, OutcomeResult::Failed(_)) {
            report.failed += 1;
        }

        let outcome = Outcome {
            worker_id,
            job,
            result,
        };
        if outcomes.send(outcome).await.is_err() {
            warn!("[worker {}] 汇总任务已退出，停止处理", worker_id);
            break;
        }
    }

    debug!("[worker {}] 结束，共处理 {} 个任务", worker_id, report.processed);
    report
}

/// 打开句柄、提交一次、释放句柄；任何失败都转换为 [`OutcomeResult::Failed`]
async fn execute(service: &dyn CompletionService, limiter: &RateLimiter, job: &Job) -> OutcomeResult {
    let mut handle = match service.open().await {
        Ok(handle) => handle,
        Err(e) => {
            warn!("{} ❌ 无法打开补全句柄: {}", job, e);
            return OutcomeResult::Failed(e.to_string());
        }
    };

    limiter.acquire().await;

    let request = CompletionRequest {
        system_prompt: job.system_prompt.clone(),
        prompt: job.prompt.clone(),
        model: job.model.clone(),
        temperature: job.temperature,
    };

    match handle.submit(&request).await {
        Ok(payloads) => {
            debug!("{} ✓ 收到 {} 段原始文本", job, payloads.len());
            OutcomeResult::Payloads(payloads)
        }
        Err(e) => {
            warn!("{} ❌ 补全失败: {}", job, e);
            OutcomeResult::Failed(e.to_string())
        }
    }
}
