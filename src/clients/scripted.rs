//! 可编排的补全服务
//!
//! 不访问网络，按调用方给出的规则返回结果；用于测试和离线演练。
//! 同时记录句柄打开/释放次数与最大并发，便于验证 worker 池的资源约束。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::llm_client::{CompletionHandle, CompletionRequest, CompletionService};
use crate::error::LlmError;

/// 单次提交的预设结果
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// 成功，返回这些原始文本
    Payloads(Vec<String>),
    /// 传输失败
    Fail(String),
}

impl ScriptedReply {
    /// 返回单个原始文本
    pub fn payload(text: impl Into<String>) -> Self {
        ScriptedReply::Payloads(vec![text.into()])
    }
}

type Responder = dyn Fn(&CompletionRequest) -> ScriptedReply + Send + Sync;

#[derive(Default)]
struct ScriptState {
    opened: AtomicUsize,
    released: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

/// 按规则应答的补全服务
#[derive(Clone)]
pub struct ScriptedCompletionService {
    responder: Arc<Responder>,
    state: Arc<ScriptState>,
    latency: Duration,
    refuse_open: bool,
}

impl ScriptedCompletionService {
    pub fn new(
        responder: impl Fn(&CompletionRequest) -> ScriptedReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Arc::new(responder),
            state: Arc::new(ScriptState::default()),
            latency: Duration::ZERO,
            refuse_open: false,
        }
    }

    /// 每次提交前等待的时间，用于制造并发重叠
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 让所有 `open` 都失败（模拟鉴权失败）
    pub fn refusing_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// 同一时刻正在进行的提交数的峰值
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// 已收到的全部请求（按到达顺序）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.state
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn open(&self) -> Result<Box<dyn CompletionHandle>, LlmError> {
        if self.refuse_open {
            return Err(LlmError::MissingCredential {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            responder: Arc::clone(&self.responder),
            state: Arc::clone(&self.state),
            latency: self.latency,
        }))
    }
}

struct ScriptedHandle {
    responder: Arc<Responder>,
    state: Arc<ScriptState>,
    latency: Duration,
}

#[async_trait]
impl CompletionHandle for ScriptedHandle {
    async fn submit(&mut self, request: &CompletionRequest) -> Result<Vec<String>, LlmError> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Ok(mut requests) = self.state.requests.lock() {
            requests.push(request.clone());
        }
        let reply = (self.responder)(request);

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            ScriptedReply::Payloads(payloads) => Ok(payloads),
            ScriptedReply::Fail(reason) => Err(LlmError::api_call_failed(
                request.model.clone(),
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, reason),
            )),
        }
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}
