//! LLM 补全客户端
//!
//! 流水线只通过 [`CompletionService`] / [`CompletionHandle`] 两个 trait 访问补全服务：
//! 每个任务打开一个句柄，提交一次，随后释放（drop）。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Gemini 的 OpenAI 兼容端点）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 一次补全请求
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

/// 补全服务：负责打开句柄
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// 打开一个新的句柄；鉴权或连接失败时返回错误
    async fn open(&self) -> Result<Box<dyn CompletionHandle>, LlmError>;
}

/// 补全句柄：一次提交返回零个或多个原始文本
#[async_trait]
pub trait CompletionHandle: Send {
    async fn submit(&mut self, request: &CompletionRequest) -> Result<Vec<String>, LlmError>;
}

/// 基于 async-openai 的补全服务
pub struct OpenAiCompletionService {
    openai_config: OpenAIConfig,
    has_api_key: bool,
}

impl OpenAiCompletionService {
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            openai_config,
            has_api_key: !config.llm_api_key.trim().is_empty(),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn open(&self) -> Result<Box<dyn CompletionHandle>, LlmError> {
        if !self.has_api_key {
            return Err(LlmError::MissingCredential {
                var_name: "LLM_API_KEY".to_string(),
            });
        }

        Ok(Box::new(OpenAiHandle {
            client: Client::with_config(self.openai_config.clone()),
        }))
    }
}

/// 单个任务持有的 OpenAI 客户端，drop 即释放
struct OpenAiHandle {
    client: Client<OpenAIConfig>,
}

#[async_trait]
impl CompletionHandle for OpenAiHandle {
    async fn submit(&mut self, request: &CompletionRequest) -> Result<Vec<String>, LlmError> {
        debug!("调用 LLM API，模型: {}", request.model);
        debug!("用户消息长度: {} 字符", request.prompt.len());

        let model = request.model.as_str();
        let mut messages = Vec::new();

        if !request.system_prompt.is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.as_str())
                .build()
                .map_err(|e| LlmError::request_build_failed(model, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.as_str())
            .build()
            .map_err(|e| LlmError::request_build_failed(model, e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(request.temperature)
            .build()
            .map_err(|e| LlmError::request_build_failed(model, e))?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::api_call_failed(model, e)
        })?;

        if response.choices.is_empty() {
            return Err(LlmError::EmptyResponse {
                model: model.to_string(),
            });
        }

        debug!("LLM API 调用成功，返回 {} 个候选", response.choices.len());

        Ok(response
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_without_api_key_fails() {
        let service = OpenAiCompletionService::new(&Config::default());
        let result = service.open().await;
        assert!(matches!(result, Err(LlmError::MissingCredential { .. })));
    }

    #[tokio::test]
    async fn test_open_with_api_key_succeeds() {
        let config = Config {
            llm_api_key: "test-key".to_string(),
            ..Default::default()
        };
        let service = OpenAiCompletionService::new(&config);
        assert!(service.open().await.is_ok());
    }

    /// 测试真实 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_submit_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_submit_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let service = OpenAiCompletionService::new(&config);
        let mut handle = service.open().await.expect("打开句柄失败");

        let request = CompletionRequest {
            system_prompt: "Reply with a JSON array only.".to_string(),
            prompt: "Return [\"ok\"]".to_string(),
            model: config.generation_model.clone(),
            temperature: 0.0,
        };

        let payloads = handle.submit(&request).await.expect("LLM 调用失败");
        println!("LLM 响应: {:?}", payloads);
        assert!(!payloads.is_empty());
    }
}
