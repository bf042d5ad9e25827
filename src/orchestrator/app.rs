//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、配置检查、提示词模板、补全服务
//! 2. **加载输入**：读取主题文件（`Vec<TopicEntry>`）
//! 3. **向下委托**：把主题交给 [`AssessmentPipeline`] 执行全部阶段
//! 4. **全局统计**：输出最终结果

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::{CompletionService, OpenAiCompletionService};
use crate::config::{Config, PromptTemplates};
use crate::models::{load_prompt_templates, load_topics, TopicEntry};
use crate::orchestrator::pipeline::{AssessmentPipeline, PipelineReport};
use crate::services::PromptBuilder;
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: AssessmentPipeline,
}

impl App {
    /// 使用真实的补全服务初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let service: Arc<dyn CompletionService> = Arc::new(OpenAiCompletionService::new(&config));
        Self::with_service(config, service).await
    }

    /// 使用指定的补全服务初始化应用
    pub async fn with_service(config: Config, service: Arc<dyn CompletionService>) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(
            config.generation_workers,
            config.validation_workers,
            config.validation_rounds,
        );

        config.validate().context("配置无效")?;

        if config.llm_api_key.trim().is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，所有补全请求都会失败");
        }

        let templates = match &config.prompt_templates_file {
            Some(path) => load_prompt_templates(Path::new(path))
                .await
                .with_context(|| format!("无法加载提示词模板: {}", path))?,
            None => PromptTemplates::default(),
        };
        let prompts = PromptBuilder::new(templates, config.questions_per_job);

        let pipeline = AssessmentPipeline::new(config.clone(), prompts, service);

        Ok(Self { config, pipeline })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<PipelineReport> {
        let topics = self.load_topics().await?;

        if topics.is_empty() {
            warn!("⚠️ 主题文件中没有可用的主题，不会生成任何题目");
        }

        let report = self.pipeline.run(&topics).await?;

        logging::print_final_stats(
            report.mapping.len(),
            report.confirmed(),
            report.remaining_mismatches(),
            report.unconfirmed(),
            &self.config.output_log_file,
        );

        Ok(report)
    }

    /// 加载主题
    async fn load_topics(&self) -> Result<Vec<TopicEntry>> {
        info!("\n📁 正在读取主题文件: {}", self.config.topics_file);
        let topics = load_topics(Path::new(&self.config.topics_file))
            .await
            .with_context(|| format!("无法读取主题文件: {}", self.config.topics_file))?;
        info!("✓ 找到 {} 个主题", topics.len());
        Ok(topics)
    }
}
