//! # Assessment Bank
//!
//! 用 LLM 批量生成多选题题库，并用第二个模型交叉校验答案的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 补全服务边界：每个任务打开一个句柄，提交一次，随后释放
//! - `OpenAiCompletionService` - 基于 async-openai 的实现
//! - `ScriptedCompletionService` - 按脚本回复的实现，用于测试和离线演练
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心并发
//! - `PromptBuilder` - 渲染生成 / 校验提示词
//! - `extractor` - 从原始文本中容错地提取题目和校验答案
//! - `ResultsWriter` - 写分隔符文件
//! - `RateLimiter` - 请求令牌桶 + 阶段冷却
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/worker_pool` - 固定大小的 worker 池，带结束握手
//! - `orchestrator/aggregator` / `reconciler` - 汇总与合并
//! - `orchestrator/pipeline` - 生成 → 校验第 1 轮 → 校验第 N 轮
//! - `orchestrator/app` - 应用入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{CompletionService, OpenAiCompletionService, ScriptedCompletionService};
pub use config::{Config, PromptTemplates};
pub use error::{AppError, AppResult};
pub use models::{AssessmentRecord, ResultMapping, TopicEntry};
pub use orchestrator::{App, AssessmentPipeline, PipelineReport};
