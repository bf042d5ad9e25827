//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责任务分发、结果汇总和阶段调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 读取主题文件和提示词模板
//! - 输出全局统计信息
//!
//! ### `pipeline` - 题库流水线
//! - 展开生成任务和校验任务
//! - 按阶段驱动 worker 池，每个阶段写出一份结果文件
//! - 第 2 轮起只校验上一轮的不一致题目
//!
//! ### `worker_pool` - Worker 池
//! - 固定数量的 worker 共享一个任务通道
//! - 每个任务恰好一个结果，结束握手后才交还汇总产物
//!
//! ### `aggregator` / `reconciler`
//! - 汇总：原始文本 → 去重后的题目映射 / 校验答案
//! - 合并：校验答案写回映射，产出不一致集合
//!
//! ## 层次关系
//!
//! ```text
//! app (加载输入，输出统计)
//!     ↓
//! pipeline (生成 → 校验第 1 轮 → 校验第 N 轮)
//!     ↓
//! worker_pool + aggregator / reconciler
//!     ↓
//! services (能力层：prompt / extractor / writer / rate limiter)
//!     ↓
//! clients (补全服务)
//! ```

pub mod aggregator;
pub mod app;
pub mod pipeline;
pub mod reconciler;
pub mod worker_pool;

// 重新导出主要类型
pub use aggregator::{AggregateStats, GenerationAggregator, GenerationBatch, ValidationAggregator, ValidationBatch};
pub use app::App;
pub use pipeline::{AssessmentPipeline, GenerationReport, PipelineReport, RoundReport};
pub use reconciler::{ReconcileStats, Reconciler, Reconciliation};
pub use worker_pool::{Aggregator, Outcome, OutcomeResult, PoolReport, WorkerPool, WorkerReport};
