//! 结果汇总 - 编排层
//!
//! 汇总任务独占映射；一轮结束（worker 池结束握手完成）后才把映射交还编排层。

use std::collections::HashMap;
use tracing::{info, warn};

use crate::models::{ResultMapping, ValidatedAnswer};
use crate::orchestrator::worker_pool::{Aggregator, Outcome, OutcomeResult};
use crate::services::{extract_assessments, extract_validated, PromptBuilder, ValidationPrompt};

/// 汇总统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// 收到的结果数
    pub outcomes: usize,
    /// 补全失败的结果数
    pub failed: usize,
    /// 补全成功但没有提取出任何记录的结果数
    pub empty: usize,
    /// 提取出的记录总数（去重前）
    pub records: usize,
}

/// 生成阶段的汇总产物
#[derive(Debug, Clone, Default)]
pub struct GenerationBatch {
    pub mapping: ResultMapping,
    /// 每段原始文本对应一个校验提示词
    pub validation_prompts: Vec<ValidationPrompt>,
    pub stats: AggregateStats,
}

/// 生成阶段汇总：按题干去重，后写覆盖先写
pub struct GenerationAggregator {
    prompts: PromptBuilder,
    batch: GenerationBatch,
}

impl GenerationAggregator {
    pub fn new(prompts: PromptBuilder) -> Self {
        Self {
            prompts,
            batch: GenerationBatch::default(),
        }
    }
}

impl Aggregator for GenerationAggregator {
    type Output = GenerationBatch;

    fn accept(&mut self, outcome: Outcome) {
        let stats = &mut self.batch.stats;
        stats.outcomes += 1;

        let payloads = match outcome.result {
            OutcomeResult::Payloads(payloads) => payloads,
            OutcomeResult::Failed(_) => {
                stats.failed += 1;
                return;
            }
        };

        let mut extracted = 0;
        for payload in &payloads {
            let extraction = extract_assessments(payload, &outcome.job.model, &self.prompts);
            extracted += extraction.records.len();
            for record in extraction.records {
                self.batch.mapping.insert(record);
            }
            if let Some(prompt) = extraction.validation_prompt {
                self.batch.validation_prompts.push(prompt);
            }
        }

        let stats = &mut self.batch.stats;
        stats.records += extracted;
        if extracted == 0 {
            stats.empty += 1;
            warn!("{} ⚠️ 没有提取到题目", outcome.job);
        } else {
            info!("{} ✓ 提取 {} 道题目", outcome.job, extracted);
        }
    }

    fn finish(self) -> Self::Output {
        self.batch
    }
}

/// 校验阶段的汇总产物
#[derive(Debug, Clone, Default)]
pub struct ValidationBatch {
    pub answers: HashMap<String, ValidatedAnswer>,
    pub stats: AggregateStats,
}

/// 校验阶段汇总：按题干合并，后写覆盖先写
#[derive(Default)]
pub struct ValidationAggregator {
    batch: ValidationBatch,
}

impl ValidationAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for ValidationAggregator {
    type Output = ValidationBatch;

    fn accept(&mut self, outcome: Outcome) {
        let stats = &mut self.batch.stats;
        stats.outcomes += 1;

        let payloads = match outcome.result {
            OutcomeResult::Payloads(payloads) => payloads,
            OutcomeResult::Failed(_) => {
                stats.failed += 1;
                return;
            }
        };

        let answers: Vec<ValidatedAnswer> = payloads.iter().flat_map(|p| extract_validated(p)).collect();
        stats.records += answers.len();
        if answers.is_empty() {
            stats.empty += 1;
            warn!("{} ⚠️ 没有提取到校验答案", outcome.job);
        } else {
            info!(
                "{} ✓ 收到 {}/{} 个校验答案",
                outcome.job,
                answers.len(),
                outcome.job.question_count()
            );
        }

        for answer in answers {
            self.batch.answers.insert(answer.question.clone(), answer);
        }
    }

    fn finish(self) -> Self::Output {
        self.batch
    }
}
