//! 题库流水线 - 编排层
//!
//! ## 职责
//!
//! 按阶段驱动两个 worker 池：
//!
//! 1. 生成：主题 × 能力等级 × 难度 → 生成任务 → 去重后的题目映射
//! 2. 第 1 轮校验：覆盖全部题目，合并后得到不一致集合
//! 3. 第 N 轮校验（N ≥ 2）：只覆盖上一轮的不一致集合，集合为空时提前结束
//!
//! 每个阶段结束后写出一份结果文件；阶段之间由 [`RateLimiter::cooldown`] 控制节奏。

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::clients::CompletionService;
use crate::config::Config;
use crate::models::{Job, JobKind, MismatchSet, ResultMapping, TopicEntry};
use crate::orchestrator::aggregator::{
    AggregateStats, GenerationAggregator, GenerationBatch, ValidationAggregator,
};
use crate::orchestrator::reconciler::{ReconcileStats, Reconciler};
use crate::orchestrator::worker_pool::WorkerPool;
use crate::services::{PromptBuilder, RateLimiter, ResultsWriter, ValidationPrompt};
use crate::utils::logging;

/// 生成阶段统计
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub jobs: usize,
    pub stats: AggregateStats,
    /// 去重后的题目数
    pub unique: usize,
    /// 被后到记录覆盖的次数
    pub duplicates: usize,
}

/// 一轮校验统计
#[derive(Debug, Clone, Default)]
pub struct RoundReport {
    pub round: usize,
    pub jobs: usize,
    /// 本轮提示词覆盖的题目数
    pub questions: usize,
    /// 本轮收到的校验答案数（按题干合并后）
    pub answers: usize,
    pub failed_jobs: usize,
    pub reconcile: ReconcileStats,
}

/// 整次运行的结果
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub generation: GenerationReport,
    pub rounds: Vec<RoundReport>,
    pub mapping: ResultMapping,
}

impl PipelineReport {
    /// 校验一致的题目数
    pub fn confirmed(&self) -> usize {
        self.mapping.iter().filter(|r| r.is_confirmed()).count()
    }

    /// 最后一轮校验范围内仍不一致的题目数
    ///
    /// 第 2 轮起只统计上一轮的不一致题目；全部题目中未确认的数量见 [`Self::unconfirmed`]。
    pub fn remaining_mismatches(&self) -> usize {
        self.rounds
            .last()
            .map(|r| r.reconcile.mismatched())
            .unwrap_or(0)
    }

    /// 全部题目中校验答案与原答案不一致（含未校验）的数量
    pub fn unconfirmed(&self) -> usize {
        self.mapping.len() - self.confirmed()
    }
}

/// 题库流水线
pub struct AssessmentPipeline {
    config: Config,
    prompts: PromptBuilder,
    limiter: Arc<RateLimiter>,
    generation_pool: WorkerPool,
    validation_pool: WorkerPool,
    writer: ResultsWriter,
    reconciler: Reconciler,
}

impl AssessmentPipeline {
    pub fn new(config: Config, prompts: PromptBuilder, service: Arc<dyn CompletionService>) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.requests_per_minute,
            config.generation_workers.max(config.validation_workers) as u32,
            config.phase_cooldown(),
        ));
        let generation_pool = WorkerPool::new(
            Arc::clone(&service),
            Arc::clone(&limiter),
            config.generation_workers,
        );
        let validation_pool = WorkerPool::new(service, Arc::clone(&limiter), config.validation_workers);

        Self {
            writer: ResultsWriter::new(config.output_delimiter),
            reconciler: Reconciler::new(config.validation_model.clone()),
            config,
            prompts,
            limiter,
            generation_pool,
            validation_pool,
        }
    }

    /// 运行全部阶段
    pub async fn run(&self, topics: &[TopicEntry]) -> Result<PipelineReport> {
        let (batch, generation) = self.generate(topics).await?;
        let GenerationBatch {
            mut mapping,
            validation_prompts,
            ..
        } = batch;

        let path = self.config.generation_output_path();
        self.writer
            .write(&mapping, &path)
            .await
            .with_context(|| format!("写入生成结果失败: {}", path.display()))?;

        let mut rounds = Vec::new();
        let mut prompts = validation_prompts;
        for round in 1..=self.config.validation_rounds {
            if prompts.is_empty() {
                info!("✓ 没有需要校验的题目，跳过第 {} 轮及之后的校验", round);
                break;
            }

            let (report, mismatches) = self.validate_round(round, prompts, &mut mapping).await?;
            rounds.push(report);

            let path = self.config.validation_output_path(round);
            self.writer
                .write(&mapping, &path)
                .await
                .with_context(|| format!("写入第 {} 轮校验结果失败: {}", round, path.display()))?;

            prompts = self
                .prompts
                .validation_prompts(&mismatches, self.config.validation_batch_size);
        }

        Ok(PipelineReport {
            generation,
            rounds,
            mapping,
        })
    }

    /// 生成阶段：运行全部生成任务并汇总
    pub async fn generate(&self, topics: &[TopicEntry]) -> Result<(GenerationBatch, GenerationReport)> {
        let jobs = self.generation_jobs(topics);
        logging::log_phase_start("生成题目", jobs.len(), self.generation_pool.workers());

        let report = self
            .generation_pool
            .run(jobs, GenerationAggregator::new(self.prompts.clone()))
            .await
            .context("生成阶段执行失败")?;

        let batch = report.output;
        let generation = GenerationReport {
            jobs: report.jobs_submitted,
            stats: batch.stats.clone(),
            unique: batch.mapping.len(),
            duplicates: batch.mapping.duplicates(),
        };
        logging::log_generation_complete(&generation.stats, generation.unique, generation.duplicates);

        Ok((batch, generation))
    }

    /// 一轮校验：运行校验任务，把答案合并进 `mapping`，返回本轮统计与不一致集合
    ///
    /// 第 1 轮比对映射中的全部题目；之后的轮次只比对本轮提示词覆盖的题目。
    pub async fn validate_round(
        &self,
        round: usize,
        prompts: Vec<ValidationPrompt>,
        mapping: &mut ResultMapping,
    ) -> Result<(RoundReport, MismatchSet)> {
        let scope: Vec<String> = prompts.iter().flat_map(|p| p.questions.iter().cloned()).collect();
        let jobs = self.validation_jobs(round, prompts);

        self.limiter.cooldown(&format!("第 {} 轮校验", round)).await;
        logging::log_phase_start(
            &format!("第 {} 轮校验 ({} 题)", round, scope.len()),
            jobs.len(),
            self.validation_pool.workers(),
        );

        let report = self
            .validation_pool
            .run(jobs, ValidationAggregator::new())
            .await
            .with_context(|| format!("第 {} 轮校验执行失败", round))?;
        let answers = report.output.answers;

        let reconciliation = if round == 1 {
            self.reconciler.reconcile(mapping, &answers)
        } else {
            self.reconciler.reconcile_scope(mapping, &scope, &answers)
        };
        logging::log_round_complete(round, answers.len(), mapping.len(), &reconciliation.stats);

        let round_report = RoundReport {
            round,
            jobs: report.jobs_submitted,
            questions: scope.len(),
            answers: answers.len(),
            failed_jobs: report.failed,
            reconcile: reconciliation.stats,
        };
        Ok((round_report, reconciliation.mismatches))
    }

    /// 按 能力等级 → 难度 → 主题 的顺序展开生成任务
    pub fn generation_jobs(&self, topics: &[TopicEntry]) -> Vec<Job> {
        let model = &self.config.generation_model;
        let mut jobs = Vec::with_capacity(
            topics.len() * self.config.proficiencies.len() * self.config.complexities.len(),
        );

        for &proficiency in &self.config.proficiencies {
            for &complexity in &self.config.complexities {
                for entry in topics {
                    jobs.push(Job {
                        id: jobs.len(),
                        kind: JobKind::Generation {
                            subject: entry.subject.clone(),
                            topic: entry.topic.clone(),
                            proficiency,
                            complexity,
                        },
                        system_prompt: self.prompts.generation_system().to_string(),
                        prompt: self.prompts.generation_prompt(entry, proficiency, complexity, model),
                        model: model.clone(),
                        temperature: self.config.temperature,
                    });
                }
            }
        }

        jobs
    }

    /// 每个校验提示词对应一个任务
    pub fn validation_jobs(&self, round: usize, prompts: Vec<ValidationPrompt>) -> Vec<Job> {
        prompts
            .into_iter()
            .enumerate()
            .map(|(id, prompt)| Job {
                id,
                kind: JobKind::Validation {
                    round,
                    questions: prompt.questions,
                },
                system_prompt: self.prompts.validation_system().to_string(),
                prompt: prompt.prompt,
                model: self.config.validation_model.clone(),
                temperature: self.config.temperature,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ScriptedCompletionService, ScriptedReply};
    use crate::config::PromptTemplates;
    use crate::models::{Complexity, Proficiency};

    fn config(dir: &std::path::Path) -> Config {
        Config {
            generation_workers: 2,
            validation_workers: 2,
            questions_per_job: 3,
            output_dir: dir.to_string_lossy().into_owned(),
            phase_cooldown_secs: 0,
            generation_model: "gen".into(),
            validation_model: "val".into(),
            ..Default::default()
        }
    }

    fn pipeline(config: Config, service: &ScriptedCompletionService) -> AssessmentPipeline {
        let prompts = PromptBuilder::new(PromptTemplates::default(), config.questions_per_job);
        AssessmentPipeline::new(config, prompts, Arc::new(service.clone()))
    }

    #[test]
    fn test_generation_jobs_cover_every_combination() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            proficiencies: vec![Proficiency::Learner, Proficiency::Specialist],
            complexities: vec![Complexity::Easy],
            ..config(dir.path())
        };
        let service = ScriptedCompletionService::new(|_| ScriptedReply::payload("[]"));
        let topics = vec![TopicEntry::new("AI", "RAG"), TopicEntry::new("AI", "Agents")];

        let jobs = pipeline(cfg, &service).generation_jobs(&topics);

        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(jobs.iter().all(|j| j.model == "gen"));
        assert!(matches!(
            &jobs[3].kind,
            JobKind::Generation { topic, proficiency: Proficiency::Specialist, .. } if topic == "Agents"
        ));
        assert!(jobs[0].prompt.contains("RAG"));
    }

    #[test]
    fn test_validation_jobs_use_validation_model() {
        let dir = tempfile::tempdir().unwrap();
        let service = ScriptedCompletionService::new(|_| ScriptedReply::payload("[]"));
        let pipeline = pipeline(config(dir.path()), &service);
        let prompts = vec![ValidationPrompt {
            prompt: "p".into(),
            questions: vec!["Q1".into(), "Q2".into()],
        }];

        let jobs = pipeline.validation_jobs(2, prompts);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].model, "val");
        assert_eq!(jobs[0].question_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_generation_skips_validation_and_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let service = ScriptedCompletionService::new(|_| ScriptedReply::payload("no json here"));
        let pipeline = pipeline(config(dir.path()), &service);

        let report = pipeline.run(&[TopicEntry::new("AI", "RAG")]).await.unwrap();

        assert_eq!(report.generation.jobs, 9);
        assert_eq!(report.generation.stats.empty, 9);
        assert!(report.rounds.is_empty());
        assert!(report.mapping.is_empty());
        assert!(dir.path().join("generatedAssessments.csv").exists());
        assert!(!dir.path().join("generatedAssessmentsValidated-1.csv").exists());
    }
}
