//! 补全任务
//!
//! 一个 [`Job`] 对应一次补全请求：渲染好的提示词加上路由信息。
//! 任务在分发前由编排层创建，之后只读，由恰好一个 worker 消费一次。

use std::fmt::Display;

use crate::models::level::{Complexity, Proficiency};

/// 主题文件中的一行：科目 + 子主题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEntry {
    pub subject: String,
    pub topic: String,
}

impl TopicEntry {
    pub fn new(subject: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
        }
    }
}

/// 任务路由信息
#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    /// 生成题目
    Generation {
        subject: String,
        topic: String,
        proficiency: Proficiency,
        complexity: Complexity,
    },
    /// 校验一批题目
    Validation {
        round: usize,
        /// 本批包含的题干
        questions: Vec<String>,
    },
}

/// 一次补全请求
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: usize,
    pub kind: JobKind,
    pub system_prompt: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

impl Job {
    /// 本任务覆盖的题目数量（仅校验任务有意义）
    pub fn question_count(&self) -> usize {
        match &self.kind {
            JobKind::Generation { .. } => 0,
            JobKind::Validation { questions, .. } => questions.len(),
        }
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            JobKind::Generation {
                subject,
                topic,
                proficiency,
                complexity,
            } => write!(
                f,
                "[任务 #{} 生成 {}/{} {} {}]",
                self.id, subject, topic, proficiency, complexity
            ),
            JobKind::Validation { round, questions } => write!(
                f,
                "[任务 #{} 校验第 {} 轮 {} 题]",
                self.id,
                round,
                questions.len()
            ),
        }
    }
}
