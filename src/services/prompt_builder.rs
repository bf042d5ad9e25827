//! 提示词构建 - 业务能力层
//!
//! 只负责把模板渲染成提示词，模板内容由配置注入。

use crate::config::PromptTemplates;
use crate::models::{AssessmentRecord, Complexity, Proficiency, TopicEntry};

/// 一个校验任务的提示词及其覆盖的题干
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPrompt {
    pub prompt: String,
    pub questions: Vec<String>,
}

/// 提示词构建器
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: PromptTemplates,
    questions_per_job: usize,
}

impl PromptBuilder {
    pub fn new(templates: PromptTemplates, questions_per_job: usize) -> Self {
        Self {
            templates,
            questions_per_job,
        }
    }

    pub fn generation_system(&self) -> &str {
        &self.templates.generation_system
    }

    pub fn validation_system(&self) -> &str {
        &self.templates.validation_system
    }

    /// 渲染生成任务的提示词
    pub fn generation_prompt(
        &self,
        entry: &TopicEntry,
        proficiency: Proficiency,
        complexity: Complexity,
        model: &str,
    ) -> String {
        self.templates
            .generation
            .replace("{count}", &self.questions_per_job.to_string())
            .replace("{complexity}", complexity.name())
            .replace("{proficiency}", proficiency.name())
            .replace("{subject}", &entry.subject)
            .replace("{topic}", &entry.topic)
            .replace("{model}", model)
    }

    /// 把一批题目渲染成一个校验提示词
    ///
    /// 空列表返回 `None`。
    pub fn validation_prompt(&self, records: &[AssessmentRecord]) -> Option<ValidationPrompt> {
        if records.is_empty() {
            return None;
        }

        let mut prompt = String::new();
        for (idx, record) in records.iter().enumerate() {
            let [o1, o2, o3, o4] = record.all_options();
            prompt.push_str(
                &self
                    .templates
                    .validation_item
                    .replace("{index}", &(idx + 1).to_string())
                    .replace("{question}", record.question())
                    .replace("{option1}", o1)
                    .replace("{option2}", o2)
                    .replace("{option3}", o3)
                    .replace("{option4}", o4),
            );
        }
        prompt.push_str(&self.templates.validation_footer);

        Some(ValidationPrompt {
            prompt,
            questions: records.iter().map(|r| r.question().to_string()).collect(),
        })
    }

    /// 按 `batch_size` 分批渲染校验提示词，覆盖且只覆盖给定的题目
    pub fn validation_prompts(
        &self,
        records: &[AssessmentRecord],
        batch_size: usize,
    ) -> Vec<ValidationPrompt> {
        records
            .chunks(batch_size.max(1))
            .filter_map(|chunk| self.validation_prompt(chunk))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question: &str) -> AssessmentRecord {
        AssessmentRecord::new(
            question,
            "A",
            ["A".into(), "B".into(), "C".into(), "D".into()],
        )
    }

    fn builder() -> PromptBuilder {
        let templates = PromptTemplates {
            generation: "{count}|{complexity}|{proficiency}|{subject}|{topic}|{model}".into(),
            validation_item: "[{index}:{question}:{option1},{option2},{option3},{option4}]".into(),
            validation_footer: "END".into(),
            ..Default::default()
        };
        PromptBuilder::new(templates, 5)
    }

    #[test]
    fn test_generation_prompt_fills_every_placeholder() {
        let prompt = builder().generation_prompt(
            &TopicEntry::new("AI", "RAG"),
            Proficiency::Practitioner,
            Complexity::Difficult,
            "gemini",
        );
        assert_eq!(prompt, "5|Difficult|Practitioner|AI|RAG|gemini");
    }

    #[test]
    fn test_validation_prompt_lists_questions_in_order() {
        let vp = builder()
            .validation_prompt(&[record("Q1"), record("Q2")])
            .unwrap();
        assert_eq!(vp.prompt, "[1:Q1:A,B,C,D][2:Q2:A,B,C,D]END");
        assert_eq!(vp.questions, vec!["Q1".to_string(), "Q2".to_string()]);
    }

    #[test]
    fn test_validation_prompt_empty_is_none() {
        assert!(builder().validation_prompt(&[]).is_none());
    }

    #[test]
    fn test_validation_prompts_chunk_covers_all_questions() {
        let records: Vec<_> = (0..7).map(|i| record(&format!("Q{}", i))).collect();
        let prompts = builder().validation_prompts(&records, 3);

        assert_eq!(prompts.len(), 3);
        let covered: usize = prompts.iter().map(|p| p.questions.len()).sum();
        assert_eq!(covered, 7);
    }
}
