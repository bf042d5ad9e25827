//! 结果解析 - 业务能力层
//!
//! 从 LLM 返回的原始文本中提取结构化数组。原始文本可能带有说明文字、
//! markdown 代码块，或者多段数组；任何一段解析失败都只记录日志并跳过，
//! 解析函数本身从不返回错误。

use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::models::{AssessmentRecord, RawAssessment, ValidatedAnswer};
use crate::services::prompt_builder::{PromptBuilder, ValidationPrompt};
use crate::utils::logging::truncate_text;

/// 单个原始文本的提取结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<AssessmentRecord>,
    /// 覆盖 `records` 的校验提示词；没有题目时为 `None`
    pub validation_prompt: Option<ValidationPrompt>,
}

/// 提取生成的题目，并为它们构建校验提示词
pub fn extract_assessments(
    payload: &str,
    fallback_generator: &str,
    prompts: &PromptBuilder,
) -> Extraction {
    let mut records = Vec::new();

    for raw in parse_segments::<RawAssessment>(payload) {
        let preview = truncate_text(&raw.question, 60);
        match raw.into_record(fallback_generator) {
            Ok(record) => records.push(record),
            Err(reason) => warn!("⚠️ 跳过题目 '{}': {}", preview, reason),
        }
    }

    let validation_prompt = prompts.validation_prompt(&records);
    Extraction {
        records,
        validation_prompt,
    }
}

/// 提取校验答案，题干为空的条目被丢弃
pub fn extract_validated(payload: &str) -> Vec<ValidatedAnswer> {
    parse_segments::<ValidatedAnswer>(payload)
        .into_iter()
        .filter(|v| !v.question.trim().is_empty())
        .collect()
}

/// 把原始文本切分成若干段，逐段按 JSON 数组解析
pub fn parse_segments<T: DeserializeOwned>(payload: &str) -> Vec<T> {
    let mut items = Vec::new();

    for (idx, segment) in split_segments(payload).into_iter().enumerate() {
        match serde_json::from_str::<Option<Vec<T>>>(segment) {
            Ok(parsed) => {
                let parsed = parsed.unwrap_or_default();
                debug!("第 {} 段解析出 {} 条记录", idx + 1, parsed.len());
                items.extend(parsed);
            }
            Err(e) => {
                warn!(
                    "⚠️ 第 {} 段内容解析失败，已跳过: {} | {}",
                    idx + 1,
                    e,
                    truncate_text(segment, 80)
                );
            }
        }
    }

    items
}

fn fence_regex() -> &'static regex::Regex {
    static FENCE: OnceLock<regex::Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        regex::Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("代码块正则无效")
    })
}

/// 代码块优先；没有代码块时整段文本作为一个块。每个块再切分出顶层数组。
fn split_segments(payload: &str) -> Vec<&str> {
    let blocks: Vec<&str> = fence_regex()
        .captures_iter(payload)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    let blocks = if blocks.is_empty() { vec![payload] } else { blocks };
    blocks.into_iter().flat_map(top_level_arrays).collect()
}

/// 找出文本中所有顶层 `[...]` 片段
///
/// 遇到未闭合的 `[` 时丢弃它，从它的下一个字符重新扫描，
/// 后面完整的数组仍然会被找到；一个数组都没有时返回整段文本（例如 `null`）。
fn top_level_arrays(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(unclosed) = scan_arrays(&text[from..], &mut spans) {
        let at = from + unclosed;
        warn!("⚠️ 数组未闭合，已跳过: {}", truncate_text(&text[at..], 80));
        // `[` 占一个字节
        from = at + 1;
    }

    if spans.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            spans.push(trimmed);
        }
    }

    spans
}

/// 把 `text` 中闭合的顶层数组追加到 `spans`，返回未闭合数组的起点
fn scan_arrays<'a>(text: &'a str, spans: &mut Vec<&'a str>) -> Option<usize> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '[' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptTemplates;

    fn prompts() -> PromptBuilder {
        PromptBuilder::new(PromptTemplates::default(), 5)
    }

    fn assessment_json(question: &str) -> String {
        format!(
            r#"{{"Subject":"AI","Topic":"RAG","Proficiency":"Learner","Question":"{}","Answer":"A",
               "AllOptions":["A","B","C","D"],"Reasoning":"r","Complexity":"Easy","Source":"None","LLMName":"g"}}"#,
            question
        )
    }

    #[test]
    fn test_plain_array_payload() {
        let payload = format!("[{},{}]", assessment_json("Q1"), assessment_json("Q2"));
        let extraction = extract_assessments(&payload, "fallback", &prompts());

        assert_eq!(extraction.records.len(), 2);
        let vp = extraction.validation_prompt.unwrap();
        assert_eq!(vp.questions, vec!["Q1".to_string(), "Q2".to_string()]);
    }

    #[test]
    fn test_invalid_segment_then_valid_segment_keeps_valid_only() {
        let payload = format!(
            "Here you go:\n```json\n[{{\"Question\": \"broken\", \n```\nand\n```json\n[{}]\n```",
            assessment_json("Q-valid")
        );
        let extraction = extract_assessments(&payload, "fallback", &prompts());

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].question(), "Q-valid");
    }

    #[test]
    fn test_unfenced_multiple_arrays_with_prose() {
        let payload = format!(
            "first batch [{}] oops [not json] second [{}]",
            assessment_json("Q1"),
            assessment_json("Q2")
        );
        let records = parse_segments::<RawAssessment>(&payload);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_unfenced_truncated_array_then_valid_array() {
        let payload = format!(
            "[{{\"Question\":\"broken\",\n[{}]",
            assessment_json("Q-valid")
        );
        let records = parse_segments::<RawAssessment>(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "Q-valid");
    }

    #[test]
    fn test_unclosed_array_alone_yields_nothing() {
        assert!(parse_segments::<RawAssessment>("[{\"Question\":\"Q1\"").is_empty());
    }

    #[test]
    fn test_brackets_inside_strings_do_not_split() {
        let payload = format!("[{}]", assessment_json("What does x[0] return?"));
        let records = parse_segments::<RawAssessment>(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "What does x[0] return?");
    }

    #[test]
    fn test_malformed_payload_yields_nothing() {
        let extraction = extract_assessments("{not: valid json", "fallback", &prompts());
        assert!(extraction.records.is_empty());
        assert!(extraction.validation_prompt.is_none());
    }

    #[test]
    fn test_null_and_empty_arrays_are_zero_records() {
        assert!(parse_segments::<RawAssessment>("null").is_empty());
        assert!(parse_segments::<RawAssessment>("[]").is_empty());
        assert!(parse_segments::<RawAssessment>("").is_empty());
    }

    #[test]
    fn test_record_with_wrong_option_count_is_skipped() {
        let bad = r#"{"Question":"Q3","Answer":"A","AllOptions":["A","B"]}"#;
        let payload = format!("[{},{}]", assessment_json("Q1"), bad);
        let extraction = extract_assessments(&payload, "fallback", &prompts());

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].question(), "Q1");
    }

    #[test]
    fn test_extract_validated_drops_blank_questions() {
        let payload = r#"[{"Question":"Q1","ValidatedAnswer":"A","ValidatedReasoning":"r"},
                          {"Question":"  ","ValidatedAnswer":"B"}]"#;
        let validated = extract_validated(payload);

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].validated_answer, "A");
    }
}
