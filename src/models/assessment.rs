use serde::Deserialize;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// 每道题固定的选项数量
pub const OPTION_COUNT: usize = 4;

/// LLM 生成结果中的单条题目（原始 JSON 形态）
///
/// 字段名与生成提示词中的 JSON schema 保持一致。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawAssessment {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub proficiency: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub all_options: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub complexity: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "LLMName")]
    pub llm_name: String,
}

/// 原始题目无法转换为 [`AssessmentRecord`] 的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    /// 题干为空
    EmptyQuestion,
    /// 选项数量不是 4 个
    WrongOptionCount(usize),
}

impl std::fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordRejection::EmptyQuestion => write!(f, "题干为空"),
            RecordRejection::WrongOptionCount(n) => {
                write!(f, "选项数量为 {}，应为 {}", n, OPTION_COUNT)
            }
        }
    }
}

impl RawAssessment {
    /// 转换为题目记录
    ///
    /// `fallback_generator` 在 LLM 没有填写 `LLMName` 时使用（通常是生成任务的模型名）。
    pub fn into_record(self, fallback_generator: &str) -> Result<AssessmentRecord, RecordRejection> {
        if self.question.trim().is_empty() {
            return Err(RecordRejection::EmptyQuestion);
        }
        let count = self.all_options.len();
        let all_options: [String; OPTION_COUNT] = self
            .all_options
            .try_into()
            .map_err(|_| RecordRejection::WrongOptionCount(count))?;

        let generator_identity = if self.llm_name.trim().is_empty() {
            fallback_generator.to_string()
        } else {
            self.llm_name
        };

        Ok(AssessmentRecord {
            subject: self.subject,
            topic: self.topic,
            proficiency: self.proficiency,
            question: self.question,
            answer: self.answer,
            all_options,
            reasoning: self.reasoning,
            complexity: self.complexity,
            source: self.source,
            generator_identity,
            validated_answer: String::new(),
            validated_reasoning: String::new(),
            validated_generator_identity: String::new(),
        })
    }
}

/// 一道选择题及其校验结果
///
/// 除 `validated_*` 外的字段在创建后只读；校验字段只能通过
/// [`AssessmentRecord::apply_validation`] 修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentRecord {
    subject: String,
    topic: String,
    proficiency: String,
    question: String,
    answer: String,
    all_options: [String; OPTION_COUNT],
    reasoning: String,
    complexity: String,
    source: String,
    generator_identity: String,
    validated_answer: String,
    validated_reasoning: String,
    validated_generator_identity: String,
}

impl AssessmentRecord {
    /// 创建题目记录，其余只读字段通过 `with_*` 在插入映射前补全
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        all_options: [String; OPTION_COUNT],
    ) -> Self {
        Self {
            subject: String::new(),
            topic: String::new(),
            proficiency: String::new(),
            question: question.into(),
            answer: answer.into(),
            all_options,
            reasoning: String::new(),
            complexity: String::new(),
            source: String::new(),
            generator_identity: String::new(),
            validated_answer: String::new(),
            validated_reasoning: String::new(),
            validated_generator_identity: String::new(),
        }
    }

    pub fn with_category(
        mut self,
        subject: impl Into<String>,
        topic: impl Into<String>,
        proficiency: impl Into<String>,
        complexity: impl Into<String>,
    ) -> Self {
        self.subject = subject.into();
        self.topic = topic.into();
        self.proficiency = proficiency.into();
        self.complexity = complexity.into();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_generator(mut self, generator_identity: impl Into<String>) -> Self {
        self.generator_identity = generator_identity.into();
        self
    }

    /// 写入一轮校验结果
    pub fn apply_validation(&mut self, validated: &ValidatedAnswer, validator_identity: &str) {
        self.validated_answer = validated.validated_answer.clone();
        self.validated_reasoning = validated.validated_reasoning.clone();
        self.validated_generator_identity = validator_identity.to_string();
    }

    /// 校验答案与原答案是否一致（精确字符串比较）
    pub fn is_confirmed(&self) -> bool {
        self.is_validated() && self.validated_answer == self.answer
    }

    /// 是否已经过至少一轮校验
    pub fn is_validated(&self) -> bool {
        !self.validated_generator_identity.is_empty()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn proficiency(&self) -> &str {
        &self.proficiency
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn all_options(&self) -> &[String; OPTION_COUNT] {
        &self.all_options
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn complexity(&self) -> &str {
        &self.complexity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn generator_identity(&self) -> &str {
        &self.generator_identity
    }

    pub fn validated_answer(&self) -> &str {
        &self.validated_answer
    }

    pub fn validated_reasoning(&self) -> &str {
        &self.validated_reasoning
    }

    pub fn validated_generator_identity(&self) -> &str {
        &self.validated_generator_identity
    }
}

/// 校验轮次中 LLM 独立给出的答案
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidatedAnswer {
    pub question: String,
    #[serde(default)]
    pub validated_answer: String,
    #[serde(default)]
    pub validated_reasoning: String,
}

/// 以题干文本为键的题目映射
///
/// 相同题干后写覆盖先写；覆盖次数记录在 `duplicates` 中，便于排查跨分类的题干冲突。
#[derive(Debug, Clone, Default)]
pub struct ResultMapping {
    entries: BTreeMap<String, AssessmentRecord>,
    duplicates: usize,
}

impl ResultMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入题目，返回被覆盖的旧记录
    pub fn insert(&mut self, record: AssessmentRecord) -> Option<AssessmentRecord> {
        let replaced = self.entries.insert(record.question.clone(), record);
        if replaced.is_some() {
            self.duplicates += 1;
        }
        replaced
    }

    pub fn get(&self, question: &str) -> Option<&AssessmentRecord> {
        self.entries.get(question)
    }

    pub fn contains(&self, question: &str) -> bool {
        self.entries.contains_key(question)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 被覆盖的题目数量
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// 按题干顺序遍历
    pub fn iter(&self) -> btree_map::Values<'_, String, AssessmentRecord> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, String, AssessmentRecord> {
        self.entries.values_mut()
    }
}

impl FromIterator<AssessmentRecord> for ResultMapping {
    fn from_iter<I: IntoIterator<Item = AssessmentRecord>>(iter: I) -> Self {
        let mut mapping = ResultMapping::new();
        for record in iter {
            mapping.insert(record);
        }
        mapping
    }
}

/// 校验答案与原答案不一致、或没有校验结果的题目
pub type MismatchSet = Vec<AssessmentRecord>;
