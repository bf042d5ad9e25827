use crate::error::ConfigError;
use crate::models::level::{Complexity, Proficiency};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 生成阶段的 worker 数量
    pub generation_workers: usize,
    /// 校验阶段的 worker 数量
    pub validation_workers: usize,
    /// 每个生成任务要求的题目数量
    pub questions_per_job: usize,
    /// 主题文件路径
    pub topics_file: String,
    /// 输出目录
    pub output_dir: String,
    /// 输出文件的字段分隔符
    pub output_delimiter: char,
    /// 运行日志文件
    pub output_log_file: String,
    /// 提示词模板文件（TOML，可选）
    pub prompt_templates_file: Option<String>,
    /// 参与生成的能力等级
    pub proficiencies: Vec<Proficiency>,
    /// 参与生成的难度
    pub complexities: Vec<Complexity>,
    // --- 校验配置 ---
    /// 校验轮数（第一轮覆盖全部题目，之后每轮只覆盖上一轮的不一致题目）
    pub validation_rounds: usize,
    /// 第二轮起每个校验任务包含的题目数量
    pub validation_batch_size: usize,
    // --- 限流配置 ---
    /// 每分钟请求数，0 表示不限流
    pub requests_per_minute: u32,
    /// 阶段之间的冷却时间（秒）
    pub phase_cooldown_secs: u64,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub generation_model: String,
    pub validation_model: String,
    pub temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation_workers: 4,
            validation_workers: 4,
            questions_per_job: 20,
            topics_file: "TopicsforAssessmentGeneration.csv".to_string(),
            output_dir: ".".to_string(),
            output_delimiter: ';',
            output_log_file: "assessment_run.log".to_string(),
            prompt_templates_file: None,
            proficiencies: Proficiency::all(),
            complexities: Complexity::all(),
            validation_rounds: 2,
            validation_batch_size: 20,
            requests_per_minute: 0,
            phase_cooldown_secs: 60,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            generation_model: "gemini-1.5-flash".to_string(),
            validation_model: "gemini-1.5-flash-8b".to_string(),
            temperature: 0.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            generation_workers: env_parse("GENERATION_WORKERS").unwrap_or(default.generation_workers),
            validation_workers: env_parse("VALIDATION_WORKERS").unwrap_or(default.validation_workers),
            questions_per_job: env_parse("QUESTIONS_PER_JOB").unwrap_or(default.questions_per_job),
            topics_file: std::env::var("TOPICS_FILE").unwrap_or(default.topics_file),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            output_delimiter: std::env::var("OUTPUT_DELIMITER")
                .ok()
                .and_then(|v| parse_delimiter(&v))
                .unwrap_or(default.output_delimiter),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            prompt_templates_file: std::env::var("PROMPT_TEMPLATES_FILE").ok().filter(|v| !v.is_empty()),
            proficiencies: std::env::var("PROFICIENCIES")
                .ok()
                .map(|v| parse_list(&v, "PROFICIENCIES", Proficiency::from_str))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.proficiencies),
            complexities: std::env::var("COMPLEXITIES")
                .ok()
                .map(|v| parse_list(&v, "COMPLEXITIES", Complexity::from_str))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.complexities),
            validation_rounds: env_parse("VALIDATION_ROUNDS").unwrap_or(default.validation_rounds),
            validation_batch_size: env_parse("VALIDATION_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.validation_batch_size),
            requests_per_minute: env_parse("REQUESTS_PER_MINUTE").unwrap_or(default.requests_per_minute),
            phase_cooldown_secs: env_parse("PHASE_COOLDOWN_SECS").unwrap_or(default.phase_cooldown_secs),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            generation_model: std::env::var("GENERATION_MODEL").unwrap_or(default.generation_model),
            validation_model: std::env::var("VALIDATION_MODEL").unwrap_or(default.validation_model),
            temperature: env_parse("LLM_TEMPERATURE").unwrap_or(default.temperature),
        }
    }

    /// 检查不能由环境变量兜底的组合
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proficiencies.is_empty() {
            return Err(ConfigError::Empty {
                name: "PROFICIENCIES".to_string(),
            });
        }
        if self.complexities.is_empty() {
            return Err(ConfigError::Empty {
                name: "COMPLEXITIES".to_string(),
            });
        }
        if matches!(self.output_delimiter, ',' | '"' | '\n' | '\r') {
            return Err(ConfigError::UnknownValue {
                name: "OUTPUT_DELIMITER".to_string(),
                value: self.output_delimiter.escape_default().to_string(),
            });
        }
        Ok(())
    }

    pub fn phase_cooldown(&self) -> Duration {
        Duration::from_secs(self.phase_cooldown_secs)
    }

    /// 生成阶段输出文件
    pub fn generation_output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join("generatedAssessments.csv")
    }

    /// 第 `round` 轮校验后的输出文件
    pub fn validation_output_path(&self, round: usize) -> PathBuf {
        PathBuf::from(&self.output_dir).join(format!("generatedAssessmentsValidated-{}.csv", round))
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// 解析输出分隔符：恰好一个字符（不做 trim，制表符可以直接使用），或转义写法 `\t`
///
/// 逗号、引号和换行不能作为分隔符。
fn parse_delimiter(raw: &str) -> Option<char> {
    let delimiter = if raw == "\\t" {
        '\t'
    } else {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                warn!("⚠️ OUTPUT_DELIMITER 的值 '{}' 不是单个字符，已忽略", raw.escape_default());
                return None;
            }
        }
    };

    if matches!(delimiter, ',' | '"' | '\n' | '\r') {
        warn!("⚠️ OUTPUT_DELIMITER 不能是 '{}'，已忽略", delimiter.escape_default());
        return None;
    }
    Some(delimiter)
}

/// 解析逗号分隔的列表，无法识别的项记录警告后跳过
fn parse_list<T>(raw: &str, name: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let parsed = parse(s);
            if parsed.is_none() {
                warn!("⚠️ {} 中的值 '{}' 无法识别，已忽略", name, s);
            }
            parsed
        })
        .collect()
}

/// 提示词模板
///
/// 生成模板占位符：`{count}` `{complexity}` `{proficiency}` `{subject}` `{topic}` `{model}`；
/// 校验条目占位符：`{index}` `{question}` `{option1}`..`{option4}`。
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptTemplates {
    pub generation_system: String,
    pub generation: String,
    pub validation_system: String,
    pub validation_item: String,
    pub validation_footer: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            generation_system: DEFAULT_GENERATION_SYSTEM.to_string(),
            generation: DEFAULT_GENERATION.to_string(),
            validation_system: DEFAULT_VALIDATION_SYSTEM.to_string(),
            validation_item: DEFAULT_VALIDATION_ITEM.to_string(),
            validation_footer: DEFAULT_VALIDATION_FOOTER.to_string(),
        }
    }
}

const DEFAULT_GENERATION_SYSTEM: &str = r#"You are an expert in the given Subject. You are tasked to generate a set of multiple choice assessments
for evaluating a Talent based on their proficiency on multiple Topics in a particular Subject area.
The talent belongs to one of the following Proficiencies in increasing order of expertise: Learner, Practitioner or Specialist.
1) Learner      : foundation level, aware of the basic concepts with minimal practical experience.
2) Practitioner : advanced understanding and meaningful practical experience over a few years.
3) Specialist   : deep expertise and meaningful practical experience over many years.

Questions have one of the following Complexities:
1) Easy      : basic knowledge, no ambiguity, a single calculation or task.
2) Medium    : deeper understanding, involves reasoning.
3) Difficult : combines different ideas, demands analysis, evaluation and synthesis.

Do not hallucinate. If you are not aware, say so courteously."#;

const DEFAULT_GENERATION: &str = r#"Build an assessment bank of at least {count} questions of {complexity} Complexity for evaluating the Proficiency of a {proficiency} on the Subject of {subject}.

Step 1) Ask a relevant Question on the Topic of {topic} within the context of {subject}.
Step 2) If the Question is a repeat, ask a different relevant Question.
Step 3) List the Answer to the Question in no more than 5 words.
Step 4) Generate 3 other similar answers in no more than 5 words each.
Step 5) Return the answers from Step 3 and Step 4 as a single list named AllOptions.
Step 6) Articulate why the Answer is right as Reasoning.
Step 7) Estimate the Complexity of the question as Easy, Medium or Difficult.
Step 8) Highlight the Source of the question, or say None.
Step 9) Report the name and version of the model used as LLMName.

Return the results using this JSON schema:
Assessment = {'Subject': string, 'Topic': string, 'Proficiency': string, 'Question': string, 'Answer': string, 'AllOptions': [string], 'Reasoning': string, 'Complexity': string, 'Source': string, 'LLMName': {model}}
Return: Array<Assessment>"#;

const DEFAULT_VALIDATION_SYSTEM: &str = r#"Answer the following questions to the best of your knowledge.
For each question choose only one of the listed options that accurately reflects the ask and articulate why it is the right answer.
If you do not know the answer, say I do not know. If the right option does not exist, say The right option is not listed."#;

const DEFAULT_VALIDATION_ITEM: &str = r#"

Question {index}:
{question}

Options:
{option1}
{option2}
{option3}
{option4}
I do not know
The right option is not listed"#;

const DEFAULT_VALIDATION_FOOTER: &str = r#"

Return the results using this JSON schema:
ValidatedAssessment = {'Question': string, 'ValidatedAnswer': string, 'ValidatedReasoning': string}
Return: Array<ValidatedAssessment>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runs_exactly_two_validation_rounds() {
        let config = Config::default();
        assert_eq!(config.validation_rounds, 2);
        assert_eq!(config.output_delimiter, ';');
        assert_eq!(config.proficiencies.len() * config.complexities.len(), 9);
    }

    #[test]
    fn test_output_paths() {
        let config = Config {
            output_dir: "out".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validation_output_path(2),
            PathBuf::from("out").join("generatedAssessmentsValidated-2.csv")
        );
    }

    #[test]
    fn test_validate_rejects_empty_levels_and_comma_delimiter() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            complexities: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Empty { .. })));

        let config = Config {
            output_delimiter: ',',
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::UnknownValue { .. })));
    }

    #[test]
    fn test_tab_delimiter_is_not_trimmed_away() {
        assert_eq!(parse_delimiter("\t"), Some('\t'));
        assert_eq!(parse_delimiter("\\t"), Some('\t'));
        assert_eq!(parse_delimiter("|"), Some('|'));
        assert_eq!(parse_delimiter(","), None);
        assert_eq!(parse_delimiter(""), None);
        assert_eq!(parse_delimiter(";;"), None);
    }

    #[test]
    fn test_from_env_reads_tab_delimiter() {
        std::env::set_var("OUTPUT_DELIMITER", "\t");
        let config = Config::from_env();
        std::env::remove_var("OUTPUT_DELIMITER");

        assert_eq!(config.output_delimiter, '\t');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_list_skips_unknown() {
        let parsed = parse_list("learner, wizard ,expert", "PROFICIENCIES", Proficiency::from_str);
        assert_eq!(parsed, vec![Proficiency::Learner, Proficiency::Specialist]);
    }

    #[test]
    fn test_default_templates_carry_placeholders() {
        let templates = PromptTemplates::default();
        for key in ["{count}", "{complexity}", "{proficiency}", "{subject}", "{topic}", "{model}"] {
            assert!(templates.generation.contains(key), "missing {}", key);
        }
        assert!(templates.validation_item.contains("{option4}"));
    }
}
