use assessment_bank::clients::{CompletionRequest, ScriptedCompletionService, ScriptedReply};
use assessment_bank::config::{Config, PromptTemplates};
use assessment_bank::models::{Complexity, Proficiency, TopicEntry};
use assessment_bank::orchestrator::{App, AssessmentPipeline};
use assessment_bank::services::PromptBuilder;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const GEN_MODEL: &str = "gen-model";
const VAL_MODEL: &str = "val-model";

/// 生成提示词为 `{topic}|{proficiency}|{complexity}`，校验提示词每行一个题干
fn templates() -> PromptTemplates {
    PromptTemplates {
        generation: "{topic}|{proficiency}|{complexity}".into(),
        validation_item: "{question}\n".into(),
        validation_footer: String::new(),
        ..Default::default()
    }
}

/// 把 [`templates`] 写成 TOML，供从文件加载模板的 [`App`] 使用
fn write_templates(dir: &Path) -> String {
    let path = dir.join("prompts.toml");
    std::fs::write(
        &path,
        concat!(
            "generation = \"{topic}|{proficiency}|{complexity}\"\n",
            "validation_item = \"{question}\\n\"\n",
            "validation_footer = \"\"\n",
        ),
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

fn config(dir: &Path) -> Config {
    Config {
        generation_workers: 4,
        validation_workers: 4,
        questions_per_job: 5,
        output_dir: dir.to_string_lossy().into_owned(),
        output_log_file: dir.join("run.log").to_string_lossy().into_owned(),
        topics_file: dir.join("topics.csv").to_string_lossy().into_owned(),
        phase_cooldown_secs: 0,
        generation_model: GEN_MODEL.into(),
        validation_model: VAL_MODEL.into(),
        ..Default::default()
    }
}

fn pipeline(config: Config, service: &ScriptedCompletionService) -> AssessmentPipeline {
    let prompts = PromptBuilder::new(templates(), config.questions_per_job);
    AssessmentPipeline::new(config, prompts, Arc::new(service.clone()))
}

fn generated(questions: impl IntoIterator<Item = String>) -> String {
    let items: Vec<_> = questions
        .into_iter()
        .map(|q| {
            json!({
                "Subject": "AI",
                "Topic": "RAG",
                "Question": q,
                "Answer": "A",
                "AllOptions": ["A", "B", "C", "D"],
                "Reasoning": "r",
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// 对提示词中的每个题干给出答案
fn validated(request: &CompletionRequest, answer: impl Fn(&str) -> &'static str) -> String {
    let items: Vec<_> = request
        .prompt
        .lines()
        .filter(|l| !l.is_empty())
        .map(|q| {
            json!({
                "Question": q,
                "ValidatedAnswer": answer(q),
                "ValidatedReasoning": "checked",
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

fn validation_requests(service: &ScriptedCompletionService) -> Vec<CompletionRequest> {
    service
        .requests()
        .into_iter()
        .filter(|r| r.model == VAL_MODEL)
        .collect()
}

#[tokio::test]
async fn test_generation_tolerates_failed_and_malformed_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let service = ScriptedCompletionService::new(|req| {
        if req.prompt.ends_with("Learner|Easy") {
            ScriptedReply::Fail("connection reset".into())
        } else if req.prompt.ends_with("Learner|Medium") {
            ScriptedReply::payload("{\"Question\": oops")
        } else {
            ScriptedReply::payload(generated((0..5).map(|i| format!("{} #{}", req.prompt, i))))
        }
    })
    .with_latency(Duration::from_millis(5));

    let pipeline = pipeline(config(dir.path()), &service);
    let (batch, report) = pipeline.generate(&[TopicEntry::new("AI", "RAG")]).await.unwrap();

    assert_eq!(report.jobs, 9);
    assert_eq!(report.stats.outcomes, 9);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.empty, 1);
    assert_eq!(report.stats.records, 35);
    assert!(batch.mapping.len() <= 35);
    assert_eq!(batch.validation_prompts.len(), 7);
    assert_eq!(service.opened(), service.released());
    assert!(service.max_in_flight() <= 4);
}

#[tokio::test]
async fn test_second_round_covers_only_mismatches() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        proficiencies: vec![Proficiency::Learner],
        complexities: vec![Complexity::Easy],
        ..config(dir.path())
    };
    let service = ScriptedCompletionService::new(|req| {
        if req.model == GEN_MODEL {
            return ScriptedReply::payload(generated((0..20).map(|i| format!("Q{:02}", i))));
        }
        let first_round = req.prompt.lines().filter(|l| !l.is_empty()).count() == 20;
        ScriptedReply::payload(validated(req, |q| {
            if first_round {
                if matches!(q, "Q00" | "Q01" | "Q02") {
                    "B"
                } else {
                    "A"
                }
            } else if q == "Q00" {
                "A"
            } else {
                "C"
            }
        }))
    });

    let report = pipeline(cfg, &service)
        .run(&[TopicEntry::new("AI", "RAG")])
        .await
        .unwrap();

    assert_eq!(report.rounds.len(), 2);
    assert_eq!(report.rounds[0].questions, 20);
    assert_eq!(report.rounds[0].reconcile.mismatched(), 3);
    assert_eq!(report.rounds[1].questions, 3);
    assert_eq!(report.rounds[1].reconcile.total, 3);
    assert_eq!(report.rounds[1].reconcile.matched, 1);

    assert_eq!(report.mapping.len(), 20);
    assert_eq!(report.confirmed(), 18);
    assert_eq!(report.remaining_mismatches(), 2);
    assert_eq!(report.unconfirmed(), 2);
    assert_eq!(report.mapping.get("Q01").unwrap().validated_answer(), "C");
    assert_eq!(report.mapping.get("Q05").unwrap().validated_generator_identity(), VAL_MODEL);

    let requests = validation_requests(&service);
    assert_eq!(requests.len(), 2);
    let second: Vec<&str> = requests[1].prompt.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(second, vec!["Q00", "Q01", "Q02"]);

    for name in [
        "generatedAssessments.csv",
        "generatedAssessmentsValidated-1.csv",
        "generatedAssessmentsValidated-2.csv",
    ] {
        assert!(dir.path().join(name).exists(), "missing {}", name);
    }
}

#[tokio::test]
async fn test_full_agreement_stops_after_first_round() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        complexities: vec![Complexity::Easy],
        ..config(dir.path())
    };
    let service = ScriptedCompletionService::new(|req| {
        if req.model == GEN_MODEL {
            ScriptedReply::payload(generated((0..4).map(|i| format!("{} #{}", req.prompt, i))))
        } else {
            ScriptedReply::payload(validated(req, |_| "A"))
        }
    });

    let report = pipeline(cfg, &service)
        .run(&[TopicEntry::new("AI", "RAG")])
        .await
        .unwrap();

    assert_eq!(report.mapping.len(), 12);
    assert_eq!(report.rounds.len(), 1);
    assert_eq!(report.confirmed(), 12);
    assert!(report.mapping.iter().all(|r| !r.validated_reasoning().is_empty()));
    assert!(!dir.path().join("generatedAssessmentsValidated-2.csv").exists());
}

#[tokio::test]
async fn test_app_reads_topics_and_writes_delimited_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("topics.csv"),
        "# subject,topic\nAI,RAG\n\"Cloud, Native\",Kubernetes\n",
    )
    .unwrap();
    let templates_file = write_templates(dir.path());
    let cfg = Config {
        prompt_templates_file: Some(templates_file),
        proficiencies: vec![Proficiency::Practitioner],
        complexities: vec![Complexity::Medium],
        validation_rounds: 1,
        ..config(dir.path())
    };
    let service = ScriptedCompletionService::new(|req| {
        if req.model == GEN_MODEL {
            ScriptedReply::payload(generated([format!("What about {}?", req.prompt)]))
        } else {
            ScriptedReply::payload(validated(req, |_| "B"))
        }
    });

    let app = App::with_service(cfg, Arc::new(service.clone())).await.unwrap();
    let report = app.run().await.unwrap();

    assert_eq!(report.generation.jobs, 2);
    assert_eq!(report.mapping.len(), 2);
    assert_eq!(report.remaining_mismatches(), 2);
    assert_eq!(report.unconfirmed(), 2);
    assert!(service
        .requests()
        .iter()
        .any(|r| r.model == GEN_MODEL && r.prompt == "Kubernetes|Practitioner|Medium"));

    let written = std::fs::read_to_string(dir.path().join("generatedAssessmentsValidated-1.csv")).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Subject;Topic;Proficiency;Complexity;Question"));
    assert!(lines[1].ends_with(";B;checked;val-model"));

    let log = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
    assert!(!log.is_empty());
}

#[tokio::test]
async fn test_app_fails_when_topics_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let service = ScriptedCompletionService::new(|_| ScriptedReply::payload("[]"));

    let app = App::with_service(config(dir.path()), Arc::new(service)).await.unwrap();
    let result = app.run().await;

    assert!(result.is_err());
    assert!(!dir.path().join("generatedAssessments.csv").exists());
}
