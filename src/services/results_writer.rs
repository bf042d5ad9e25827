//! 结果写入服务 - 业务能力层
//!
//! 只负责把题目映射写成分隔符文件，不关心流程

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AppResult, FileError};
use crate::models::{AssessmentRecord, ResultMapping};

/// 输出文件的列顺序
pub const HEADER: [&str; 16] = [
    "Subject",
    "Topic",
    "Proficiency",
    "Complexity",
    "Question",
    "Option1",
    "Option2",
    "Option3",
    "Option4",
    "Answer",
    "Reasoning",
    "Source",
    "GeneratorIdentity",
    "ValidatedAnswer",
    "ValidatedReasoning",
    "ValidatedGeneratorIdentity",
];

/// 结果写入服务
///
/// 自由文本字段可能包含逗号，因此分隔符可配置（默认 `;`）；
/// 含分隔符、引号或换行的字段用双引号包裹，内部引号加倍。
pub struct ResultsWriter {
    delimiter: char,
}

impl ResultsWriter {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// 写入全部题目，返回写入的题目行数（不含表头）
    ///
    /// 无法创建输出文件属于致命错误。
    pub async fn write(&self, mapping: &ResultMapping, path: &Path) -> AppResult<usize> {
        debug!("写入结果: {} | 题目数: {}", path.display(), mapping.len());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FileError::write_failed(parent.display().to_string(), e))?;
        }

        let content = self.render(mapping);
        tokio::fs::write(path, content)
            .await
            .map_err(|e| FileError::write_failed(path.display().to_string(), e))?;

        info!("✓ 已写入 {} 道题目: {}", mapping.len(), display_name(path));
        Ok(mapping.len())
    }

    /// 渲染完整文件内容
    pub fn render(&self, mapping: &ResultMapping) -> String {
        let mut out = String::new();
        self.push_row(&mut out, HEADER.iter().copied());
        for record in mapping.iter() {
            self.push_row(&mut out, row_fields(record));
        }
        out
    }

    fn push_row<'a>(&self, out: &mut String, fields: impl Iterator<Item = &'a str>) {
        let sep = self.delimiter.to_string();
        let row: Vec<String> = fields.map(|f| self.escape(f)).collect();
        out.push_str(&row.join(&sep));
        out.push('\n');
    }

    fn escape(&self, field: &str) -> String {
        let needs_quotes = field.contains(self.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');
        if needs_quotes {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

fn row_fields(record: &AssessmentRecord) -> impl Iterator<Item = &str> {
    let [o1, o2, o3, o4] = record.all_options();
    [
        record.subject(),
        record.topic(),
        record.proficiency(),
        record.complexity(),
        record.question(),
        o1.as_str(),
        o2.as_str(),
        o3.as_str(),
        o4.as_str(),
        record.answer(),
        record.reasoning(),
        record.source(),
        record.generator_identity(),
        record.validated_answer(),
        record.validated_reasoning(),
        record.validated_generator_identity(),
    ]
    .into_iter()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
