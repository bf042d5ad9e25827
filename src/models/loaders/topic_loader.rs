use crate::error::{AppResult, FileError};
use crate::models::job::TopicEntry;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// 从逗号分隔的主题文件加载 (科目, 子主题) 列表
///
/// 文件只读取一次；读不到文件属于致命错误，由调用方终止运行。
pub async fn load_topics(path: &Path) -> AppResult<Vec<TopicEntry>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| FileError::from_read(path.display().to_string(), e))?;

    let topics = parse_topics(&content);
    info!(
        "✓ 从 {} 加载 {} 个主题",
        path.file_name().unwrap_or_default().to_string_lossy(),
        topics.len()
    );
    Ok(topics)
}

/// 解析主题文件内容
///
/// 空行和 `#` 开头的行被忽略；少于两列的行跳过并记录警告。
pub fn parse_topics(content: &str) -> Vec<TopicEntry> {
    let mut topics = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields = split_row(trimmed);
        match (fields.first(), fields.get(1)) {
            (Some(subject), Some(topic)) if !subject.is_empty() && !topic.is_empty() => {
                topics.push(TopicEntry::new(subject.clone(), topic.clone()));
            }
            _ => {
                warn!("⚠️ 第 {} 行格式不正确，已跳过: {}", line_no + 1, trimmed);
            }
        }
    }

    topics
}

/// 按逗号切分一行，支持双引号包裹的字段（`""` 表示一个引号）
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}
