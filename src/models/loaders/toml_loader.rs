use crate::config::PromptTemplates;
use crate::error::{AppResult, FileError};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载提示词模板
///
/// 文件中缺失的键使用内置默认模板。
pub async fn load_prompt_templates(toml_file_path: &Path) -> AppResult<PromptTemplates> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| FileError::from_read(toml_file_path.display().to_string(), e))?;

    let templates: PromptTemplates =
        toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
            path: toml_file_path.display().to_string(),
            source: e,
        })?;

    tracing::info!(
        "正在使用提示词模板: {}",
        toml_file_path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(templates)
}
