pub mod toml_loader;
pub mod topic_loader;

pub use toml_loader::load_prompt_templates;
pub use topic_loader::{load_topics, parse_topics};
