pub mod llm_client;
pub mod scripted;

pub use llm_client::{CompletionHandle, CompletionRequest, CompletionService, OpenAiCompletionService};
pub use scripted::{ScriptedCompletionService, ScriptedReply};
