pub mod extractor;
pub mod prompt_builder;
pub mod rate_limiter;
pub mod results_writer;

pub use extractor::{extract_assessments, extract_validated, parse_segments, Extraction};
pub use prompt_builder::{PromptBuilder, ValidationPrompt};
pub use rate_limiter::RateLimiter;
pub use results_writer::ResultsWriter;
