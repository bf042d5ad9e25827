pub mod assessment;
pub mod job;
pub mod level;
pub mod loaders;

pub use assessment::{
    AssessmentRecord, MismatchSet, RawAssessment, RecordRejection, ResultMapping,
    ValidatedAnswer, OPTION_COUNT,
};
pub use job::{Job, JobKind, TopicEntry};
pub use level::{Complexity, Proficiency};
pub use loaders::{load_prompt_templates, load_topics, parse_topics};
