use async_trait::async_trait;

use super::errors::DispatchResult;
use crate::domain::task::SubtaskSpec;

/// Splits a task description into ordered subtask templates
///
/// The engine treats the output as opaque input; implementations decide how
/// descriptions map to subtask types.
#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(&self, description: &str) -> DispatchResult<Vec<SubtaskSpec>>;
}

/// Keyword-triggered decomposition into fixed pipelines
///
/// A description mentioning "write" becomes research, outline, write, edit.
/// One mentioning "code" becomes design, implement, test, document. Anything
/// else yields no subtasks. Matching is case-insensitive and "write" wins
/// when both keywords appear.
#[derive(Debug, Clone, Default)]
pub struct KeywordDecomposer;

const WRITING_PIPELINE: [&str; 4] = ["research", "outline", "write", "edit"];
const CODING_PIPELINE: [&str; 4] = ["design", "implement", "test", "document"];

impl KeywordDecomposer {
    fn pipeline(description: &str) -> &'static [&'static str] {
        let description = description.to_lowercase();
        if description.contains("write") {
            &WRITING_PIPELINE
        } else if description.contains("code") {
            &CODING_PIPELINE
        } else {
            &[]
        }
    }
}

#[async_trait]
impl Decomposer for KeywordDecomposer {
    async fn decompose(&self, description: &str) -> DispatchResult<Vec<SubtaskSpec>> {
        let specs = Self::pipeline(description)
            .iter()
            .zip(1u32..)
            .map(|(kind, priority)| SubtaskSpec::new(*kind, priority))
            .collect();
        Ok(specs)
    }
}
