use thiserror::Error;

use crate::models::{Role, VoteCategory};

/// Why a score or ballot submission was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("a submission already exists for this {0} in period {1}")]
    DuplicateSubmission(&'static str, String),
    #[error("submitters cannot target themselves")]
    SelfTarget,
    #[error("{field} score {value} is outside 0..=100")]
    OutOfRangeScore { field: &'static str, value: i32 },
    #[error("{0} subjects cannot be assessed")]
    IneligibleTarget(Role),
    #[error("{role} subjects are not candidates for {category}")]
    IneligibleCandidate { category: VoteCategory, role: Role },
    #[error("{0} role may not submit assessments")]
    EvaluatorNotPermitted(Role),
    #[error("no subject named {0}")]
    UnknownSubject(String),
}

impl SubmissionError {
    pub fn duplicate_assessment(period: &str) -> Self {
        SubmissionError::DuplicateSubmission("evaluator and target", period.to_string())
    }

    pub fn duplicate_ballot(period: &str) -> Self {
        SubmissionError::DuplicateSubmission("voter and category", period.to_string())
    }
}
