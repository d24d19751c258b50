use serde::{Deserialize, Serialize};

use crate::application::use_cases::AnswerOutcome;
use crate::domain::entities::ScoredSegment;
use crate::domain::value_objects::Provenance;

#[derive(Debug, Deserialize)]
pub struct AnswerRequestDto {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponseDto {
    pub answer: String,
    pub sources: Vec<SourceDto>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SourceDto {
    pub provenance: Provenance,
    pub label: String,
    pub score: f32,
    pub text: String,
}

impl From<&ScoredSegment> for SourceDto {
    fn from(passage: &ScoredSegment) -> Self {
        Self {
            provenance: passage.segment.provenance().clone(),
            label: passage.segment.provenance().to_string(),
            score: passage.score,
            text: passage.segment.text().to_string(),
        }
    }
}

impl AnswerResponseDto {
    pub fn from_outcome(outcome: AnswerOutcome, elapsed_ms: u64) -> Self {
        Self {
            sources: outcome.context.passages().iter().map(SourceDto::from).collect(),
            answer: outcome.answer,
            elapsed_ms,
        }
    }
}
