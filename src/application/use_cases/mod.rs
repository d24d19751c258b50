pub mod answer_question;
pub mod build_index;

pub use answer_question::{AnswerOutcome, QueryError, QueryPipeline, QuerySettings};
pub use build_index::{BuildIndexRequest, BuildIndexResponse, BuildIndexUseCase, IngestionError};
