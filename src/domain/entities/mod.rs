pub mod content_unit;
pub mod prompt;
pub mod retrieved_context;
pub mod segment;

pub use content_unit::ContentUnit;
pub use prompt::{ChatMessage, ChatRole, Prompt};
pub use retrieved_context::{CONTEXT_DELIMITER, RetrievedContext, ScoredSegment};
pub use segment::Segment;
