use crate::domain::entities::{Prompt, RetrievedContext};

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert in FSSAI food additives regulations.
You must only use the information retrieved from the provided documents.
Do not guess or hallucinate.
If you don't know the answer, say \"The document does not contain this information.\" Be gentle and helpful; do not be harsh to the user.";

/// Stands in for the context block when the index holds no segments.
pub const NO_CONTEXT_MARKER: &str = "NO CONTEXT AVAILABLE: the document index is empty. \
Reply that the document does not contain this information.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_instruction: String,
}

impl PromptBuilder {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn build(&self, question: &str, context: &RetrievedContext) -> Prompt {
        let context_block = if context.is_empty() {
            NO_CONTEXT_MARKER.to_string()
        } else {
            context.to_context_block()
        };

        Prompt::new(
            self.system_instruction.clone(),
            context_block,
            question.to_string(),
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_INSTRUCTION)
    }
}
