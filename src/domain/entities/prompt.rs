use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// The three fixed parts sent to the generation model, in this order:
/// system instruction, context block, question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    system_instruction: String,
    context: String,
    question: String,
}

impl Prompt {
    pub fn new(system_instruction: String, context: String, question: String) -> Self {
        Self {
            system_instruction,
            context,
            question,
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn user_message(&self) -> String {
        format!("Context:\n{}\n\nQuestion: {}", self.context, self.question)
    }

    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_instruction.clone()),
            ChatMessage::user(self.user_message()),
        ]
    }

    /// Flat rendering of everything the model sees, used for logging and inspection.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system_instruction, self.user_message())
    }
}
