// Notifications pushed to realtime clients after each board mutation.

use serde::{Deserialize, Serialize};

use crate::model::{Question, Reply};

/// Greeting sent to every client right after it connects.
pub const WELCOME_MESSAGE: &str = "Welcome";

/// A board change, serialized as `{"type": "...", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BoardEvent {
    Connected {
        message: String,
    },
    QuestionCreated(Question),
    #[serde(rename_all = "camelCase")]
    ReplyAdded {
        question_id: String,
        reply: Reply,
    },
    #[serde(rename_all = "camelCase")]
    QuestionDeleted {
        question_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ReplyDeleted {
        question_id: String,
        reply_id: String,
    },
    QuestionsCleared {
        removed: usize,
    },
}

impl BoardEvent {
    pub fn welcome() -> Self {
        BoardEvent::Connected {
            message: WELCOME_MESSAGE.to_string(),
        }
    }

    /// Wire name of the event (the `type` field).
    pub fn kind(&self) -> &'static str {
        match self {
            BoardEvent::Connected { .. } => "connected",
            BoardEvent::QuestionCreated(_) => "question_created",
            BoardEvent::ReplyAdded { .. } => "reply_added",
            BoardEvent::QuestionDeleted { .. } => "question_deleted",
            BoardEvent::ReplyDeleted { .. } => "reply_deleted",
            BoardEvent::QuestionsCleared { .. } => "questions_cleared",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
