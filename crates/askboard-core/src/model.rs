// Question and reply records as stored and served over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level entry on the board. Owns its replies exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Opaque identifier, unique within the store.
    pub id: String,
    /// Free text as submitted.
    pub text: String,
    /// Wall-clock time the question was created.
    pub created_at: DateTime<Utc>,
    /// Replies in the order they were added.
    pub replies: Vec<Reply>,
}

/// A response attached to exactly one [`Question`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Build a question with a fresh identifier, the current time, and no
    /// replies.
    pub fn new(text: impl Into<String>) -> Self {
        Question {
            id: new_id(),
            text: text.into(),
            created_at: Utc::now(),
            replies: Vec::new(),
        }
    }

    /// Detach the first reply with `reply_id`, keeping the rest in order.
    pub fn remove_reply(&mut self, reply_id: &str) -> Option<Reply> {
        let idx = self.replies.iter().position(|r| r.id == reply_id)?;
        Some(self.replies.remove(idx))
    }
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Reply {
            id: new_id(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Random 128-bit identifier rendered in hyphenated form.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_question_has_no_replies() {
        let q = Question::new("What is 2+2?");
        assert_eq!(q.text, "What is 2+2?");
        assert!(q.replies.is_empty());
        assert!(!q.id.is_empty());
    }

    #[test]
    fn ids_parse_as_uuids() {
        let q = Question::new("");
        let r = Reply::new("");
        assert!(Uuid::parse_str(&q.id).is_ok());
        assert!(Uuid::parse_str(&r.id).is_ok());
        assert_ne!(q.id, r.id);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mut q = Question::new("hello");
        q.replies.push(Reply::new("hi"));
        let value = serde_json::to_value(&q).unwrap();

        assert_eq!(value["text"], "hello");
        assert!(value["createdAt"].is_string());
        assert!(value.get("created_at").is_none());
        assert_eq!(value["replies"][0]["text"], "hi");
        assert!(value["replies"][0]["createdAt"].is_string());
    }

    #[test]
    fn remove_reply_by_id() {
        let mut q = Question::new("q");
        let first = Reply::new("first");
        let second = Reply::new("second");
        q.replies.push(first.clone());
        q.replies.push(second.clone());

        assert!(q.remove_reply("missing").is_none());
        assert_eq!(q.replies.len(), 2);

        assert_eq!(q.remove_reply(&first.id), Some(first));
        assert_eq!(q.replies, vec![second]);
    }
}
