// In-memory question store shared by every request handler.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::model::{Question, Reply};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("question not found: {id}")]
    QuestionNotFound { id: String },
}

/// Process-lifetime repository of questions and their replies.
///
/// All operations run under a single mutex, so concurrent reply additions to
/// the same question never lose updates and a delete never races a read.
/// Questions are kept in insertion order.
#[derive(Debug, Default)]
pub struct QuestionStore {
    questions: Mutex<Vec<Question>>,
}

impl QuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the question list.
    ///
    /// A poisoned lock is recovered: every operation leaves the list in a
    /// consistent state before it can panic.
    fn questions(&self) -> MutexGuard<'_, Vec<Question>> {
        self.questions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every question, newest first.
    pub fn list(&self) -> Vec<Question> {
        self.questions().iter().rev().cloned().collect()
    }

    /// Snapshot of a single question.
    pub fn get(&self, id: &str) -> Option<Question> {
        self.questions().iter().find(|q| q.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.questions().iter().any(|q| q.id == id)
    }

    pub fn len(&self) -> usize {
        self.questions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions().is_empty()
    }

    /// Store a new question with a fresh id and no replies. Any text is
    /// accepted, including the empty string.
    pub fn create_question(&self, text: impl Into<String>) -> Question {
        let question = Question::new(text);
        self.questions().push(question.clone());
        debug!(question_id = %question.id, "question created");
        question
    }

    /// Append a reply to the end of a question's reply list.
    pub fn add_reply(
        &self,
        question_id: &str,
        text: impl Into<String>,
    ) -> Result<Reply, StoreError> {
        let mut questions = self.questions();
        let question = questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| StoreError::QuestionNotFound {
                id: question_id.to_string(),
            })?;

        let reply = Reply::new(text);
        question.replies.push(reply.clone());
        debug!(question_id, reply_id = %reply.id, "reply added");
        Ok(reply)
    }

    /// Remove a question and all of its replies. Returns `false` when there
    /// was nothing to remove.
    pub fn delete_question(&self, id: &str) -> bool {
        let mut questions = self.questions();
        let Some(idx) = questions.iter().position(|q| q.id == id) else {
            return false;
        };
        questions.remove(idx);
        debug!(question_id = id, "question deleted");
        true
    }

    /// Remove the first reply matching `reply_id` from a question. Unknown
    /// question or reply ids are a no-op and return `false`.
    pub fn delete_reply(&self, question_id: &str, reply_id: &str) -> bool {
        let mut questions = self.questions();
        let removed = questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .and_then(|q| q.remove_reply(reply_id))
            .is_some();
        if removed {
            debug!(question_id, reply_id, "reply deleted");
        }
        removed
    }

    /// Drop every question (and with them every reply). Returns how many
    /// questions were removed.
    pub fn clear_all_questions(&self) -> usize {
        let mut questions = self.questions();
        let removed = questions.len();
        questions.clear();
        debug!(removed, "store cleared");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn created_questions_have_distinct_ids() {
        let store = QuestionStore::new();
        let ids: HashSet<String> = (0..100)
            .map(|i| store.create_question(format!("q{i}")).id)
            .collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(store.len(), 100);
    }

    #[test]
    fn empty_text_is_accepted() {
        let store = QuestionStore::new();
        let q = store.create_question("");
        assert_eq!(q.text, "");
        assert_eq!(store.list(), vec![q]);
    }

    #[test]
    fn list_is_newest_first() {
        let store = QuestionStore::new();
        let first = store.create_question("first");
        let second = store.create_question("second");
        let third = store.create_question("third");

        let ids: Vec<String> = store.list().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn replies_are_appended_in_call_order() {
        let store = QuestionStore::new();
        let q = store.create_question("q");
        let a = store.add_reply(&q.id, "a").unwrap();
        let b = store.add_reply(&q.id, "b").unwrap();
        let c = store.add_reply(&q.id, "c").unwrap();

        let stored = store.get(&q.id).unwrap();
        let ids: Vec<&str> = stored.replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
    }

    #[test]
    fn reply_to_unknown_question_is_not_found() {
        let store = QuestionStore::new();
        let q = store.create_question("q");
        let before = store.list();

        let err = store.add_reply("unknown-id", "x").unwrap_err();
        assert_eq!(
            err,
            StoreError::QuestionNotFound {
                id: "unknown-id".into()
            }
        );
        assert_eq!(store.list(), before);
        assert!(store.get(&q.id).unwrap().replies.is_empty());
    }

    #[test]
    fn delete_question_removes_it_and_its_replies() {
        let store = QuestionStore::new();
        let keep = store.create_question("keep");
        let gone = store.create_question("gone");
        store.add_reply(&gone.id, "reply").unwrap();

        assert!(store.delete_question(&gone.id));

        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, keep.id);
        assert!(store.get(&gone.id).is_none());
        assert!(store.add_reply(&gone.id, "late").is_err());
    }

    #[test]
    fn delete_unknown_question_is_noop() {
        let store = QuestionStore::new();
        store.create_question("q");
        assert!(!store.delete_question("nope"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_unknown_reply_leaves_replies_unchanged() {
        let store = QuestionStore::new();
        let q = store.create_question("q");
        store.add_reply(&q.id, "a").unwrap();
        let before = store.get(&q.id).unwrap().replies;

        assert!(!store.delete_reply(&q.id, "nope"));
        assert!(!store.delete_reply("no-question", "nope"));
        assert_eq!(store.get(&q.id).unwrap().replies, before);
    }

    #[test]
    fn delete_reply_keeps_the_others_in_order() {
        let store = QuestionStore::new();
        let q = store.create_question("q");
        let a = store.add_reply(&q.id, "a").unwrap();
        let b = store.add_reply(&q.id, "b").unwrap();
        let c = store.add_reply(&q.id, "c").unwrap();

        assert!(store.delete_reply(&q.id, &b.id));
        assert_eq!(store.get(&q.id).unwrap().replies, vec![a, c]);
    }

    #[test]
    fn clear_empties_the_store() {
        let store = QuestionStore::new();
        for i in 0..5 {
            let q = store.create_question(format!("q{i}"));
            store.add_reply(&q.id, "r").unwrap();
        }

        assert_eq!(store.clear_all_questions(), 5);
        assert!(store.list().is_empty());
        assert!(store.is_empty());
        assert_eq!(store.clear_all_questions(), 0);
    }

    #[test]
    fn question_and_reply_scenario() {
        let store = QuestionStore::new();
        let q1 = store.create_question("What is 2+2?");
        assert_eq!(q1.text, "What is 2+2?");
        assert!(q1.replies.is_empty());

        let r1 = store.add_reply(&q1.id, "4").unwrap();
        assert_eq!(r1.text, "4");

        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, q1.id);
        assert_eq!(list[0].replies, vec![r1.clone()]);

        assert!(store.delete_reply(&q1.id, &r1.id));
        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, q1.id);
        assert!(list[0].replies.is_empty());
    }

    #[test]
    fn concurrent_replies_are_not_lost() {
        let store = Arc::new(QuestionStore::new());
        let q = store.create_question("busy");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                let id = q.id.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.add_reply(&id, format!("{t}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.get(&q.id).unwrap().replies.len(), 400);
    }
}
