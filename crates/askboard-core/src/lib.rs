// Core of the question board: data model, the in-memory store, and the
// events announced to realtime clients.

pub mod events;
pub mod model;
pub mod store;

pub use events::BoardEvent;
pub use model::{Question, Reply};
pub use store::{QuestionStore, StoreError};
