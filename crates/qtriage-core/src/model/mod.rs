//! Value types shared by the store, the engine, and persistence.

pub mod question;
pub mod record;
pub mod state;
pub mod user;

pub use question::{Question, QuestionId};
pub use record::QuestionRecord;
pub use state::{ParseEnumError, Proposal, State};
pub use user::{User, UserId};
