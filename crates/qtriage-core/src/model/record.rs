use serde::{Deserialize, Serialize};

use super::{Question, State, User};

/// A question together with the triage state and owner persisted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: Question,
    pub state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
}

impl QuestionRecord {
    #[must_use]
    pub const fn unanswered(question: Question) -> Self {
        Self {
            question,
            state: State::Unanswered,
            owner: None,
        }
    }
}
