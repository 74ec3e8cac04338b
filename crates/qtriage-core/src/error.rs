use std::fmt;

use crate::model::{QuestionId, State, UserId};

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    UnknownUser,
    QuestionNotFound,
    UnknownBucket,
    MalformedBuckets,
    InvariantViolation,
    CorruptDatabase,
    DatasetParseFailed,
    PersistenceFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnknownUser => "E1003",
            Self::QuestionNotFound => "E2001",
            Self::UnknownBucket => "E2002",
            Self::MalformedBuckets => "E2003",
            Self::InvariantViolation => "E2004",
            Self::CorruptDatabase => "E3001",
            Self::DatasetParseFailed => "E3002",
            Self::PersistenceFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownUser => "Acting user is not registered",
            Self::QuestionNotFound => "Question not found",
            Self::UnknownBucket => "Unknown bucket or state label",
            Self::MalformedBuckets => "Malformed bucket set",
            Self::InvariantViolation => "Triage invariant violated",
            Self::CorruptDatabase => "Corrupt SQLite database",
            Self::DatasetParseFailed => "Dataset file could not be parsed",
            Self::PersistenceFailed => "Persistence write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `qt init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .qtriage/config.toml and retry."),
            Self::UnknownUser => Some("Register the user with `qt login --id <ID> --name <NAME>`."),
            Self::QuestionNotFound => None,
            Self::UnknownBucket => {
                Some("Use one of: unanswered, answered, pending, updating, no_change.")
            }
            Self::MalformedBuckets | Self::InvariantViolation => {
                Some("This is a bug. Report it with logs; the store was left unchanged.")
            }
            Self::CorruptDatabase => Some("Restore .qtriage/qtriage.db or re-import the dataset."),
            Self::DatasetParseFailed => {
                Some("Check that the file is a question wrapper with an `items` array.")
            }
            Self::PersistenceFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `qt` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A structural invariant of the triage store that did not hold.
///
/// These indicate a logic defect, never bad input, so they are surfaced to
/// the caller instead of being patched up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("question {id} appears in both {first} and {second}")]
    DuplicateAcrossBuckets {
        id: QuestionId,
        first: State,
        second: State,
    },

    #[error("question {id} appears twice in {state}")]
    DuplicateWithinBucket { id: QuestionId, state: State },

    #[error("bucket {state} is out of order at position {position}")]
    OutOfOrder { state: State, position: usize },

    #[error("question {id} is {state} but has no owner")]
    MissingOwner { id: QuestionId, state: State },

    #[error("question {id} is unanswered but still owned by user {owner}")]
    UnexpectedOwner { id: QuestionId, owner: UserId },

    #[error("ownership index references question {id} which is in no bucket")]
    DanglingOwner { id: QuestionId },

    #[error("shadow bucket {state} of user {user} holds question {id} it does not own there")]
    StrayShadowEntry { user: UserId, state: State, id: QuestionId },

    #[error("question {id} owned by user {user} is missing from their {state} shadow bucket")]
    MissingShadowEntry { user: UserId, state: State, id: QuestionId },
}

/// Errors produced by the triage store and its coordinator.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// A replacement bucket set contained the same question twice.
    #[error("malformed bucket set: question {id} listed more than once")]
    MalformedBuckets { id: QuestionId },

    /// A candidate state failed verification; nothing was committed.
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// A mutex or rwlock guarding the store was poisoned by a panicking holder.
    #[error("triage store lock poisoned")]
    LockPoisoned,

    /// Loading or reloading from the persistence gateway failed.
    #[error("persistence gateway failed: {0:#}")]
    Persistence(anyhow::Error),
}

impl TriageError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedBuckets { .. } => ErrorCode::MalformedBuckets,
            Self::Invariant(_) => ErrorCode::InvariantViolation,
            Self::LockPoisoned => ErrorCode::InternalUnexpected,
            Self::Persistence(_) => ErrorCode::PersistenceFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
