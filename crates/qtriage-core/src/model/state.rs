use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four triage buckets a question can sit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Unanswered,
    Answered,
    Pending,
    Updating,
}

impl State {
    /// Every state, in the fixed order transitions walk the buckets.
    pub const ALL: [Self; 4] = [
        Self::Unanswered,
        Self::Answered,
        Self::Pending,
        Self::Updating,
    ];

    /// States that carry an owner (everything except `unanswered`).
    pub const OWNED: [Self; 3] = [Self::Answered, Self::Pending, Self::Updating];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unanswered => "unanswered",
            Self::Answered => "answered",
            Self::Pending => "pending",
            Self::Updating => "updating",
        }
    }

    /// Whether a question in this state must have an owner.
    #[must_use]
    pub const fn is_owned(self) -> bool {
        !matches!(self, Self::Unanswered)
    }

    /// Position of this state in [`State::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Unanswered => 0,
            Self::Answered => 1,
            Self::Pending => 2,
            Self::Updating => 3,
        }
    }

    /// One-line description shown next to each bucket.
    #[must_use]
    pub const fn blurb(self) -> &'static str {
        match self {
            Self::Unanswered => "Questions that have not yet been picked up by the team",
            Self::Answered => "Questions that have been answered by the team",
            Self::Pending => "Questions that are being answered by the team",
            Self::Updating => "Questions that will be answered in the next release",
        }
    }
}

/// A proposed target for one question in a batch transition.
///
/// The default is [`Proposal::NoChange`]: a question without a proposal
/// stays in its current bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Proposal {
    #[default]
    NoChange,
    Move(State),
}

impl Proposal {
    pub const NO_CHANGE_LABEL: &'static str = "no_change";

    /// The target state, if this proposal moves the question.
    #[must_use]
    pub const fn target(self) -> Option<State> {
        match self {
            Self::NoChange => None,
            Self::Move(state) => Some(state),
        }
    }
}

/// Error returned when parsing a state or proposal label from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChange => f.write_str(Self::NO_CHANGE_LABEL),
            Self::Move(state) => f.write_str(state.as_str()),
        }
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for State {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "unanswered" => Ok(Self::Unanswered),
            "answered" => Ok(Self::Answered),
            "pending" => Ok(Self::Pending),
            "updating" => Ok(Self::Updating),
            _ => Err(ParseEnumError {
                expected: "state",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Proposal {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        if normalized == Self::NO_CHANGE_LABEL {
            return Ok(Self::NoChange);
        }
        normalized
            .parse::<State>()
            .map(Self::Move)
            .map_err(|_| ParseEnumError {
                expected: "proposal",
                got: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_text() {
        for state in State::ALL {
            assert_eq!(state.as_str().parse::<State>(), Ok(state));
        }
        assert_eq!(" Pending ".parse::<State>(), Ok(State::Pending));
    }

    #[test]
    fn state_index_matches_all_order() {
        for (i, state) in State::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn only_unanswered_is_unowned() {
        assert!(!State::Unanswered.is_owned());
        for state in State::OWNED {
            assert!(state.is_owned());
        }
    }

    #[test]
    fn proposal_labels_parse() {
        assert_eq!("no_change".parse::<Proposal>(), Ok(Proposal::NoChange));
        assert_eq!(
            "answered".parse::<Proposal>(),
            Ok(Proposal::Move(State::Answered))
        );
        let err = "closed".parse::<Proposal>().expect_err("unknown label");
        assert_eq!(err.expected, "proposal");
        assert_eq!(err.got, "closed");
    }

    #[test]
    fn default_proposal_stays_put() {
        assert_eq!(Proposal::default(), Proposal::NoChange);
        assert_eq!(Proposal::default().target(), None);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&State::Updating).expect("serialize");
        assert_eq!(json, "\"updating\"");
    }
}
