//! Typed proposal sets for batch transitions.
//!
//! Callers submit one entry per question: the bucket the question was in
//! when the caller looked at it, and the proposed target. The engine never
//! sees raw strings; [`ProposalSet::from_form_fields`] turns
//! `<bucket>_<question id>=<label>` pairs into entries at the boundary.
//!
//! Policy: a question with no entry, or whose field could not be parsed,
//! stays in its current bucket. There is no path that reverts a question
//! to `unanswered` unless `unanswered` was proposed explicitly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Proposal, QuestionId, State};

/// One question's proposal, tagged with the bucket it was proposed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalEntry {
    pub bucket: State,
    pub target: Proposal,
}

/// Proposals keyed by question id. At most one entry per question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalSet {
    entries: BTreeMap<QuestionId, ProposalEntry>,
}

/// Why a form field was not turned into a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The name is not `<bucket>_<id>`.
    MalformedName,
    /// The bucket prefix is not a known state.
    UnknownBucket,
    /// The id part is not an integer.
    InvalidId,
    /// The value is not a known label.
    UnknownLabel,
    /// A second field for a question already seen.
    Duplicate,
}

/// A form field that was dropped while building a [`ProposalSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedField {
    pub name: String,
    pub value: String,
    pub reason: RejectReason,
}

/// Result of parsing submitted form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParse {
    pub proposals: ProposalSet,
    pub rejected: Vec<RejectedField>,
}

impl ProposalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose moving question `id`, currently seen in `bucket`, to `target`.
    ///
    /// A later insert for the same id replaces the earlier one.
    pub fn insert(&mut self, id: QuestionId, bucket: State, target: Proposal) {
        self.entries.insert(id, ProposalEntry { bucket, target });
    }

    /// Builder form of [`ProposalSet::insert`] for `Move` proposals.
    #[must_use]
    pub fn with_move(mut self, id: QuestionId, bucket: State, target: State) -> Self {
        self.insert(id, bucket, Proposal::Move(target));
        self
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<ProposalEntry> {
        self.entries.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, ProposalEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, *entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `<bucket>_<id>=<label>` pairs.
    ///
    /// Unparseable fields are logged, reported in [`FormParse::rejected`],
    /// and otherwise ignored, which leaves their question where it is.
    pub fn from_form_fields<I, K, V>(fields: I) -> FormParse
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut parse = FormParse::default();
        for (name, value) in fields {
            let (name, value) = (name.as_ref(), value.as_ref());
            match parse_field(name, value) {
                Ok((id, bucket, target)) => {
                    if parse.proposals.entries.contains_key(&id) {
                        parse.reject(name, value, RejectReason::Duplicate);
                    } else {
                        parse.proposals.insert(id, bucket, target);
                    }
                }
                Err(reason) => parse.reject(name, value, reason),
            }
        }
        parse
    }
}

impl FormParse {
    fn reject(&mut self, name: &str, value: &str, reason: RejectReason) {
        tracing::warn!(
            field = name,
            value,
            ?reason,
            "rejected proposal field; question left unchanged"
        );
        self.rejected.push(RejectedField {
            name: name.to_string(),
            value: value.to_string(),
            reason,
        });
    }
}

fn parse_field(name: &str, value: &str) -> Result<(QuestionId, State, Proposal), RejectReason> {
    let (bucket, id) = name
        .trim()
        .rsplit_once('_')
        .ok_or(RejectReason::MalformedName)?;
    let bucket: State = bucket.parse().map_err(|_| RejectReason::UnknownBucket)?;
    let id: QuestionId = id.parse().map_err(|_| RejectReason::InvalidId)?;
    let target: Proposal = value.parse().map_err(|_| RejectReason::UnknownLabel)?;
    Ok((id, bucket, target))
}

/// Parse a single `name=value` argument as submitted on the command line.
///
/// # Errors
///
/// Returns the argument unchanged when it has no `=`.
pub fn split_assignment(arg: &str) -> Result<(&str, &str), &str> {
    arg.split_once('=').ok_or(arg)
}
