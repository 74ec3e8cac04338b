//! Upstream question sources and deleted-question reconciliation.
//!
//! A [`QuestionSource`] answers "which of these ids still exist upstream".
//! [`DatasetSource`] reads the Stack Exchange style wrapper file
//! (`{"items": [...]}`) that seeds a store, and doubles as an offline
//! source for reconciliation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ErrorCode;
use crate::model::{Question, QuestionId};

/// Upstream page size for id lookups.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Anything that can look questions up by id.
pub trait QuestionSource {
    /// Fetch the questions among `ids` that still exist. Missing ids are
    /// simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be queried.
    fn fetch_by_ids(&self, ids: &[QuestionId]) -> anyhow::Result<Vec<Question>>;
}

/// Errors reading a dataset file.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("cannot read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {path} is not a question wrapper: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DatasetError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::DatasetParseFailed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Wrapper {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    question_id: i64,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    link: String,
    creation_date: i64,
    #[serde(default)]
    last_edit_date: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<Item> for Question {
    fn from(item: Item) -> Self {
        Self {
            id: QuestionId::new(item.question_id),
            title: item.title,
            body: item.body,
            link: item.link,
            creation_date: item.creation_date,
            last_edit_date: item.last_edit_date,
            tags: item.tags,
        }
    }
}

/// Questions loaded from a dataset file, in file order.
#[derive(Debug, Clone, Default)]
pub struct DatasetSource {
    questions: Vec<Question>,
    index: HashMap<QuestionId, usize>,
}

impl DatasetSource {
    /// Read and parse a wrapper file.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse wrapper JSON. Later repeats of an id are dropped.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `raw` is not a wrapper object.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let wrapper: Wrapper = serde_json::from_str(raw)?;
        Ok(Self::from_questions(wrapper.items.into_iter().map(Question::from)))
    }

    pub fn from_questions(questions: impl IntoIterator<Item = Question>) -> Self {
        let mut source = Self::default();
        for question in questions {
            if source.index.contains_key(&question.id) {
                tracing::warn!(
                    question_id = %question.id,
                    "duplicate question in dataset; keeping first"
                );
                continue;
            }
            source.index.insert(question.id, source.questions.len());
            source.questions.push(question);
        }
        source
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionSource for DatasetSource {
    fn fetch_by_ids(&self, ids: &[QuestionId]) -> anyhow::Result<Vec<Question>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.index.get(id).map(|&i| self.questions[i].clone()))
            .collect())
    }
}

/// Ids among `ids` that `source` no longer returns.
///
/// Lookups go out in batches of `batch_size` (at least 1). The result keeps
/// the order of `ids`.
///
/// # Errors
///
/// Returns the first source error; no partial result is reported, so
/// nothing is purged on a failed lookup.
pub fn find_deleted(
    source: &dyn QuestionSource,
    ids: &[QuestionId],
    batch_size: usize,
) -> anyhow::Result<Vec<QuestionId>> {
    let mut alive: HashSet<QuestionId> = HashSet::with_capacity(ids.len());
    for (batch, chunk) in ids.chunks(batch_size.max(1)).enumerate() {
        let found = source.fetch_by_ids(chunk)?;
        tracing::debug!(batch, requested = chunk.len(), found = found.len(), "fetched batch");
        alive.extend(found.into_iter().map(|q| q.id));
    }

    let deleted: Vec<QuestionId> = ids.iter().copied().filter(|id| !alive.contains(id)).collect();
    tracing::info!(checked = ids.len(), deleted = deleted.len(), "reconciled with upstream");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const DATASET: &str = r#"{
        "items": [
            {"question_id": 11, "title": "Geocoder returns ZERO_RESULTS",
             "link": "https://example.com/q/11",
             "creation_date": 1457000000, "tags": ["google-maps", "geocoding"],
             "owner": {"user_id": 5, "display_name": "asker"}, "score": 3},
            {"question_id": 12, "title": "Marker clustering", "creation_date": 1457000100},
            {"question_id": 11, "title": "repeat", "creation_date": 1}
        ],
        "has_more": false,
        "quota_remaining": 9000
    }"#;

    #[test]
    fn parses_wrapper_and_ignores_extra_fields() {
        let source = DatasetSource::from_json(DATASET).expect("parse");
        assert_eq!(source.len(), 2);
        let first = &source.questions()[0];
        assert_eq!(first.id, QuestionId::new(11));
        assert_eq!(first.tags, vec!["google-maps", "geocoding"]);
        assert_eq!(first.title, "Geocoder returns ZERO_RESULTS");
        assert!(source.questions()[1].body.is_empty());
    }

    #[test]
    fn rejects_non_wrapper_json() {
        assert!(DatasetSource::from_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn missing_file_maps_to_dataset_code() {
        let err = DatasetSource::from_path(Path::new("/nonexistent/dataset.json"))
            .expect_err("missing file");
        assert_eq!(err.code(), ErrorCode::DatasetParseFailed);
    }

    struct CountingSource {
        inner: DatasetSource,
        calls: RefCell<Vec<usize>>,
    }

    impl QuestionSource for CountingSource {
        fn fetch_by_ids(&self, ids: &[QuestionId]) -> anyhow::Result<Vec<Question>> {
            self.calls.borrow_mut().push(ids.len());
            self.inner.fetch_by_ids(ids)
        }
    }

    #[test]
    fn find_deleted_batches_and_preserves_order() {
        let source = CountingSource {
            inner: DatasetSource::from_questions(
                [2, 4].map(|id| Question::new(QuestionId::new(id), "q", id)),
            ),
            calls: RefCell::new(Vec::new()),
        };
        let ids: Vec<QuestionId> = (1..=5).map(QuestionId::new).collect();

        let deleted = find_deleted(&source, &ids, 2).expect("reconcile");
        assert_eq!(deleted, vec![QuestionId::new(1), QuestionId::new(3), QuestionId::new(5)]);
        assert_eq!(*source.calls.borrow(), vec![2, 2, 1]);
    }

    #[test]
    fn find_deleted_propagates_source_errors() {
        struct Down;
        impl QuestionSource for Down {
            fn fetch_by_ids(&self, _ids: &[QuestionId]) -> anyhow::Result<Vec<Question>> {
                anyhow::bail!("quota exhausted")
            }
        }
        assert!(find_deleted(&Down, &[QuestionId::new(1)], 0).is_err());
    }
}
