//! Per-entity outcome reporting for batch updates

use serde::{Deserialize, Serialize};

/// Outcome of one changeset within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Index of the entity in the slice passed to
    /// [`crate::batch::update_many`].
    pub index: usize,
    /// Content-ID the changeset was tagged with.
    pub content_id: u32,
    pub success: bool,
    /// HTTP status of the changeset response part.
    pub status_code: u16,
    /// OData error code when the service reported one.
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl BatchOutcome {
    pub(crate) fn success(index: usize, content_id: u32, status_code: u16) -> Self {
        Self {
            index,
            content_id,
            success: true,
            status_code,
            error_code: None,
            error_message: None,
        }
    }

    pub(crate) fn failure(
        index: usize,
        content_id: u32,
        status_code: u16,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            index,
            content_id,
            success: false,
            status_code,
            error_code,
            error_message,
        }
    }
}

/// Ordered per-entity outcomes of one `$batch` round-trip.
///
/// A batch with mixed outcomes is a successful operation at the protocol
/// level; inspect the individual outcomes to find rejected changesets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    outcomes: Vec<BatchOutcome>,
}

impl BatchResult {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, outcome: BatchOutcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn sort_by_index(&mut self) {
        self.outcomes.sort_by_key(|o| o.index);
    }

    /// All outcomes, ordered by submitted-entity index.
    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Outcomes of changesets the service rejected.
    pub fn failed(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    /// The outcome recorded for the entity at `index` in the submitted
    /// slice, if it was part of the batch.
    pub fn outcome_for(&self, index: usize) -> Option<&BatchOutcome> {
        self.outcomes.iter().find(|o| o.index == index)
    }
}
