//! Index-aligned result storage for one run.

use sweep_core::ResultTag;

/// Ordered results, always exactly as long as the item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    entries: Vec<ResultTag>,
}

impl ResultStore {
    /// All `Unprocessed`.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![ResultTag::Unprocessed; len],
        }
    }

    /// Seed from an earlier run. Missing entries are `Unprocessed`, extra
    /// ones are dropped.
    #[must_use]
    pub fn seeded(len: usize, mut seed: Vec<ResultTag>) -> Self {
        if seed.len() != len {
            tracing::debug!("resizing seeded results from {} to {}", seed.len(), len);
        }
        seed.resize(len, ResultTag::Unprocessed);
        Self { entries: seed }
    }

    /// Number of entries, equal to the item count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the run has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Result at `index`, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ResultTag> {
        self.entries.get(index)
    }

    pub(crate) fn set(&mut self, index: usize, tag: ResultTag) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = tag;
        }
    }

    /// Number of entries that are no longer `Unprocessed`.
    #[must_use]
    pub fn decided(&self) -> usize {
        self.entries.iter().filter(|t| t.is_terminal()).count()
    }

    /// Every result, in item order.
    #[must_use]
    pub fn as_slice(&self) -> &[ResultTag] {
        &self.entries
    }

    /// Take the results out.
    #[must_use]
    pub fn into_vec(self) -> Vec<ResultTag> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_padded() {
        let store = ResultStore::seeded(3, vec![ResultTag::NotFound]);
        assert_eq!(
            store.as_slice(),
            &[ResultTag::NotFound, ResultTag::Unprocessed, ResultTag::Unprocessed]
        );
        assert_eq!(store.decided(), 1);
    }

    #[test]
    fn test_seed_is_truncated() {
        let store = ResultStore::seeded(1, vec![ResultTag::NotFound, ResultTag::TransientError]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0), Some(&ResultTag::NotFound));
    }

    #[test]
    fn test_set_out_of_range_is_ignored() {
        let mut store = ResultStore::new(2);
        store.set(5, ResultTag::NotFound);
        store.set(1, ResultTag::NotApplicable);
        assert_eq!(store.into_vec(), vec![ResultTag::Unprocessed, ResultTag::NotApplicable]);
    }
}
