//! State owned by one orchestrator invocation.

use crate::options::ResumePolicy;
use crate::store::ResultStore;
use serde::Serialize;
use sweep_core::{ProgressReporter, ResultTag};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Items handed to the extractor
    pub extracted: usize,
    /// Items left alone because of their seeded result
    pub skipped: usize,
    /// Items that normalized to blank
    pub blanks: usize,
    /// Extractor invocations, including crash retries
    pub extractor_calls: usize,
    /// Browser sessions replaced, for cadence or after a crash
    pub recycles: u32,
    /// Items that lost their session mid-extraction
    pub crash_recoveries: usize,
    /// Checkpoints handed to the sink, including the final one
    pub flushes: usize,
    /// Checkpoints the sink rejected
    pub failed_flushes: usize,
    /// The last flush did not persist
    pub final_flush_failed: bool,
}

/// Results plus what it took to produce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// One result per input item
    pub results: Vec<ResultTag>,
    /// Counters for the run
    pub stats: RunStats,
}

impl RunReport {
    /// Drop the counters, keep the results.
    #[must_use]
    pub fn into_results(self) -> Vec<ResultTag> {
        self.results
    }
}

/// Store, counters and progress reporting for a single run, threaded
/// through the orchestrator instead of living in shared state.
pub(crate) struct RunContext<'a> {
    pub(crate) store: ResultStore,
    pub(crate) stats: RunStats,
    resume: ResumePolicy,
    progress: &'a dyn ProgressReporter,
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(
        len: usize,
        seed: Option<Vec<ResultTag>>,
        resume: ResumePolicy,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        let store = match seed {
            Some(seed) => ResultStore::seeded(len, seed),
            None => ResultStore::new(len),
        };
        Self {
            store,
            stats: RunStats::default(),
            resume,
            progress,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.store.len()
    }

    /// Whether item `index` goes to the extractor in this run.
    pub(crate) fn should_process(&self, index: usize) -> bool {
        self.store
            .get(index)
            .is_some_and(|tag| self.resume.should_process(tag))
    }

    pub(crate) fn pending(&self) -> usize {
        (0..self.total()).filter(|&i| self.should_process(i)).count()
    }

    pub(crate) fn skip(&mut self, index: usize) {
        self.stats.skipped += 1;
        self.advance(index);
    }

    pub(crate) fn record_blank(&mut self, index: usize) {
        self.stats.blanks += 1;
        self.store.set(index, ResultTag::NotApplicable);
    }

    pub(crate) fn record(&mut self, index: usize, tag: ResultTag) {
        self.stats.extracted += 1;
        self.store.set(index, tag);
    }

    /// Report items `0..=index` as done.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn advance(&self, index: usize) {
        let total = self.total().max(1);
        self.progress.progress((index + 1) as f64 / total as f64);
    }

    pub(crate) fn status(&self, index: usize, item: &str) {
        self.progress
            .status(&format!("[{}/{}] processing {}", index + 1, self.total(), item));
    }

    pub(crate) fn finish(self) -> RunReport {
        let stats = self.stats;
        tracing::info!(
            "run finished: {} extracted, {} skipped, {} blank, {} recycles, {} crash recoveries, {}/{} flushes failed",
            stats.extracted,
            stats.skipped,
            stats.blanks,
            stats.recycles,
            stats.crash_recoveries,
            stats.failed_flushes,
            stats.flushes
        );
        if stats.final_flush_failed {
            tracing::error!("final checkpoint was not persisted; results exist only in memory");
        }
        RunReport {
            results: self.store.into_vec(),
            stats,
        }
    }
}
