use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sweep_browser::{BrowserError, PageActions, Session, SessionProvider};
use sweep_core::{CheckpointSink, Item, Payload, ResultTag, SinkError};
use sweep_extract::{ExtractError, Extractor};
use sweep_scanner::{
    ChannelProgress, ExecutionMode, Orchestrator, ProgressEvent, ResumePolicy, RunOptions,
    ScanError,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct NullPage;

#[async_trait::async_trait]
impl PageActions for NullPage {
    async fn navigate(&self, _url: &str, _timeout: Duration) -> sweep_browser::Result<()> {
        Ok(())
    }
    async fn current_url(&self) -> sweep_browser::Result<Option<String>> {
        Ok(None)
    }
    async fn content(&self) -> sweep_browser::Result<String> {
        Ok(String::new())
    }
    async fn inner_text(&self) -> sweep_browser::Result<String> {
        Ok(String::new())
    }
    async fn evaluate(&self, _script: &str) -> sweep_browser::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
    async fn type_text(&self, _: &str, _: &str, _: Duration) -> sweep_browser::Result<()> {
        Ok(())
    }
    async fn press_key(&self, _: &str, _: &str) -> sweep_browser::Result<()> {
        Ok(())
    }
    async fn click(&self, _: &str) -> sweep_browser::Result<()> {
        Ok(())
    }
    async fn fill_field(&self, _: &str, _: &str) -> sweep_browser::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct BrowserLog {
    launches: AtomicU32,
    closes: AtomicU32,
    pages_opened: AtomicU32,
    pages_closed: AtomicU32,
}

impl BrowserLog {
    fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    page: NullPage,
    log: Arc<BrowserLog>,
}

#[async_trait::async_trait]
impl Session for FakeSession {
    type Page = NullPage;

    fn page(&self) -> &NullPage {
        &self.page
    }

    async fn open_page(&self) -> sweep_browser::Result<NullPage> {
        self.log.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(NullPage)
    }

    async fn close_page(&self, _page: NullPage) {
        self.log.pages_closed.fetch_add(1, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        true
    }

    async fn close(self) -> sweep_browser::Result<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launches fake sessions; every launch beyond `max_launches` fails.
#[derive(Default)]
struct FakeProvider {
    log: Arc<BrowserLog>,
    max_launches: Option<u32>,
}

impl FakeProvider {
    fn failing_after(max_launches: u32) -> Self {
        Self {
            max_launches: Some(max_launches),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    async fn launch(&self) -> sweep_browser::Result<FakeSession> {
        let n = self.log.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.max_launches.is_some_and(|max| n > max) {
            return Err(BrowserError::Launch("chrome not found".to_string()));
        }
        Ok(FakeSession {
            page: NullPage,
            log: self.log.clone(),
        })
    }
}

/// Answers `Success("OK")` unless told otherwise; can crash the session a
/// set number of times per item.
#[derive(Default)]
struct ScriptedExtractor {
    calls: Mutex<Vec<String>>,
    retries_seen: Mutex<Vec<u32>>,
    answers: HashMap<String, ResultTag>,
    crashes: Mutex<HashMap<String, u32>>,
    default_retries: u32,
}

impl ScriptedExtractor {
    fn new() -> Self {
        Self {
            default_retries: 2,
            ..Self::default()
        }
    }

    fn crashing(item: &str, times: u32) -> Self {
        let extractor = Self::new();
        extractor
            .crashes
            .lock()
            .unwrap()
            .insert(item.to_string(), times);
        extractor
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_retries(&self) -> u32 {
        self.default_retries
    }

    async fn extract(
        &self,
        _page: &dyn PageActions,
        item: &str,
        retries: u32,
    ) -> Result<ResultTag, ExtractError> {
        self.calls.lock().unwrap().push(item.to_string());
        self.retries_seen.lock().unwrap().push(retries);

        if let Some(remaining) = self.crashes.lock().unwrap().get_mut(item) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExtractError::SessionCrashed("target crashed".to_string()));
            }
        }

        Ok(self
            .answers
            .get(item)
            .cloned()
            .unwrap_or_else(|| ResultTag::success("OK")))
    }
}

/// Records every snapshot it is handed; fails the flush calls listed in
/// `fail_on` (1-based).
#[derive(Default)]
struct RecordingSink {
    snapshots: Mutex<Vec<Vec<ResultTag>>>,
    fail_on: Vec<usize>,
}

impl RecordingSink {
    fn snapshots(&self) -> Vec<Vec<ResultTag>> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CheckpointSink for RecordingSink {
    async fn flush(&self, results: &[ResultTag]) -> Result<(), SinkError> {
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.push(results.to_vec());
        if self.fail_on.contains(&snapshots.len()) {
            return Err(SinkError::Store("spreadsheet quota exceeded".to_string()));
        }
        Ok(())
    }
}

fn items(raw: &[&str]) -> Vec<Item> {
    raw.iter().map(|s| Item::from(*s)).collect()
}

fn numbered(n: usize) -> Vec<Item> {
    (0..n).map(|i| Item::new(format!("item-{i}"))).collect()
}

fn ok() -> ResultTag {
    ResultTag::success("OK")
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_sentinel_is_not_applicable() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();

    let report = Orchestrator::new(&provider, &extractor)
        .run(&items(&["111", "nan", "222"]), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.results, vec![ok(), ResultTag::NotApplicable, ok()]);
    assert_eq!(extractor.calls(), vec!["111", "222"]);
}

#[tokio::test]
async fn test_resume_requeues_unprocessed_and_failed() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let initial = vec![
        ResultTag::success("x"),
        ResultTag::Unprocessed,
        ResultTag::Unprocessed,
        ResultTag::TransientError,
    ];

    let report = Orchestrator::new(&provider, &extractor)
        .run(
            &items(&["A", "B", "C", "D"]),
            RunOptions::default().with_initial_results(initial),
        )
        .await
        .unwrap();

    assert_eq!(extractor.calls(), vec!["B", "C", "D"]);
    assert_eq!(report.results, vec![ResultTag::success("x"), ok(), ok(), ok()]);
    assert_eq!(report.stats.skipped, 1);
}

#[tokio::test]
async fn test_checkpoint_after_each_batch_and_at_end() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink::default();

    Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(&numbered(5), RunOptions::default().with_batch_size(2))
        .await
        .unwrap();

    let snapshots = sink.snapshots();
    assert_eq!(snapshots.len(), 3);
    assert_eq!(
        snapshots[0],
        vec![ok(), ok(), ResultTag::Unprocessed, ResultTag::Unprocessed, ResultTag::Unprocessed]
    );
    assert_eq!(snapshots[1][..4], [ok(), ok(), ok(), ok()]);
    assert_eq!(snapshots[1][4], ResultTag::Unprocessed);
    assert_eq!(snapshots[2], vec![ok(); 5]);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_result_length_matches_items() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let orchestrator = Orchestrator::new(&provider, &extractor);

    for (n, seed_len) in [(0, 0), (3, 1), (3, 7), (4, 4)] {
        let seed = vec![ResultTag::NotFound; seed_len];
        let report = orchestrator
            .run(&numbered(n), RunOptions::default().with_initial_results(seed))
            .await
            .unwrap();
        assert_eq!(report.results.len(), n);
    }
}

#[tokio::test]
async fn test_checkpoint_cadence() {
    for n in 1..=12 {
        for batch in 1..=5 {
            let provider = FakeProvider::default();
            let extractor = ScriptedExtractor::new();
            let sink = RecordingSink::default();

            Orchestrator::new(&provider, &extractor)
                .with_sink(&sink)
                .run(&numbered(n), RunOptions::default().with_batch_size(batch))
                .await
                .unwrap();

            let snapshots = sink.snapshots();
            assert_eq!(snapshots.len(), n / batch + 1, "n={n} batch={batch}");
            assert!(snapshots
                .last()
                .unwrap()
                .iter()
                .all(ResultTag::is_terminal));
        }
    }
}

#[tokio::test]
async fn test_recycle_cadence() {
    for n in 1..=20 {
        for every in 1..=6 {
            let provider = FakeProvider::default();
            let extractor = ScriptedExtractor::new();

            let report = Orchestrator::new(&provider, &extractor)
                .run(
                    &numbered(n),
                    RunOptions::default()
                        .with_recycle_every(every)
                        .with_batch_size(3),
                )
                .await
                .unwrap();

            let expected = u32::try_from((n - 1) / every).unwrap();
            assert_eq!(report.stats.recycles, expected, "n={n} every={every}");
            assert_eq!(provider.log.launches(), expected + 1);
            // Every launched browser is closed again
            assert_eq!(provider.log.closes(), provider.log.launches());
        }
    }
}

#[tokio::test]
async fn test_terminal_prefix_is_never_reprocessed() {
    let kinds = [
        ResultTag::NotApplicable,
        ResultTag::success("x"),
        ResultTag::NotFound,
        ResultTag::unavailable("captcha challenge"),
        ResultTag::TransientError,
        ResultTag::UnknownOutcome,
        ResultTag::Success(Payload::Fields(vec![None, Some("Porto".to_string())])),
    ];

    for k in 0..=kinds.len() {
        for rotation in 0..kinds.len() {
            let mut prefix = kinds.to_vec();
            prefix.rotate_left(rotation);
            prefix.truncate(k);

            let n = kinds.len() + 3;
            let provider = FakeProvider::default();
            let extractor = ScriptedExtractor::new();

            let report = Orchestrator::new(&provider, &extractor)
                .run(
                    &numbered(n),
                    RunOptions::default()
                        .with_initial_results(prefix.clone())
                        .with_resume(ResumePolicy::KeepAll),
                )
                .await
                .unwrap();

            assert_eq!(extractor.calls().len(), n - k);
            assert_eq!(report.results[..k], prefix[..]);
        }
    }
}

#[tokio::test]
async fn test_fully_decided_run_is_a_no_op() {
    let initial = vec![
        ResultTag::success("x"),
        ResultTag::NotApplicable,
        ResultTag::NotFound,
        ResultTag::unavailable("maintenance"),
    ];
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(
            &numbered(4),
            RunOptions::default().with_initial_results(initial.clone()),
        )
        .await
        .unwrap();

    assert!(extractor.calls().is_empty());
    assert_eq!(report.results, initial);
    assert_eq!(provider.log.launches(), 0);
    assert_eq!(sink.snapshots(), vec![initial]);
}

#[tokio::test]
async fn test_blanks_anywhere_skip_the_extractor() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();

    let report = Orchestrator::new(&provider, &extractor)
        .run(
            &items(&["", "a", "  ", "NaN", "b", "nan", "\t"]),
            RunOptions::default(),
        )
        .await
        .unwrap();

    let na = ResultTag::NotApplicable;
    assert_eq!(
        report.results,
        vec![na.clone(), ok(), na.clone(), na.clone(), ok(), na.clone(), na]
    );
    assert_eq!(extractor.calls(), vec!["a", "b"]);
    assert_eq!(report.stats.blanks, 5);
}

#[tokio::test]
async fn test_items_are_normalized_before_extraction() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();

    Orchestrator::new(&provider, &extractor)
        .run(&items(&[" 941000012345678.0 ", "AL-1"]), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), vec!["941000012345678", "AL-1"]);
}

#[tokio::test]
async fn test_retries_are_capped_by_options() {
    let provider = FakeProvider::default();

    let mut generous = ScriptedExtractor::new();
    generous.default_retries = 3;
    Orchestrator::new(&provider, &generous)
        .run(&numbered(2), RunOptions::default().with_retries(1))
        .await
        .unwrap();
    assert_eq!(*generous.retries_seen.lock().unwrap(), vec![1, 1]);

    let mut frugal = ScriptedExtractor::new();
    frugal.default_retries = 1;
    Orchestrator::new(&provider, &frugal)
        .run(&numbered(1), RunOptions::default().with_retries(2))
        .await
        .unwrap();
    assert_eq!(*frugal.retries_seen.lock().unwrap(), vec![1]);
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_options_fail_before_launch() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();

    let err = Orchestrator::new(&provider, &extractor)
        .run(&numbered(3), RunOptions::default().with_batch_size(0))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::InvalidOptions(_)));
    assert_eq!(provider.log.launches(), 0);
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_the_run() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink {
        fail_on: vec![1],
        ..RecordingSink::default()
    };

    let report = Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(&numbered(4), RunOptions::default().with_batch_size(2))
        .await
        .unwrap();

    assert_eq!(report.results, vec![ok(); 4]);
    assert_eq!(sink.snapshots().len(), 3);
    assert_eq!(report.stats.flushes, 3);
    assert_eq!(report.stats.failed_flushes, 1);
    assert!(!report.stats.final_flush_failed);
}

#[tokio::test]
async fn test_final_flush_failure_is_reported() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink {
        fail_on: vec![1],
        ..RecordingSink::default()
    };

    let report = Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(&numbered(3), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.results, vec![ok(); 3]);
    assert!(report.stats.final_flush_failed);
}

#[tokio::test]
async fn test_crash_recycles_and_retries_same_item() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::crashing("b", 1);

    let report = Orchestrator::new(&provider, &extractor)
        .run(&items(&["a", "b", "c"]), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.results, vec![ok(), ok(), ok()]);
    assert_eq!(extractor.calls(), vec!["a", "b", "b", "c"]);
    assert_eq!(report.stats.crash_recoveries, 1);
    assert_eq!(report.stats.recycles, 1);
    assert_eq!(provider.log.launches(), 2);
}

#[tokio::test]
async fn test_repeated_crash_marks_transient_and_moves_on() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::crashing("b", 5);

    let report = Orchestrator::new(&provider, &extractor)
        .run(&items(&["a", "b", "c"]), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.results, vec![ok(), ResultTag::TransientError, ok()]);
    assert_eq!(extractor.calls(), vec!["a", "b", "b", "c"]);
    assert_eq!(provider.log.launches(), 3);
    assert_eq!(provider.log.closes(), 3);
}

#[tokio::test]
async fn test_fatal_launch_during_recycle_still_flushes() {
    // One good launch, then both the recycle launch and its retry fail
    let provider = FakeProvider::failing_after(1);
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink::default();

    let err = Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(&numbered(4), RunOptions::default().with_recycle_every(2))
        .await
        .unwrap_err();

    let expected = vec![ok(), ok(), ResultTag::Unprocessed, ResultTag::Unprocessed];
    match err {
        ScanError::Launch { source, partial } => {
            assert!(matches!(source, BrowserError::Launch(_)));
            assert_eq!(partial, expected);
        }
        other => panic!("expected launch failure, got {other}"),
    }
    assert_eq!(sink.snapshots().last(), Some(&expected));
    assert_eq!(provider.log.launches(), 3);
    assert_eq!(provider.log.closes(), 1);
}

#[tokio::test]
async fn test_launch_failure_at_start_is_fatal() {
    let provider = FakeProvider::failing_after(0);
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink::default();

    let err = Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(&numbered(2), RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err.partial_results(),
        Some(&[ResultTag::Unprocessed, ResultTag::Unprocessed][..])
    );
    assert!(extractor.calls().is_empty());
    assert_eq!(sink.snapshots().len(), 1);
    assert_eq!(provider.log.launches(), 2);
}

// ---------------------------------------------------------------------------
// Chunked mode and progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chunked_mode_matches_sequential_results() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(&provider, &extractor)
        .with_sink(&sink)
        .run(
            &items(&["a", "nan", "c", "d", "e"]),
            RunOptions::default()
                .with_batch_size(2)
                .with_mode(ExecutionMode::Chunked { size: 2 }),
        )
        .await
        .unwrap();

    assert_eq!(
        report.results,
        vec![ok(), ResultTag::NotApplicable, ok(), ok(), ok()]
    );
    assert_eq!(sink.snapshots().len(), 3);
    assert_eq!(provider.log.pages_opened.load(Ordering::SeqCst), 4);
    assert_eq!(provider.log.pages_closed.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_chunked_mode_recycles_and_recovers() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::crashing("item-1", 1);

    let report = Orchestrator::new(&provider, &extractor)
        .run(
            &numbered(6),
            RunOptions::default()
                .with_recycle_every(3)
                .with_mode(ExecutionMode::Chunked { size: 2 }),
        )
        .await
        .unwrap();

    assert_eq!(report.results, vec![ok(); 6]);
    assert_eq!(report.stats.crash_recoveries, 1);
    // One recycle after the crash, one before the chunk holding index 3
    assert_eq!(report.stats.recycles, 2);
    assert_eq!(extractor.calls().len(), 7);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let provider = FakeProvider::default();
    let extractor = ScriptedExtractor::new();
    let (progress, mut rx) = ChannelProgress::new();

    Orchestrator::new(&provider, &extractor)
        .with_progress(&progress)
        .run(
            &numbered(4),
            RunOptions::default().with_initial_results(vec![ResultTag::NotFound]),
        )
        .await
        .unwrap();
    drop(progress);

    let mut fractions = Vec::new();
    let mut statuses = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::Progress(f) => fractions.push(f),
            ProgressEvent::Status(s) => statuses.push(s),
        }
    }

    assert_eq!(fractions.len(), 4);
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert!((fractions[3] - 1.0).abs() < f64::EPSILON);
    assert_eq!(statuses.len(), 3);
    assert!(statuses[0].contains("item-1"));
}
