//! Run orchestrator.
//!
//! Drives an [`Extractor`] over an ordered item list: decides per item
//! whether to skip, renews the browser on a cadence, recovers from browser
//! crashes, and checkpoints the full result list to a sink.

use crate::context::{RunContext, RunReport};
use crate::error::{Result, ScanError};
use crate::normalize::normalize_item;
use crate::options::{ExecutionMode, RunOptions};
use futures::future::join_all;
use sweep_browser::{Session, SessionManager, SessionProvider};
use sweep_core::{CheckpointSink, Item, NoopProgress, ProgressReporter, ResultTag};
use sweep_extract::{ExtractError, Extractor};

static NO_PROGRESS: NoopProgress = NoopProgress;

/// What one extractor call produced: a result, or the reason the
/// session died underneath it.
type CallOutcome = std::result::Result<ResultTag, String>;

/// Runs one extractor over item lists.
pub struct Orchestrator<'a, P: SessionProvider> {
    provider: &'a P,
    extractor: &'a dyn Extractor,
    sink: Option<&'a dyn CheckpointSink>,
    progress: &'a dyn ProgressReporter,
}

impl<'a, P: SessionProvider> Orchestrator<'a, P> {
    /// Create an orchestrator with no sink and no progress observer.
    #[must_use]
    pub fn new(provider: &'a P, extractor: &'a dyn Extractor) -> Self {
        Self {
            provider,
            extractor,
            sink: None,
            progress: &NO_PROGRESS,
        }
    }

    /// Checkpoint results to this sink.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn CheckpointSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Push progress and status updates to this observer.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Process `items` and return one result per item.
    ///
    /// The final flush and the session close happen on every path out of
    /// the loop, including a fatal launch failure during a recycle.
    ///
    /// # Errors
    /// `ScanError::InvalidOptions` before anything starts, or
    /// `ScanError::Launch` (carrying the partial results) when no browser
    /// could be started.
    pub async fn run(&self, items: &[Item], options: RunOptions) -> Result<RunReport> {
        options.validate()?;

        let retries = self
            .extractor
            .default_retries()
            .min(options.retries_per_item);
        let mut ctx = RunContext::new(
            items.len(),
            options.initial_results.clone(),
            options.resume,
            self.progress,
        );

        tracing::info!(
            "Starting {} run: {} items, {} pending, batch {}, recycle every {}, {} retries",
            self.extractor.name(),
            items.len(),
            ctx.pending(),
            options.batch_size,
            options.recycle_every,
            retries
        );

        let mut manager = SessionManager::new(self.provider)
            .with_init_url(options.init_url.clone(), options.init_timeout);

        let outcome = if ctx.pending() == 0 {
            tracing::info!("Every item already has a result, nothing to do");
            for index in 0..items.len() {
                ctx.skip(index);
            }
            Ok(())
        } else {
            match options.mode {
                ExecutionMode::Sequential => {
                    self.run_sequential(&mut manager, &mut ctx, items, &options, retries)
                        .await
                }
                ExecutionMode::Chunked { size } => {
                    self.run_chunked(&mut manager, &mut ctx, items, &options, retries, size)
                        .await
                }
            }
        };

        self.flush(&mut ctx, true).await;
        manager.close().await;
        ctx.stats.recycles = manager.recycles();

        let report = ctx.finish();
        match outcome {
            Ok(()) => Ok(report),
            Err(source) => {
                tracing::error!("Run aborted: {}", source);
                Err(ScanError::Launch {
                    source,
                    partial: report.results,
                })
            }
        }
    }

    async fn run_sequential(
        &self,
        manager: &mut SessionManager<'_, P>,
        ctx: &mut RunContext<'_>,
        items: &[Item],
        options: &RunOptions,
        retries: u32,
    ) -> sweep_browser::Result<()> {
        manager.open().await?;

        for (index, raw) in items.iter().enumerate() {
            if !ctx.should_process(index) {
                tracing::debug!("Skipping item {}: already decided", index);
                ctx.skip(index);
                continue;
            }

            if index > 0 && index % options.recycle_every == 0 {
                tracing::info!("Renewing browser before item {}", index);
                manager.recycle().await?;
            }

            match normalize_item(raw.as_str()) {
                None => {
                    tracing::debug!("Item {} is blank", index);
                    ctx.record_blank(index);
                }
                Some(item) => {
                    ctx.status(index, &item);
                    let tag = self.extract_one(manager, ctx, &item, retries).await?;
                    tracing::debug!("Item {} ({}): {}", index, item, tag.kind());
                    ctx.record(index, tag);
                }
            }

            ctx.advance(index);
            if (index + 1) % options.batch_size == 0 {
                self.flush(ctx, false).await;
            }
        }

        Ok(())
    }

    async fn run_chunked(
        &self,
        manager: &mut SessionManager<'_, P>,
        ctx: &mut RunContext<'_>,
        items: &[Item],
        options: &RunOptions,
        retries: u32,
        size: usize,
    ) -> sweep_browser::Result<()> {
        manager.open().await?;

        let mut start = 0;
        while start < items.len() {
            let end = (start + size).min(items.len());

            let due: Vec<usize> = (start..end).filter(|&i| ctx.should_process(i)).collect();
            ctx.stats.skipped += (end - start) - due.len();

            if due.iter().any(|&i| i > 0 && i % options.recycle_every == 0) {
                tracing::info!("Renewing browser before chunk {}..{}", start, end);
                manager.recycle().await?;
            }

            let mut work = Vec::with_capacity(due.len());
            for index in due {
                match normalize_item(items[index].as_str()) {
                    None => ctx.record_blank(index),
                    Some(item) => {
                        ctx.status(index, &item);
                        work.push((index, item));
                    }
                }
            }

            if !work.is_empty() {
                for (index, tag) in self.extract_chunk(manager, ctx, &work, retries).await? {
                    tracing::debug!("Item {}: {}", index, tag.kind());
                    ctx.record(index, tag);
                }
            }

            ctx.advance(end - 1);
            if end / options.batch_size > start / options.batch_size {
                self.flush(ctx, false).await;
            }
            start = end;
        }

        Ok(())
    }

    /// Run every chunk member concurrently on its own page, then retry
    /// crashed members one by one on a fresh session.
    async fn extract_chunk(
        &self,
        manager: &mut SessionManager<'_, P>,
        ctx: &mut RunContext<'_>,
        work: &[(usize, String)],
        retries: u32,
    ) -> sweep_browser::Result<Vec<(usize, ResultTag)>> {
        if !manager.is_alive() {
            tracing::warn!("Browser session is gone, renewing before chunk");
            manager.recycle().await?;
        }

        let outcomes: Vec<(usize, CallOutcome)> = {
            let session = manager.session()?;
            match open_pages(session, work.len()).await {
                Ok(pages) => {
                    ctx.stats.extractor_calls += work.len();
                    let outcomes = join_all(work.iter().zip(&pages).map(
                        |((index, item), page)| async move {
                            let outcome = match self.extractor.extract(page, item, retries).await {
                                Ok(tag) => Ok(tag),
                                Err(ExtractError::SessionCrashed(reason)) => Err(reason),
                            };
                            (*index, outcome)
                        },
                    ))
                    .await;
                    for page in pages {
                        session.close_page(page).await;
                    }
                    outcomes
                }
                Err(e) => {
                    let reason = format!("could not open chunk pages: {e}");
                    work.iter().map(|(index, _)| (*index, Err(reason.clone()))).collect()
                }
            }
        };

        let mut decided = Vec::with_capacity(work.len());
        let mut crashed = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(tag) => decided.push((index, tag)),
                Err(reason) => {
                    tracing::warn!("Session lost on item {}: {}", index, reason);
                    crashed.push(index);
                }
            }
        }

        if !crashed.is_empty() {
            manager.recycle().await?;
            for (index, item) in work.iter().filter(|(i, _)| crashed.contains(i)) {
                ctx.stats.crash_recoveries += 1;
                let tag = self.retry_after_crash(manager, ctx, item, retries).await?;
                decided.push((*index, tag));
            }
        }

        Ok(decided)
    }

    /// Extract one item, recovering once from a session crash.
    async fn extract_one(
        &self,
        manager: &mut SessionManager<'_, P>,
        ctx: &mut RunContext<'_>,
        item: &str,
        retries: u32,
    ) -> sweep_browser::Result<ResultTag> {
        if !manager.is_alive() {
            tracing::warn!("Browser session is gone, renewing before {}", item);
            manager.recycle().await?;
        }

        match self.call_extractor(manager, ctx, item, retries).await? {
            Ok(tag) => Ok(tag),
            Err(reason) => {
                tracing::warn!(
                    "Session crashed on {} ({}), renewing and retrying once",
                    item,
                    reason
                );
                ctx.stats.crash_recoveries += 1;
                manager.recycle().await?;
                self.retry_after_crash(manager, ctx, item, retries).await
            }
        }
    }

    /// The one extra attempt an item gets after its session crashed. A
    /// second crash marks the item `TransientError`.
    async fn retry_after_crash(
        &self,
        manager: &mut SessionManager<'_, P>,
        ctx: &mut RunContext<'_>,
        item: &str,
        retries: u32,
    ) -> sweep_browser::Result<ResultTag> {
        match self.call_extractor(manager, ctx, item, retries).await? {
            Ok(tag) => Ok(tag),
            Err(reason) => {
                tracing::warn!("Session crashed again on {} ({}), giving up", item, reason);
                manager.recycle().await?;
                Ok(ResultTag::TransientError)
            }
        }
    }

    async fn call_extractor(
        &self,
        manager: &SessionManager<'_, P>,
        ctx: &mut RunContext<'_>,
        item: &str,
        retries: u32,
    ) -> sweep_browser::Result<CallOutcome> {
        ctx.stats.extractor_calls += 1;
        let session = manager.session()?;
        match self.extractor.extract(session.page(), item, retries).await {
            Ok(tag) => Ok(Ok(tag)),
            Err(ExtractError::SessionCrashed(reason)) => Ok(Err(reason)),
        }
    }

    /// Hand the full current results to the sink. Failures are logged and
    /// counted; the run goes on.
    async fn flush(&self, ctx: &mut RunContext<'_>, last: bool) {
        let Some(sink) = self.sink else {
            return;
        };

        ctx.stats.flushes += 1;
        match sink.flush(ctx.store.as_slice()).await {
            Ok(()) => {
                tracing::debug!(
                    "Checkpoint saved: {}/{} decided",
                    ctx.store.decided(),
                    ctx.total()
                );
            }
            Err(e) if last => {
                ctx.stats.failed_flushes += 1;
                ctx.stats.final_flush_failed = true;
                tracing::error!("Final checkpoint failed: {}", e);
            }
            Err(e) => {
                ctx.stats.failed_flushes += 1;
                tracing::warn!("Checkpoint failed, the next flush will retry: {}", e);
            }
        }
    }
}

async fn open_pages<S: Session>(session: &S, count: usize) -> sweep_browser::Result<Vec<S::Page>> {
    let mut pages = Vec::with_capacity(count);
    for _ in 0..count {
        match session.open_page().await {
            Ok(page) => pages.push(page),
            Err(e) => {
                for page in pages {
                    session.close_page(page).await;
                }
                return Err(e);
            }
        }
    }
    Ok(pages)
}
