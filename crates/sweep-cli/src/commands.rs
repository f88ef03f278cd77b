//! `run` and `show` subcommands.

use crate::cli::{ExtractorKind, RunArgs, ShowArgs};
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sweep_browser::ChromiumProvider;
use sweep_core::{
    AppConfig, CheckpointSink, Item, PlainFormatter, ResultTag, RunId, StatusFormatter,
    TracingProgress,
};
use sweep_db::results::{load_items, load_results};
use sweep_db::runs::{create_or_resume_run, get_run, list_runs};
use sweep_db::{Database, SqliteSink};
use sweep_extract::{Extractor, MicrochipExtractor, MileageExtractor, RegistrationExtractor};
use sweep_scanner::{
    load_checkpoint, ExecutionMode, JsonFileSink, Orchestrator, ResumePolicy, RunOptions,
};

const DEFAULT_DB_FILE: &str = "sweep.db";

/// Where a run reads its prior results from and checkpoints to.
enum Store {
    Database { db: Database, run_id: RunId },
    File(PathBuf),
    None,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let items = read_items(&args.input).await?;
    if items.is_empty() {
        tracing::warn!("{} contains no items", args.input.display());
    }

    let store = open_store(&args, &config).await?;
    let (initial, sink): (Vec<ResultTag>, Option<Box<dyn CheckpointSink>>) = match &store {
        Store::Database { db, run_id } => {
            let run = create_or_resume_run(db.pool(), run_id, args.extractor.name(), items.len())
                .await?;
            let prior = load_results(db.pool(), &run.id).await?;
            let sink: Box<dyn CheckpointSink> =
                Box::new(SqliteSink::new(db.pool().clone(), run.id, items.clone()));
            (prior, Some(sink))
        }
        Store::File(path) => {
            let prior = load_checkpoint(path)
                .await
                .with_context(|| format!("reading checkpoint {}", path.display()))?;
            let sink: Box<dyn CheckpointSink> = Box::new(JsonFileSink::new(path));
            (prior, Some(sink))
        }
        Store::None => {
            tracing::warn!("No database or checkpoint configured; results will only be printed");
            (Vec::new(), None)
        }
    };

    let options = run_options(&args, &config).with_initial_results(initial);
    let navigation_timeout = Duration::from_secs(config.browser.navigation_timeout_secs);
    let extractor = build_extractor(args.extractor, navigation_timeout);
    let provider = ChromiumProvider::new(config.browser.clone());
    let progress = TracingProgress;

    let mut orchestrator =
        Orchestrator::new(&provider, extractor.as_ref()).with_progress(&progress);
    if let Some(sink) = sink.as_deref() {
        orchestrator = orchestrator.with_sink(sink);
    }

    let outcome = orchestrator.run(&items, options).await;

    if let Store::Database { db, run_id } = store {
        tracing::info!("Results stored under run '{}'", run_id);
        db.close().await;
    }

    match outcome {
        Ok(report) => {
            print_results(&items, &report.results)?;
            if report.stats.final_flush_failed {
                bail!("results were computed but the final checkpoint could not be written");
            }
            Ok(())
        }
        Err(err) => {
            if let Some(partial) = err.partial_results() {
                print_results(&items, partial)?;
            }
            Err(err.into())
        }
    }
}

pub async fn show(args: ShowArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let path = database_path(args.db.as_deref(), &config)?;
    if !path.exists() {
        bail!("database {} does not exist", path.display());
    }
    let db = Database::open(&path).await?;

    let Some(run_id) = args.run_id else {
        let runs = list_runs(db.pool()).await?;
        let mut out = std::io::stdout().lock();
        for run in runs {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                run.id,
                run.extractor,
                run.item_count,
                run.updated_at.to_rfc3339()
            )?;
        }
        db.close().await;
        return Ok(());
    };

    let run_id = RunId::new(run_id)?;
    if get_run(db.pool(), &run_id).await?.is_none() {
        bail!("run '{run_id}' not found in {}", path.display());
    }

    let results = load_results(db.pool(), &run_id).await?;
    let items = load_items(db.pool(), &run_id).await?;
    db.close().await;

    print_results(&items, &results)
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env_from(path)?,
        None => AppConfig::load_with_env()?,
    };
    Ok(config)
}

async fn open_store(args: &RunArgs, config: &AppConfig) -> Result<Store> {
    if let Some(path) = &args.checkpoint {
        return Ok(Store::File(path.clone()));
    }

    let wants_db = args.db.is_some() || args.run_id.is_some();
    if !wants_db {
        if let Some(path) = &config.storage.checkpoint_path {
            return Ok(Store::File(path.clone()));
        }
        if config.storage.database_path.is_none() {
            return Ok(Store::None);
        }
    }

    let path = database_path(args.db.as_deref(), config)?;
    let run_id = match &args.run_id {
        Some(id) => RunId::new(id.clone())?,
        None => {
            let id = RunId::generate();
            tracing::info!("No run id given, starting run '{}'", id);
            id
        }
    };
    let db = Database::open(&path)
        .await
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Store::Database { db, run_id })
}

fn database_path(flag: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = &config.storage.database_path {
        return Ok(path.clone());
    }
    Ok(AppConfig::data_dir()?.join(DEFAULT_DB_FILE))
}

fn run_options(args: &RunArgs, config: &AppConfig) -> RunOptions {
    let mut options = RunOptions::from_config(&config.run);
    if let Some(n) = args.batch_size {
        options = options.with_batch_size(n);
    }
    if let Some(n) = args.recycle_every {
        options = options.with_recycle_every(n);
    }
    if let Some(n) = args.retries {
        options = options.with_retries(n);
    }
    if let Some(url) = &args.init_url {
        options = options.with_init_url(url.clone());
    }
    if let Some(size) = args.chunk_size {
        options = options.with_mode(ExecutionMode::Chunked { size });
    }
    if args.keep_failed {
        options = options.with_resume(ResumePolicy::KeepAll);
    }
    options
}

/// Each extractor keeps its own settle and retry waits; only the
/// navigation bound comes from config.
fn build_extractor(kind: ExtractorKind, navigation_timeout: Duration) -> Box<dyn Extractor> {
    match kind {
        ExtractorKind::Microchip => {
            Box::new(MicrochipExtractor::new().with_navigation_timeout(navigation_timeout))
        }
        ExtractorKind::Mileage => {
            Box::new(MileageExtractor::new().with_navigation_timeout(navigation_timeout))
        }
        ExtractorKind::Registration => {
            Box::new(RegistrationExtractor::new().with_navigation_timeout(navigation_timeout))
        }
    }
}

/// One item per line, kept raw; normalization happens in the orchestrator.
async fn read_items(path: &Path) -> Result<Vec<Item>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading input {}", path.display()))?;
    Ok(parse_items(&contents))
}

fn parse_items(contents: &str) -> Vec<Item> {
    contents.lines().map(Item::from).collect()
}

fn print_results(items: &[Item], results: &[ResultTag]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for line in render_lines(items, results, &PlainFormatter) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// `index<TAB>item<TAB>status` for every result.
fn render_lines(
    items: &[Item],
    results: &[ResultTag],
    formatter: &dyn StatusFormatter,
) -> Vec<String> {
    results
        .iter()
        .enumerate()
        .map(|(index, tag)| {
            let item = items.get(index).map_or("", Item::as_str);
            format!("{index}\t{item}\t{}", formatter.render(tag))
        })
        .collect()
}
