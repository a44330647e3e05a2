use crate::blocklist::Blocklist;
use crate::config::RunOptions;
use crate::cursor::CursorSource;
use crate::data::{Database, SELECT_DOMAINS, current_timestamp, due_domain_params};
use crate::dispatch::{Dispatcher, RunReport};
use crate::error::DispatchError;
use crate::progress::Progress;
use crate::sink::ResultSink;
use std::sync::Arc;
use tracing::info;
use webfingerable_scanner::{ProbeConfig, Prober};

/// Open the store and probe every domain that is due.
pub async fn execute_run(
    options: RunOptions,
    progress: Arc<Progress>,
) -> Result<RunReport, DispatchError> {
    let db = Database::new(&options.database)?;
    let blocklist = match &options.blocklist {
        Some(path) => Blocklist::load(path)?,
        None => Blocklist::default(),
    };
    info!("Loaded {} blocked domain suffixes", blocklist.len());

    run_with(db, blocklist, &options, progress).await
}

/// Same as [`execute_run`] over an already open store.
pub async fn run_with(
    db: Database,
    blocklist: Blocklist,
    options: &RunOptions,
    progress: Arc<Progress>,
) -> Result<RunReport, DispatchError> {
    let expiry = options.expiry();
    let run_started = current_timestamp();

    let config = ProbeConfig::default()
        .with_timeout(options.request_timeout)
        .with_scheme(options.scheme.as_str());
    let prober = Arc::new(Prober::new(config, db.clone())?);

    let mut source = CursorSource::new(
        db.clone(),
        SELECT_DOMAINS,
        due_domain_params(expiry, run_started),
        options.page_size,
        options.quota,
        |row| row.get(0),
    )?;

    let dispatcher = Dispatcher::new(prober, ResultSink::new(db), options.concurrency, expiry)
        .with_blocklist(Arc::new(blocklist))
        .with_progress(progress);

    dispatcher.run(&mut source).await
}
