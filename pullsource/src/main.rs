use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use pullsource_core::{PollingCoordinator, SourceConfig};
use pullsource_http::{HttpFetcher, HttpSourceConfig, JsonResponseParser, KvRecordMapper};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::checkpoint::FileCheckpointStore;
use crate::host::HostConfig;

mod checkpoint;
mod cmdline;
mod host;
mod settings;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();
    let checkpoint = matches
        .get_one::<PathBuf>(cmdline::CHECKPOINT)
        .cloned()
        .ok_or("checkpoint path is required")?;
    let commit_interval = matches
        .get_one::<u64>(cmdline::COMMIT_INTERVAL_MILLIS)
        .copied()
        .map(Duration::from_millis)
        .ok_or("commit interval is required")?;
    let overrides: Vec<String> = matches
        .get_many::<String>(cmdline::SET)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let settings = settings::load(env::vars(), overrides)?;
    let config = SourceConfig::load(settings.clone())?;
    let http = HttpSourceConfig::load(settings)?;
    info!(checkpoint = %checkpoint.display(), url = %http.request.url, "Starting pull source");

    let store = FileCheckpointStore::new(&checkpoint);
    let cancel = CancellationToken::new();
    let host_config = HostConfig {
        commit_interval,
        retry_interval: config.sleep_interval,
    };

    let coordinator = PollingCoordinator::start(
        config,
        HttpFetcher::new(&http)?,
        JsonResponseParser::new(http.response.clone()),
        KvRecordMapper::default(),
        &store,
        cancel.clone(),
    )
    .await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal");
        shutdown.cancel();
    });

    let mut stdout = std::io::stdout().lock();
    let offset = host::run(coordinator, store, &mut stdout, host_config, cancel).await?;
    info!(%offset, "Pull source stopped");

    Ok(())
}
