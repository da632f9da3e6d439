mod config;
mod context;
mod event;
mod extension;
mod handler;
mod helper;
mod logging;
mod plugin;
mod report;
mod tasks;

use anyhow::{anyhow, Result};
use config::Config;
use extension::{ExtensionDir, Extensions, DEFAULT_FOLDER};
use serenity::{
    all::{ActivityData, GatewayIntents, Http, OnlineStatus, UserId},
    Client,
};
use std::{sync::Arc, time::Duration};
use tasks::BackgroundTasks;

/// How long shutdown waits for owner notifications still in flight
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    // Capture a backtrace where each error is created.  Must happen before any threads start.
    if std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
        std::env::set_var("RUST_LIB_BACKTRACE", "1");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run())
}

async fn run() -> Result<()> {
    let cfg = Arc::new(Config::load().await?);
    logging::init(&cfg.log_file)?;

    match &cfg.database_url {
        Some(_) => log_internal!("Database connection configured"),
        None => log::debug!("No database configured"),
    }

    let extensions = Arc::new(Extensions::new(
        ExtensionDir::locate(&cfg.extension_root, DEFAULT_FOLDER),
        extension::registry(),
    ));
    extensions.load_all(&cfg).await?;

    let owner = resolve_owner(&cfg).await?;
    let tasks = Arc::new(BackgroundTasks::new());
    let handler = handler::Handler::new(cfg.clone(), owner, extensions, tasks.clone());

    // Things we want discord to tell us about.
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&cfg.discord_token, intents)
        .event_handler(handler)
        .activity(ActivityData::custom("Loading..."))
        .status(OnlineStatus::Idle)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_internal!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await?;

    if tokio::time::timeout(SHUTDOWN_GRACE, tasks.join_all())
        .await
        .is_err()
    {
        log::warn!("Background tasks still running after {:?}", SHUTDOWN_GRACE);
        tasks.abort_all().await;
    }

    Ok(())
}

/// Configured owner, or whoever owns the application
async fn resolve_owner(cfg: &Config) -> Result<UserId> {
    if let Some(owner) = cfg.owner_id {
        return Ok(owner);
    }

    let info = Http::new(&cfg.discord_token)
        .get_current_application_info()
        .await?;
    match (info.team, info.owner) {
        (Some(team), _) => Ok(team.owner_user_id),
        (None, Some(owner)) => Ok(owner.id),
        (None, None) => Err(anyhow!("Could not determine the bot owner, set `OWNER_ID`")),
    }
}
