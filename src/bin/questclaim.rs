//! questclaim binary: one monitor per account plus the upload form.

use anyhow::Context;
use clap::Parser;
use questclaim::upload::{self, UploadState};
use questclaim::{
    Account, AccountContext, AccountMonitor, BotConfig, MatchStore, SeenSet, app_dirs, notify,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// How often the supervisor checks that every monitor is still running.
const SUPERVISE_INTERVAL: Duration = Duration::from_secs(60);

/// Quest-board monitor that auto-claims tasks for registered accounts.
#[derive(Parser)]
#[command(name = "questclaim", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration (secrets masked) and exit.
    #[arg(long)]
    print_config: bool,

    /// Do not start the upload form.
    #[arg(long)]
    no_upload: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; variables may come from the environment.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = BotConfig::resolve(cli.config.as_deref())?;
    if cli.print_config {
        print!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(());
    }
    config.validate()?;

    let data_root = config.data_dir();
    let _log_guard = init_tracing(&config, &data_root)?;
    if let Ok(path) = dotenv {
        info!("loaded environment from {}", path.display());
    }

    info!(
        "questclaim v{} watching community `{}` for {} account(s)",
        env!("CARGO_PKG_VERSION"),
        config.community,
        config.accounts.len()
    );

    let store = MatchStore::new(&data_root);
    let notifier = notify::from_config(&config.telegram)?;

    if config.upload.enabled && !cli.no_upload {
        let listener = upload::bind(&config.upload).await?;
        let state = UploadState::new(
            store.clone(),
            config.accounts.iter().map(|a| a.name.trim().to_owned()).collect(),
            app_dirs::media_dir(&data_root),
            config.upload.public_base_url(),
        );
        let max_bytes = config.upload.max_upload_bytes;
        tokio::spawn(async move {
            if let Err(err) = upload::serve(listener, state, max_bytes).await {
                error!("upload form stopped: {err}");
            }
        });
    }

    let mut monitors = Vec::with_capacity(config.accounts.len());
    for (i, account_config) in config.accounts.iter().enumerate() {
        let account = Account::from(account_config);
        if account.cookie().is_empty() {
            warn!(account = account.name(), "account has no cookie; requests will be unauthenticated");
        }
        info!(
            "{}. {} (cookie: {})",
            i + 1,
            account.name(),
            account.cookie_preview()
        );

        let seen = load_seen(&config, &data_root, account.name())?;
        let name = account.name().to_owned();
        let ctx = AccountContext::new(&config, account, store.clone(), Arc::clone(&notifier))
            .with_context(|| format!("cannot set up account `{name}`"))?;
        let monitor = AccountMonitor::new(Arc::new(ctx), seen, &config);
        monitors.push((name, tokio::spawn(monitor.run())));
    }

    let mut ticker = tokio::time::interval(SUPERVISE_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let dead: Vec<&str> = monitors
                    .iter()
                    .filter(|(_, handle)| handle.is_finished())
                    .map(|(name, _)| name.as_str())
                    .collect();
                if !dead.is_empty() {
                    warn!("{} monitor(s) died: {}", dead.len(), dead.join(", "));
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    error!("cannot listen for Ctrl+C: {err}");
                }
                info!("received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    for (_, handle) in &monitors {
        handle.abort();
    }
    Ok(())
}

fn load_seen(config: &BotConfig, data_root: &Path, account: &str) -> anyhow::Result<SeenSet> {
    if !config.persist_seen {
        return Ok(SeenSet::in_memory());
    }
    let path = app_dirs::account_dir(data_root, account).join(questclaim::seen::SEEN_FILE);
    let seen = SeenSet::load(&path)
        .with_context(|| format!("cannot load seen set for `{account}`"))?;
    if !seen.is_empty() {
        info!(account, quests = seen.len(), "restored seen set");
    }
    Ok(seen)
}

/// Install the global subscriber. Keep the returned guard alive so the file
/// writer flushes.
fn init_tracing(
    config: &BotConfig,
    data_root: &Path,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("questclaim=info,quest_doc=info"));

    let (file_layer, guard) = if config.log_to_file {
        let dir = app_dirs::logs_dir(data_root);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, "questclaim.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}
