//! engulf-alert daemon
//!
//! Usage:
//!   engulf-alert --config configs/engulf-alert.toml
//!   engulf-alert --once --dry-run

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use engulf_alert::{
    config::{resolve_config_path, Config, CONFIG_PATH_ENV},
    dedup::SignalDeduplicator,
    logging::init_logging,
    notifier::{LogNotifier, Notifier, TelegramNotifier},
    scheduler::Scheduler,
};

#[derive(Parser, Debug)]
#[command(name = "engulf-alert")]
#[command(about = "EMA pullback + engulfing candle alert bot")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Log alerts instead of sending them to Telegram
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let config_path = resolve_config_path(args.config.clone(), std::env::var(CONFIG_PATH_ENV).ok());
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.apply_env(|name| std::env::var(name).ok());

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, args.json_logs || config.logging.json).context("initialising logging")?;

    if config_path.exists() {
        info!(path = %config_path.display(), "Loaded configuration");
    } else {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
    }
    config.validate().context("invalid configuration")?;

    let notifier = build_notifier(&config, args.dry_run)?;
    let watches = config.watches().context("building market data sources")?;

    let mut scheduler = Scheduler::new(watches, config.timeframes.clone(), notifier)
        .with_analysis(config.analysis_settings())
        .with_settings(config.scheduler_settings())
        .with_dedup(SignalDeduplicator::new(config.cooldown()));

    info!(
        instruments = ?config.instruments.iter().map(|i| i.symbol.as_str()).collect::<Vec<_>>(),
        timeframes = ?config.timeframes,
        periods = ?config.ema_periods,
        "Bot started"
    );

    if args.once {
        let report = scheduler.run_pass().await;
        info!(
            pairs = report.pairs,
            failed = report.failed_pairs,
            signals = report.signals,
            sent = report.sent,
            "Single pass complete"
        );
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping by user");
            let _ = stop_tx.send(true);
        }
    });

    scheduler.run(stop_rx).await;
    Ok(())
}

fn build_notifier(config: &Config, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        info!("Dry run: alerts are logged, not sent");
        return Ok(Arc::new(LogNotifier));
    }

    let (Some(token), Some(chat_id)) = (&config.telegram.token, &config.telegram.chat_id) else {
        bail!("TELEGRAM_TOKEN and TELEGRAM_CHAT_ID must be set (or pass --dry-run)");
    };
    let notifier = TelegramNotifier::new(token.clone(), chat_id.clone(), config.http_timeout())
        .context("building Telegram client")?
        .with_api_base(config.telegram.api_base.clone());
    Ok(Arc::new(notifier))
}
