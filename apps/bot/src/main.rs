//! Sentinel Bot
//!
//! Watches scanner node SLA and incoming token transfers to
//! registered wallets, alerting over Telegram.

mod commands;
mod config;

use clap::Parser;
use commands::{handle_command, BotContext, Command};
use config::AppConfig;
use sentinel_alerts::{Dispatcher as AlertDispatcher, TelegramNotifier};
use sentinel_monitor::{Controller, SlaClient};
use sentinel_registry::Registry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Sentinel Bot CLI
#[derive(Parser, Debug)]
#[command(name = "sentinel-bot")]
#[command(about = "Scanner SLA and wallet transfer monitoring bot", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match AppConfig::load(Path::new(&args.config)) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config {}: {e}", args.config);
            return;
        }
    };

    let token =
        std::env::var("SENTINEL_BOT_TOKEN").unwrap_or_else(|_| config.bot.token.clone());
    if token.is_empty() {
        error!("bot token missing (set bot.token in the config or SENTINEL_BOT_TOKEN)");
        return;
    }

    // an unreadable registry is fatal: continuing with unknown state
    // risks silently losing entries on the next persist
    let registry = match Registry::load(&config.db_path).await {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("cannot load registry at {}: {e}", config.db_path.display());
            return;
        }
    };

    let sla = match SlaClient::new(
        config.url.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("cannot build sla client: {e}");
            return;
        }
    };

    let bot = Bot::new(token);
    let notifier = Arc::new(TelegramNotifier::with_bot(
        bot.clone(),
        config.bot.allowed_users.clone(),
    ));
    let dispatcher = Arc::new(AlertDispatcher::new(notifier, config.dedup_capacity));

    let controller = Arc::new(Controller::new(
        registry.clone(),
        dispatcher,
        sla.clone(),
        config.monitor_settings(),
    ));

    info!(
        chains = config.chains.len(),
        db = %config.db_path.display(),
        "sentinel bot starting"
    );

    let ctx = Arc::new(BotContext {
        registry,
        controller: controller.clone(),
        sla,
        config,
    });

    let handler = Update::filter_message().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let ctx = Arc::clone(&ctx);
            async move { handle_command(ctx, bot, msg, cmd).await }
        },
    );

    teloxide::dispatching::Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // command loop ended (ctrl-c); wind the monitor down if active
    if controller.is_running().await {
        let _ = controller.stop().await;
    }
    info!("sentinel bot stopped");
}
