//! Telegram command surface mapped onto the registry and controller.
//!
//! Contains no monitoring logic; each command calls the engine's
//! public API and formats the outcome as reply text.

use crate::config::AppConfig;
use sentinel_core::Address;
use sentinel_monitor::{Controller, SlaClient};
use sentinel_registry::Registry;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::warn;

/// Bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show this help message")]
    Help,
    #[command(description = "Show the telegram chat id")]
    ChatId,
    #[command(description = "Manage scanners: /scanner <add|remove|alert|status|list> ...")]
    Scanner(String),
    #[command(description = "Manage wallets: /wallet <add|remove|list> ...")]
    Wallet(String),
    #[command(description = "Show configured chains")]
    Chains,
    #[command(description = "Start monitoring")]
    Start,
    #[command(description = "Stop monitoring")]
    Stop,
}

/// Shared handles the command handlers work against.
pub struct BotContext {
    pub registry: Arc<Registry>,
    pub controller: Arc<Controller>,
    pub sla: SlaClient,
    pub config: AppConfig,
}

pub async fn handle_command(
    ctx: Arc<BotContext>,
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let authorized = ctx.config.bot.allowed_users.contains(&chat_id.0);

    // /help and /chatid are public; everything else is allow-listed
    let reply = match cmd {
        Command::Help => Command::descriptions().to_string(),
        Command::ChatId => format!("CHAT ID: {chat_id}"),
        _ if !authorized => {
            warn!(chat = chat_id.0, "command from unauthorized chat ignored");
            return Ok(());
        }
        Command::Scanner(args) => scanner_command(&ctx, &args).await,
        Command::Wallet(args) => wallet_command(&ctx, &args).await,
        Command::Chains => chains_reply(&ctx.config),
        Command::Start => match ctx.controller.start().await {
            Ok(()) => "Monitoring started".to_string(),
            Err(e) => e.to_string(),
        },
        Command::Stop => match ctx.controller.stop().await {
            Ok(()) => "Monitoring stopped".to_string(),
            Err(e) => e.to_string(),
        },
    };

    bot.send_message(chat_id, reply).await?;
    Ok(())
}

async fn scanner_command(ctx: &BotContext, args: &str) -> String {
    let mut parts = args.split_whitespace();
    match parts.next() {
        Some("add") => match (parts.next(), parts.next()) {
            (Some(name), Some(address)) => scanner_add(ctx, name, address).await,
            _ => "Usage: /scanner add <name> <address>".to_string(),
        },
        Some("remove") => match parts.next() {
            Some(name) => match ctx.registry.remove_scanner(name).await {
                Ok(()) => format!("SCANNER REMOVED\n{name}"),
                Err(e) => e.to_string(),
            },
            None => "Usage: /scanner remove <name>".to_string(),
        },
        Some("alert") => match parts.next().map(str::parse::<f64>) {
            Some(Ok(threshold)) => match ctx.registry.set_threshold(threshold).await {
                Ok(()) => format!("ALERT UPDATED\nsla-threshold: {threshold}"),
                Err(e) => e.to_string(),
            },
            Some(Err(_)) => "Invalid number format".to_string(),
            None => "Usage: /scanner alert <sla-threshold>".to_string(),
        },
        Some("status") => scanner_status(ctx).await,
        Some("list") => scanner_list(ctx).await,
        _ => "Unknown scanner action. Available: add, remove, alert, status, list".to_string(),
    }
}

/// Adding a scanner checks the status endpoint first, so typos in the
/// address are caught at registration time.
async fn scanner_add(ctx: &BotContext, name: &str, address: &str) -> String {
    let parsed: Address = match address.parse() {
        Ok(a) => a,
        Err(e) => return e.to_string(),
    };
    if let Err(e) = ctx.sla.fetch(&parsed).await {
        return format!("Scanner address not reachable: {e}");
    }
    match ctx.registry.add_scanner(name, address).await {
        Ok(entry) => format!("SCANNER ADDED\n{}: {}", entry.name, entry.address),
        Err(e) => e.to_string(),
    }
}

async fn scanner_status(ctx: &BotContext) -> String {
    let scanners = ctx.registry.scanners().await;
    let status = if ctx.controller.is_running().await {
        "ACTIVE"
    } else {
        "INACTIVE"
    };

    let mut out = format!("SCANNER STATUS ({status})\n");
    for scanner in &scanners {
        match ctx.sla.fetch(&scanner.address).await {
            Ok(sla) => out.push_str(&format!("\n{}: {sla:.4}", scanner.name)),
            Err(_) => out.push_str(&format!("\n{}: unreachable", scanner.name)),
        }
    }
    out.push_str(&format!("\nCOUNT: {}", scanners.len()));
    out
}

async fn scanner_list(ctx: &BotContext) -> String {
    let threshold = ctx.registry.threshold().await;
    let scanners = ctx.registry.scanners().await;

    let mut out = format!("SCANNER CONFIG (SLA-THRESHOLD: {threshold})\n");
    for scanner in &scanners {
        out.push_str(&format!("\n{}:\n  * {}", scanner.name, scanner.address));
    }
    out.push_str(&format!("\nCOUNT: {}", scanners.len()));
    out
}

async fn wallet_command(ctx: &BotContext, args: &str) -> String {
    let mut parts = args.split_whitespace();
    match parts.next() {
        Some("add") => match (parts.next(), parts.next()) {
            (Some(name), Some(address)) => match ctx.registry.add_wallet(name, address).await {
                Ok(entry) => format!("WALLET ADDED\n{}: {}", entry.name, entry.address),
                Err(e) => e.to_string(),
            },
            _ => "Usage: /wallet add <name> <address>".to_string(),
        },
        Some("remove") => match parts.next() {
            Some(name) => match ctx.registry.remove_wallet(name).await {
                Ok(()) => format!("WALLET REMOVED\n{name}"),
                Err(e) => e.to_string(),
            },
            None => "Usage: /wallet remove <name>".to_string(),
        },
        Some("list") => {
            let wallets = ctx.registry.wallets().await;
            let mut out = String::from("WALLET CONFIG\n");
            for wallet in &wallets {
                out.push_str(&format!("\n{}: {}", wallet.name, wallet.address));
            }
            out.push_str(&format!("\nCOUNT: {}", wallets.len()));
            out
        }
        _ => "Unknown wallet action. Available: add, remove, list".to_string(),
    }
}

fn chains_reply(config: &AppConfig) -> String {
    let mut out = String::from("CHAIN CONFIG\n");
    for (id, chain) in &config.chains {
        out.push_str(&format!(
            "\n{id}:\n  * url: {}\n  * token: {} ({}, {} decimals)",
            chain.url, chain.token, chain.symbol, chain.decimals
        ));
    }
    out.push_str(&format!("\nCOUNT: {}", config.chains.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn commands_parse() {
        let cmd = Command::parse("/scanner add node1 0xabc", "sentinel_bot").unwrap();
        match cmd {
            Command::Scanner(args) => assert_eq!(args, "add node1 0xabc"),
            _ => panic!("wrong command"),
        }

        assert!(matches!(
            Command::parse("/start", "sentinel_bot").unwrap(),
            Command::Start
        ));
        assert!(Command::parse("/unknown", "sentinel_bot").is_err());
    }

    #[test]
    fn chain_listing_format() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "bot": {"token": "t", "allowed_users": [1]},
                "scanner_pool_interval": 300,
                "db_path": "db.json",
                "url": "https://status.example/sla/",
                "chains": {
                    "eth": {"url": "wss://mainnet.example/ws", "token": "0x41545f8b9472d758bb671ea8a61499854269fa1a"}
                }
            }"#,
        )
        .unwrap();

        let text = chains_reply(&config);
        assert!(text.contains("eth:"));
        assert!(text.contains("wss://mainnet.example/ws"));
        assert!(text.contains("COUNT: 1"));
    }
}
