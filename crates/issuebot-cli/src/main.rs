mod bootstrap_helpers;
mod bot_settings;
mod cli_args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use issuebot_runtime::{run_bot, BotContext, TelegramTransport, TelegramTransportConfig};
use issuebot_tracker::{JiraClient, JiraClientConfig};

use crate::bootstrap_helpers::init_tracing;
use crate::bot_settings::{load_settings_file, resolve_settings, SettingsFile};
use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}

async fn run_cli(cli: Cli) -> Result<()> {
    let file = match cli.settings.as_deref() {
        Some(path) => load_settings_file(path)?,
        None => SettingsFile::default(),
    };
    let settings = resolve_settings(&cli, file)?;

    let tracker = JiraClient::new(JiraClientConfig {
        base_url: settings.jira_url.clone(),
        username: settings.jira_user,
        password: settings.jira_password,
    })
    .context("failed to build Jira client")?;
    let transport = TelegramTransport::new(TelegramTransportConfig::new(
        settings.bot_endpoint,
        settings.bot_token,
    ))?;
    tracing::info!(
        jira_url = %settings.jira_url,
        poll_interval_ms = settings.runtime.poll_interval.as_millis() as u64,
        max_message_length = settings.runtime.max_message_length,
        "starting issue bot"
    );

    let context = BotContext::new(Arc::new(tracker), Arc::new(transport), settings.runtime);
    run_bot(context).await?;
    Ok(())
}
