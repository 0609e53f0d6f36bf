//! Settings resolution: an optional JSON file merged under CLI/env values.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use issuebot_runtime::{
    BotRuntimeSettings, DEFAULT_MAX_MESSAGE_LENGTH, DEFAULT_POLL_INTERVAL,
    DEFAULT_TELEGRAM_API_BASE,
};
use serde::Deserialize;

use crate::cli_args::Cli;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SettingsFile {
    pub(crate) jira_url: Option<String>,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) bot_token: Option<String>,
    pub(crate) bot_endpoint: Option<String>,
    /// Poll interval in milliseconds.
    pub(crate) timeout: Option<u64>,
    pub(crate) message_length: Option<usize>,
}

pub(crate) struct ResolvedSettings {
    pub(crate) jira_url: String,
    pub(crate) jira_user: String,
    pub(crate) jira_password: String,
    pub(crate) bot_token: String,
    pub(crate) bot_endpoint: String,
    pub(crate) runtime: BotRuntimeSettings,
}

pub(crate) fn load_settings_file(path: &Path) -> Result<SettingsFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

/// URL-like values are trimmed before use.
fn pick_url(cli: Option<&String>, file: Option<String>) -> Option<String> {
    cli.cloned()
        .or(file)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Credentials are passed through verbatim; blank values count as missing.
fn pick_secret(cli: Option<&String>, file: Option<String>) -> Option<String> {
    cli.cloned()
        .or(file)
        .filter(|value| !value.trim().is_empty())
}

pub(crate) fn resolve_settings(cli: &Cli, file: SettingsFile) -> Result<ResolvedSettings> {
    let Some(jira_url) = pick_url(cli.jira_url.as_ref(), file.jira_url) else {
        bail!("missing Jira URL: pass --jira-url or set jiraUrl in the settings file");
    };
    let (Some(jira_user), Some(jira_password)) = (
        pick_secret(cli.jira_user.as_ref(), file.user),
        pick_secret(cli.jira_password.as_ref(), file.password),
    ) else {
        bail!("missing Jira credentials: both a user and a password are required");
    };
    let Some(bot_token) = pick_secret(cli.bot_token.as_ref(), file.bot_token) else {
        bail!("missing bot token: pass --bot-token or set botToken in the settings file");
    };
    let bot_endpoint = pick_url(cli.bot_endpoint.as_ref(), file.bot_endpoint)
        .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string());

    let poll_interval = match cli.poll_interval_ms.or(file.timeout) {
        Some(0) => bail!("poll interval must be greater than 0"),
        Some(millis) => Duration::from_millis(millis),
        None => DEFAULT_POLL_INTERVAL,
    };
    let max_message_length = match cli.max_message_length.or(file.message_length) {
        Some(0) => bail!("max message length must be greater than 0"),
        Some(length) => length,
        None => DEFAULT_MAX_MESSAGE_LENGTH,
    };

    Ok(ResolvedSettings {
        jira_url,
        jira_user,
        jira_password,
        bot_token,
        bot_endpoint,
        runtime: BotRuntimeSettings {
            poll_interval,
            max_message_length,
        },
    })
}
