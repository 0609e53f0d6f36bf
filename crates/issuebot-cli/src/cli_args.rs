use std::path::PathBuf;

use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Default, Parser)]
#[command(
    name = "issuebot",
    about = "Chat bot bridging Telegram conversations to a Jira issue tracker",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "ISSUEBOT_SETTINGS",
        help = "Optional JSON settings file (jiraUrl, user, password, botToken, botEndpoint, timeout, messageLength)"
    )]
    pub settings: Option<PathBuf>,

    #[arg(
        long = "jira-url",
        env = "ISSUEBOT_JIRA_URL",
        help = "Base URL of the Jira instance, without the REST path"
    )]
    pub jira_url: Option<String>,

    #[arg(
        long = "jira-user",
        env = "ISSUEBOT_JIRA_USER",
        help = "Jira username used for Basic authentication"
    )]
    pub jira_user: Option<String>,

    #[arg(
        long = "jira-password",
        env = "ISSUEBOT_JIRA_PASSWORD",
        hide_env_values = true,
        help = "Jira password or API token used for Basic authentication"
    )]
    pub jira_password: Option<String>,

    #[arg(
        long = "bot-token",
        env = "ISSUEBOT_BOT_TOKEN",
        hide_env_values = true,
        help = "Telegram bot token"
    )]
    pub bot_token: Option<String>,

    #[arg(
        long = "bot-endpoint",
        env = "ISSUEBOT_BOT_ENDPOINT",
        help = "Telegram Bot API base URL (default https://api.telegram.org)"
    )]
    pub bot_endpoint: Option<String>,

    #[arg(
        long = "poll-interval-ms",
        env = "ISSUEBOT_POLL_INTERVAL_MS",
        value_parser = parse_positive_u64,
        help = "Interval between tracked-issue status polls in milliseconds (default 60000)"
    )]
    pub poll_interval_ms: Option<u64>,

    #[arg(
        long = "max-message-length",
        env = "ISSUEBOT_MAX_MESSAGE_LENGTH",
        value_parser = parse_positive_usize,
        help = "Maximum characters per digest message before splitting (default 4000)"
    )]
    pub max_message_length: Option<usize>,
}
