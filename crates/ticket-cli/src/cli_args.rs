use anyhow::Result;
use clap::Parser;
use ticket_commands::DEFAULT_COMMAND_PREFIX;
use ticket_core::parse_snowflake;
use ticket_discord_runtime::{
    parse_category_staff_roles, DiscordTicketRuntimeConfig, DEFAULT_DISCORD_API_BASE,
};

use crate::{CliProvisioningMode, CliTicketKeyMode};

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

fn parse_snowflake_arg(value: &str) -> Result<u64, String> {
    parse_snowflake(value).map_err(|error| error.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "ticketbot",
    about = "Discord support-ticket bot with private per-requester ticket channels",
    version
)]
pub struct Cli {
    #[arg(
        long = "discord-bot-token",
        env = "TICKETBOT_DISCORD_BOT_TOKEN",
        hide_env_values = true,
        help = "Discord bot token used for the gateway connection and REST calls"
    )]
    pub discord_bot_token: String,

    #[arg(
        long = "discord-guild-id",
        env = "TICKETBOT_DISCORD_GUILD_ID",
        value_parser = parse_snowflake_arg,
        help = "Guild (server) whose ticket commands are served"
    )]
    pub discord_guild_id: u64,

    #[arg(
        long = "discord-api-base",
        env = "TICKETBOT_DISCORD_API_BASE",
        default_value = DEFAULT_DISCORD_API_BASE,
        help = "Base URL for the Discord REST API"
    )]
    pub discord_api_base: String,

    #[arg(
        long = "command-prefix",
        env = "TICKETBOT_COMMAND_PREFIX",
        default_value = DEFAULT_COMMAND_PREFIX,
        help = "Prefix for text commands such as !ticket"
    )]
    pub command_prefix: String,

    #[arg(
        long = "service-user-id",
        env = "TICKETBOT_SERVICE_USER_ID",
        value_parser = parse_snowflake_arg,
        help = "Bot user id granted access to every ticket; resolved from /users/@me when omitted"
    )]
    pub service_user_id: Option<u64>,

    #[arg(
        long = "staff-role-ids",
        env = "TICKETBOT_STAFF_ROLE_IDS",
        value_delimiter = ',',
        value_parser = parse_snowflake_arg,
        help = "Roles that can see every ticket and run staff commands"
    )]
    pub staff_role_ids: Vec<u64>,

    #[arg(
        long = "category-staff-role",
        env = "TICKETBOT_CATEGORY_STAFF_ROLES",
        value_delimiter = ',',
        help = "Category-scoped staff role in category=role_id form, e.g. hr=123456789012345678"
    )]
    pub category_staff_roles: Vec<String>,

    #[arg(
        long = "admin-user-ids",
        env = "TICKETBOT_ADMIN_USER_IDS",
        value_delimiter = ',',
        value_parser = parse_snowflake_arg,
        help = "Users allowed to run staff commands regardless of roles"
    )]
    pub admin_user_ids: Vec<u64>,

    #[arg(
        long = "ticket-parent-category-id",
        env = "TICKETBOT_TICKET_PARENT_CATEGORY_ID",
        value_parser = parse_snowflake_arg,
        help = "Optional channel category that new ticket channels are created under"
    )]
    pub ticket_parent_category_id: Option<u64>,

    #[arg(
        long = "ticket-key-mode",
        env = "TICKETBOT_TICKET_KEY_MODE",
        value_enum,
        default_value_t = CliTicketKeyMode::PerRequester,
        help = "Whether the one-open-ticket rule applies per requester or per requester and category"
    )]
    pub ticket_key_mode: CliTicketKeyMode,

    #[arg(
        long = "provisioning-mode",
        env = "TICKETBOT_PROVISIONING_MODE",
        value_enum,
        default_value_t = CliProvisioningMode::Discord,
        help = "Create real Discord channels, or keep tickets in memory (create-only; staff commands cannot address them)"
    )]
    pub provisioning_mode: CliProvisioningMode,

    #[arg(
        long = "request-timeout-ms",
        env = "TICKETBOT_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each Discord REST request in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "TICKETBOT_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for rate-limited or failed Discord REST requests"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "TICKETBOT_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential retry backoff in milliseconds"
    )]
    pub retry_base_delay_ms: u64,
}

impl Cli {
    pub fn runtime_config(&self) -> Result<DiscordTicketRuntimeConfig> {
        let config = DiscordTicketRuntimeConfig {
            bot_token: self.discord_bot_token.clone(),
            guild_id: self.discord_guild_id,
            api_base: self.discord_api_base.clone(),
            command_prefix: self.command_prefix.clone(),
            service_user_id: self.service_user_id,
            staff_role_ids: self.staff_role_ids.clone(),
            category_staff_role_ids: parse_category_staff_roles(&self.category_staff_roles)?,
            admin_user_ids: self.admin_user_ids.clone(),
            parent_category_id: self.ticket_parent_category_id,
            key_mode: self.ticket_key_mode.into(),
            provisioning_mode: self.provisioning_mode.into(),
            request_timeout_ms: self.request_timeout_ms,
            retry_max_attempts: self.retry_max_attempts,
            retry_base_delay_ms: self.retry_base_delay_ms,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use ticket_discord_runtime::ProvisioningMode;
    use ticket_lifecycle::{TicketCategory, TicketKeyMode};

    use super::Cli;

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut args = vec![
            "ticketbot",
            "--discord-bot-token",
            "token",
            "--discord-guild-id",
            "1000",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args)
    }

    #[test]
    fn unit_cli_defaults_match_original_bot_behavior() {
        let cli = parse(&[]).expect("parse");
        let config = cli.runtime_config().expect("config");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.key_mode, TicketKeyMode::PerRequester);
        assert_eq!(config.provisioning_mode, ProvisioningMode::Discord);
        assert_eq!(config.service_user_id, None);
        assert!(config.staff_role_ids.is_empty());
    }

    #[test]
    fn functional_cli_parses_id_lists_and_modes() {
        let cli = parse(&[
            "--staff-role-ids",
            "11,12",
            "--admin-user-ids",
            "21",
            "--category-staff-role",
            "hr=31,technical=32",
            "--ticket-key-mode",
            "per-requester-category",
            "--provisioning-mode",
            "dry-run",
        ])
        .expect("parse");
        let config = cli.runtime_config().expect("config");
        assert_eq!(config.staff_role_ids, vec![11, 12]);
        assert_eq!(config.admin_user_ids, vec![21]);
        assert_eq!(
            config.category_staff_role_ids.get(&TicketCategory::TechnicalIssues),
            Some(&vec![32])
        );
        assert_eq!(config.key_mode, TicketKeyMode::PerRequesterCategory);
        assert_eq!(config.provisioning_mode, ProvisioningMode::DryRun);
    }

    #[test]
    fn regression_cli_rejects_zero_ids_and_bad_category_roles() {
        assert!(parse(&["--staff-role-ids", "0"]).is_err());
        assert!(parse(&["--retry-max-attempts", "0"]).is_err());
        let cli = parse(&["--category-staff-role", "billing=5"]).expect("parse");
        assert!(cli.runtime_config().is_err());
    }
}
