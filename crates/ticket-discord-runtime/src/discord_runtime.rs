//! Discord ticket runtime: wires the REST client, lifecycle manager and gateway.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serenity::all::GatewayIntents;
use ticket_commands::{LoggingTicketAnnouncer, TicketAnnouncer, TicketDispatcher};
use ticket_core::{parse_snowflake, Identity};
use ticket_lifecycle::{
    ChannelProvisioner, InMemoryChannelProvisioner, TicketCategory, TicketKeyMode,
    TicketLifecycleConfig, TicketLifecycleManager,
};

mod discord_adapters;
mod discord_api_client;
mod discord_gateway;
mod discord_permissions;

use discord_adapters::{DiscordChannelProvisioner, DiscordTicketAnnouncer};
use discord_api_client::DiscordApiClient;
use discord_gateway::{StaffAccessPolicy, TicketGatewayHandler, TicketMessageRouter};

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DRY_RUN_CHANNEL_PREFIX: &str = "dry-run-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Where ticket channels are provisioned.
pub enum ProvisioningMode {
    #[default]
    Discord,
    /// Ticket channels live in process memory and their announcements go to
    /// the log. Command replies still reach the real source channel.
    ///
    /// Dry-run tickets have no Discord channel to type in, so staff commands
    /// (`!claim`, `!add`, `!remove`, `!close`, `!info`) cannot address them
    /// and answer that the channel is not an open ticket. The mode exercises
    /// request parsing, uniqueness and grant computation only.
    DryRun,
}

impl ProvisioningMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::DryRun => "dry-run",
        }
    }
}

#[derive(Clone)]
/// Runtime configuration for the Discord ticket bot.
pub struct DiscordTicketRuntimeConfig {
    pub bot_token: String,
    pub guild_id: u64,
    pub api_base: String,
    pub command_prefix: String,
    /// Resolved through `GET /users/@me` when absent.
    pub service_user_id: Option<u64>,
    pub staff_role_ids: Vec<u64>,
    pub category_staff_role_ids: BTreeMap<TicketCategory, Vec<u64>>,
    pub admin_user_ids: Vec<u64>,
    pub parent_category_id: Option<u64>,
    pub key_mode: TicketKeyMode,
    pub provisioning_mode: ProvisioningMode,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl std::fmt::Debug for DiscordTicketRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordTicketRuntimeConfig")
            .field("bot_token", &"<redacted>")
            .field("guild_id", &self.guild_id)
            .field("api_base", &self.api_base)
            .field("command_prefix", &self.command_prefix)
            .field("service_user_id", &self.service_user_id)
            .field("staff_role_ids", &self.staff_role_ids)
            .field("category_staff_role_ids", &self.category_staff_role_ids)
            .field("admin_user_ids", &self.admin_user_ids)
            .field("parent_category_id", &self.parent_category_id)
            .field("key_mode", &self.key_mode)
            .field("provisioning_mode", &self.provisioning_mode)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

impl DiscordTicketRuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            bail!("discord bot token is required");
        }
        if self.guild_id == 0 {
            bail!("discord guild id must be a non-zero snowflake");
        }
        if self.command_prefix.trim().is_empty() {
            bail!("command prefix cannot be empty");
        }
        if self.command_prefix.chars().any(char::is_whitespace) {
            bail!(
                "command prefix '{}' cannot contain whitespace",
                self.command_prefix
            );
        }
        if self.api_base.trim().is_empty() {
            bail!("discord api base cannot be empty");
        }
        if self.request_timeout_ms == 0 {
            bail!("request timeout must be greater than 0");
        }
        Ok(())
    }

    fn lifecycle_config(&self, service_identity: Identity) -> TicketLifecycleConfig {
        let mut config = TicketLifecycleConfig::new(service_identity);
        config.key_mode = self.key_mode;
        config.staff_role_ids = self.staff_role_ids.iter().map(u64::to_string).collect();
        config.category_staff_role_ids = self
            .category_staff_role_ids
            .iter()
            .map(|(category, role_ids)| {
                (*category, role_ids.iter().map(u64::to_string).collect())
            })
            .collect();
        config
    }

    /// Global staff roles plus every category-scoped role grant admin capability.
    fn access_policy(&self) -> StaffAccessPolicy {
        StaffAccessPolicy {
            staff_role_ids: self
                .staff_role_ids
                .iter()
                .chain(self.category_staff_role_ids.values().flatten())
                .copied()
                .collect::<BTreeSet<_>>(),
            admin_user_ids: self.admin_user_ids.iter().copied().collect(),
        }
    }
}

/// Parses `category=role_id` pairs into a category-scoped staff role map.
pub fn parse_category_staff_roles(raw: &[String]) -> Result<BTreeMap<TicketCategory, Vec<u64>>> {
    let mut roles = BTreeMap::<TicketCategory, Vec<u64>>::new();
    for entry in raw {
        let (category_raw, role_raw) = entry
            .split_once('=')
            .with_context(|| format!("invalid category staff role '{entry}': expected category=role_id"))?;
        let category = TicketCategory::parse(category_raw)
            .with_context(|| format!("unknown ticket category '{}'", category_raw.trim()))?;
        let role_id = parse_snowflake(role_raw)
            .with_context(|| format!("invalid role id in category staff role '{entry}'"))?;
        let scoped = roles.entry(category).or_default();
        if !scoped.contains(&role_id) {
            scoped.push(role_id);
        }
    }
    Ok(roles)
}

struct DiscordTicketRuntime {
    handler: TicketGatewayHandler,
}

impl DiscordTicketRuntime {
    fn new(
        config: &DiscordTicketRuntimeConfig,
        client: Arc<DiscordApiClient>,
        service_identity: Identity,
    ) -> Self {
        let replier: Arc<dyn TicketAnnouncer> =
            Arc::new(DiscordTicketAnnouncer::new(client.clone()));
        let (provisioner, announcer): (Arc<dyn ChannelProvisioner>, Arc<dyn TicketAnnouncer>) =
            match config.provisioning_mode {
                ProvisioningMode::Discord => (
                    Arc::new(DiscordChannelProvisioner::new(
                        client.clone(),
                        config.guild_id,
                        config.parent_category_id,
                    )),
                    replier.clone(),
                ),
                ProvisioningMode::DryRun => (
                    Arc::new(InMemoryChannelProvisioner::new(DRY_RUN_CHANNEL_PREFIX)),
                    Arc::new(LoggingTicketAnnouncer),
                ),
            };
        let manager = Arc::new(TicketLifecycleManager::new(
            config.lifecycle_config(service_identity),
            provisioner,
        ));
        let dispatcher = Arc::new(TicketDispatcher::new(manager, announcer));
        let router = TicketMessageRouter::new(
            dispatcher,
            config.guild_id,
            config.command_prefix.clone(),
            config.access_policy(),
            client,
        );
        Self {
            handler: TicketGatewayHandler::new(router, replier),
        }
    }
}

async fn resolve_service_identity(
    config: &DiscordTicketRuntimeConfig,
    client: &DiscordApiClient,
) -> Result<Identity> {
    if let Some(user_id) = config.service_user_id {
        return Ok(Identity::from(user_id));
    }
    let user = client
        .current_user()
        .await
        .context("failed to resolve bot user via /users/@me")?;
    let user_id = parse_snowflake(&user.id)
        .with_context(|| format!("discord returned invalid bot user id '{}'", user.id))?;
    tracing::info!(bot_user_id = user_id, bot_name = %user.username, "resolved bot identity");
    Ok(Identity::from(user_id))
}

/// Connects to the Discord gateway and serves ticket commands until the client stops.
pub async fn run_discord_ticket_runtime(config: DiscordTicketRuntimeConfig) -> Result<()> {
    config.validate()?;
    let client = Arc::new(DiscordApiClient::new(
        config.api_base.clone(),
        config.bot_token.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?);
    let service_identity = resolve_service_identity(&config, &client).await?;
    tracing::info!(
        guild_id = config.guild_id,
        provisioning_mode = config.provisioning_mode.as_str(),
        key_mode = config.key_mode.as_str(),
        command_prefix = %config.command_prefix,
        "starting discord ticket runtime"
    );
    let runtime = DiscordTicketRuntime::new(&config, client, service_identity);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let mut gateway = serenity::Client::builder(config.bot_token.trim(), intents)
        .event_handler(runtime.handler)
        .await
        .context("failed to build Discord gateway client")?;
    gateway
        .start()
        .await
        .context("Discord gateway client stopped unexpectedly")
}
