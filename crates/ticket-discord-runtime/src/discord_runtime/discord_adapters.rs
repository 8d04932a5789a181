//! Discord-backed implementations of the provisioning and announcement seams.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use ticket_commands::{TicketAnnouncer, TicketMessage};
use ticket_core::{parse_snowflake, ChannelId, Identity};
use ticket_lifecycle::{AccessCapability, ChannelCreateRequest, ChannelProvisioner, ProvisioningError};

use super::discord_api_client::{CreateGuildChannelPayload, DiscordApiClient, DiscordGuild};
use super::discord_gateway::{GuildPermissionSnapshot, GuildPermissionSource};
use super::discord_permissions::{
    member_or_role_overwrite, overwrite_for_grant, OVERWRITE_KIND_MEMBER,
};

pub(super) struct DiscordChannelProvisioner {
    client: Arc<DiscordApiClient>,
    guild_id: u64,
    parent_category_id: Option<u64>,
}

impl DiscordChannelProvisioner {
    pub(super) fn new(
        client: Arc<DiscordApiClient>,
        guild_id: u64,
        parent_category_id: Option<u64>,
    ) -> Self {
        Self {
            client,
            guild_id,
            parent_category_id,
        }
    }
}

#[async_trait]
impl ChannelProvisioner for DiscordChannelProvisioner {
    async fn create_channel(
        &self,
        request: &ChannelCreateRequest,
    ) -> Result<ChannelId, ProvisioningError> {
        let overwrites = request
            .grants
            .iter()
            .map(|grant| overwrite_for_grant(grant, self.guild_id))
            .collect();
        let payload = CreateGuildChannelPayload::text_channel(
            request.name.clone(),
            request.topic.clone(),
            self.parent_category_id,
            overwrites,
        );
        let channel_id = self
            .client
            .create_guild_channel(self.guild_id, &payload)
            .await?;
        ChannelId::new(channel_id)
            .map_err(|error| ProvisioningError::InvalidResponse(error.to_string()))
    }

    async fn set_access(
        &self,
        channel_id: &ChannelId,
        identity: &Identity,
        capability: AccessCapability,
    ) -> Result<(), ProvisioningError> {
        let overwrite = member_or_role_overwrite(
            identity.as_str().to_string(),
            OVERWRITE_KIND_MEMBER,
            capability,
        );
        self.client
            .edit_channel_permissions(channel_id.as_str(), &overwrite)
            .await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), ProvisioningError> {
        self.client.delete_channel(channel_id.as_str()).await?;
        Ok(())
    }
}

pub(super) struct DiscordTicketAnnouncer {
    client: Arc<DiscordApiClient>,
}

impl DiscordTicketAnnouncer {
    pub(super) fn new(client: Arc<DiscordApiClient>) -> Self {
        Self { client }
    }
}

/// Message body for `POST /channels/{id}/messages`; only user mentions ping.
pub(super) fn message_payload(message: &TicketMessage) -> Value {
    let mut payload = json!({
        "allowed_mentions": { "parse": ["users"] },
    });
    if let Some(content) = &message.content {
        payload["content"] = Value::String(content.clone());
    }
    if let Some(embed) = &message.embed {
        payload["embeds"] = json!([embed]);
    }
    payload
}

#[async_trait]
impl TicketAnnouncer for DiscordTicketAnnouncer {
    async fn post_message(
        &self,
        channel_id: &ChannelId,
        message: &TicketMessage,
    ) -> anyhow::Result<()> {
        self.client
            .create_message(channel_id.as_str(), &message_payload(message))
            .await?;
        Ok(())
    }
}

/// Reads the guild owner and role permission bitsets; unparsable roles are skipped.
pub(super) fn guild_permission_snapshot(
    guild: &DiscordGuild,
) -> anyhow::Result<GuildPermissionSnapshot> {
    let owner_id = parse_snowflake(&guild.owner_id)
        .with_context(|| format!("discord returned invalid guild owner id '{}'", guild.owner_id))?;
    let role_permissions = guild
        .roles
        .iter()
        .filter_map(|role| {
            let role_id = parse_snowflake(&role.id).ok()?;
            let bits = role.permissions.trim().parse::<u64>().ok()?;
            Some((role_id, bits))
        })
        .collect();
    Ok(GuildPermissionSnapshot {
        owner_id,
        role_permissions,
    })
}

#[async_trait]
impl GuildPermissionSource for DiscordApiClient {
    async fn guild_permissions(&self, guild_id: u64) -> anyhow::Result<GuildPermissionSnapshot> {
        let guild = self.guild(guild_id).await?;
        guild_permission_snapshot(&guild)
    }
}
