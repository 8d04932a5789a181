//! Gateway bridge: turns guild messages into ticket commands and replies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serenity::all::{Message, Ready};
use serenity::async_trait;
use serenity::prelude::{Context as SerenityContext, EventHandler};
use ticket_commands::{
    parse_ticket_command, route_ticket_command, CommandContext, CommandRoute, TicketAnnouncer,
    TicketDispatcher, TicketMessage,
};
use ticket_core::{ChannelId, Identity};
use ticket_lifecycle::Actor;

use super::discord_permissions::ADMINISTRATOR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Decides which members hold administrative capability over tickets.
pub(super) struct StaffAccessPolicy {
    pub(super) staff_role_ids: BTreeSet<u64>,
    pub(super) admin_user_ids: BTreeSet<u64>,
}

impl StaffAccessPolicy {
    pub(super) fn is_admin(&self, author_id: u64, member_role_ids: &[u64]) -> bool {
        self.admin_user_ids.contains(&author_id)
            || member_role_ids
                .iter()
                .any(|role_id| self.staff_role_ids.contains(role_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Guild owner and role permission bitsets, keyed by role id.
pub(super) struct GuildPermissionSnapshot {
    pub(super) owner_id: u64,
    pub(super) role_permissions: BTreeMap<u64, u64>,
}

impl GuildPermissionSnapshot {
    /// Owners and holders of a role with ADMINISTRATOR, including the
    /// everyone role whose id is the guild id.
    pub(super) fn is_administrator(
        &self,
        guild_id: u64,
        author_id: u64,
        member_role_ids: &[u64],
    ) -> bool {
        author_id == self.owner_id
            || std::iter::once(&guild_id)
                .chain(member_role_ids)
                .filter_map(|role_id| self.role_permissions.get(role_id))
                .any(|bits| bits & ADMINISTRATOR == ADMINISTRATOR)
    }
}

#[async_trait]
/// Source of guild-level permissions for members the configured policy does not admit.
pub(super) trait GuildPermissionSource: Send + Sync {
    async fn guild_permissions(&self, guild_id: u64) -> anyhow::Result<GuildPermissionSnapshot>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Platform-neutral view of an inbound gateway message.
pub(super) struct InboundTicketMessage {
    pub(super) guild_id: Option<u64>,
    pub(super) channel_id: u64,
    pub(super) author_id: u64,
    pub(super) author_name: String,
    pub(super) author_is_bot: bool,
    pub(super) member_role_ids: Vec<u64>,
    pub(super) content: String,
}

impl InboundTicketMessage {
    fn from_gateway(message: &Message) -> Self {
        Self {
            guild_id: message.guild_id.map(|guild_id| guild_id.get()),
            channel_id: message.channel_id.get(),
            author_id: message.author.id.get(),
            author_name: message.author.name.clone(),
            author_is_bot: message.author.bot,
            member_role_ids: message
                .member
                .as_ref()
                .map(|member| member.roles.iter().map(|role_id| role_id.get()).collect())
                .unwrap_or_default(),
            content: message.content.clone(),
        }
    }
}

pub(super) struct TicketMessageRouter {
    dispatcher: Arc<TicketDispatcher>,
    guild_id: u64,
    command_prefix: String,
    access_policy: StaffAccessPolicy,
    permission_source: Arc<dyn GuildPermissionSource>,
}

impl TicketMessageRouter {
    pub(super) fn new(
        dispatcher: Arc<TicketDispatcher>,
        guild_id: u64,
        command_prefix: String,
        access_policy: StaffAccessPolicy,
        permission_source: Arc<dyn GuildPermissionSource>,
    ) -> Self {
        Self {
            dispatcher,
            guild_id,
            command_prefix,
            access_policy,
            permission_source,
        }
    }

    async fn is_guild_administrator(&self, author_id: u64, member_role_ids: &[u64]) -> bool {
        match self.permission_source.guild_permissions(self.guild_id).await {
            Ok(snapshot) => snapshot.is_administrator(self.guild_id, author_id, member_role_ids),
            Err(error) => {
                tracing::warn!(
                    guild_id = self.guild_id,
                    error = %error,
                    "failed to resolve guild permissions; treating actor as non-admin"
                );
                false
            }
        }
    }

    /// Handles one inbound message and returns the reply for its channel, if any.
    pub(super) async fn handle_message(&self, inbound: InboundTicketMessage) -> Option<String> {
        if inbound.author_is_bot || inbound.guild_id != Some(self.guild_id) {
            return None;
        }
        let command = parse_ticket_command(&inbound.content, &self.command_prefix)?;
        let command_name = command.name();
        let mut is_admin = self
            .access_policy
            .is_admin(inbound.author_id, &inbound.member_role_ids);
        if !is_admin && command.requires_admin() {
            is_admin = self
                .is_guild_administrator(inbound.author_id, &inbound.member_role_ids)
                .await;
        }
        let context = CommandContext {
            actor: Actor {
                identity: Identity::from(inbound.author_id),
                is_admin,
            },
            actor_name: inbound.author_name,
            channel_id: ChannelId::from(inbound.channel_id),
        };
        tracing::debug!(
            command = command_name,
            author_id = inbound.author_id,
            channel_id = inbound.channel_id,
            is_admin,
            "ticket command received"
        );
        match route_ticket_command(command, context, &self.command_prefix) {
            CommandRoute::Reply(reply) => Some(reply),
            CommandRoute::Dispatch(event) => {
                let outcome = self.dispatcher.dispatch(event).await;
                outcome.reply().map(str::to_string)
            }
        }
    }
}

pub(super) struct TicketGatewayHandler {
    router: TicketMessageRouter,
    replier: Arc<dyn TicketAnnouncer>,
}

impl TicketGatewayHandler {
    pub(super) fn new(router: TicketMessageRouter, replier: Arc<dyn TicketAnnouncer>) -> Self {
        Self { router, replier }
    }
}

#[async_trait]
impl EventHandler for TicketGatewayHandler {
    async fn ready(&self, _: SerenityContext, ready: Ready) {
        tracing::info!(
            bot_user_id = ready.user.id.get(),
            guild_count = ready.guilds.len(),
            "{} is online!",
            ready.user.name
        );
    }

    async fn message(&self, _: SerenityContext, message: Message) {
        let inbound = InboundTicketMessage::from_gateway(&message);
        let channel_id = ChannelId::from(inbound.channel_id);
        let Some(reply) = self.router.handle_message(inbound).await else {
            return;
        };
        if let Err(error) = self
            .replier
            .post_message(&channel_id, &TicketMessage::text(reply))
            .await
        {
            tracing::warn!(
                channel_id = %channel_id,
                error = %error,
                "failed to reply to ticket command"
            );
        }
    }
}
