//! Dispatches typed ticket events to the lifecycle manager and announces results.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ticket_core::{ChannelId, Identity};
use ticket_lifecycle::{ParticipantUpdate, TicketLifecycleManager, TicketRejection};

use crate::ticket_event::TicketEvent;
use crate::ticket_render::{
    render_claim_announcement, render_participant_update, render_rejection,
    render_ticket_created_reply, render_ticket_info, render_ticket_intro, TicketMessage,
};

#[async_trait]
/// Posts messages into ticket channels.
pub trait TicketAnnouncer: Send + Sync {
    async fn post_message(&self, channel_id: &ChannelId, message: &TicketMessage) -> Result<()>;
}

/// Announcer that only records announcements in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTicketAnnouncer;

#[async_trait]
impl TicketAnnouncer for LoggingTicketAnnouncer {
    async fn post_message(&self, channel_id: &ChannelId, message: &TicketMessage) -> Result<()> {
        tracing::info!(
            channel_id = %channel_id,
            message = %message.plain_text(),
            "ticket announcement"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of dispatching one event, rendered for the invoking actor.
pub enum DispatchOutcome {
    Completed {
        event: &'static str,
        reply: Option<String>,
    },
    Rejected {
        event: &'static str,
        reason_code: &'static str,
        reply: String,
    },
}

impl DispatchOutcome {
    pub fn event(&self) -> &'static str {
        match self {
            Self::Completed { event, .. } | Self::Rejected { event, .. } => event,
        }
    }

    /// Text to send back to the channel the command came from, if any.
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Completed { reply, .. } => reply.as_deref(),
            Self::Rejected { reply, .. } => Some(reply.as_str()),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub struct TicketDispatcher {
    manager: Arc<TicketLifecycleManager>,
    announcer: Arc<dyn TicketAnnouncer>,
}

impl TicketDispatcher {
    pub fn new(manager: Arc<TicketLifecycleManager>, announcer: Arc<dyn TicketAnnouncer>) -> Self {
        Self { manager, announcer }
    }

    pub fn manager(&self) -> &Arc<TicketLifecycleManager> {
        &self.manager
    }

    pub async fn dispatch(&self, event: TicketEvent) -> DispatchOutcome {
        let event_name = event.name();
        let result = match event {
            TicketEvent::TicketRequested { request, .. } => {
                match self.manager.create_ticket(request).await {
                    Ok(ticket) => {
                        self.announce_best_effort(&ticket.id, &render_ticket_intro(&ticket))
                            .await;
                        Ok(Some(render_ticket_created_reply(&ticket)))
                    }
                    Err(rejection) => Err(rejection),
                }
            }
            TicketEvent::ClaimRequested { ticket_id, actor } => {
                match self.manager.claim(&ticket_id, &actor) {
                    Ok(outcome) => {
                        let text = render_claim_announcement(&outcome, &actor.identity);
                        Ok(self.announce_or_reply(&ticket_id, text).await)
                    }
                    Err(rejection) => Err(rejection),
                }
            }
            TicketEvent::AddRequested {
                ticket_id,
                actor,
                target,
            } => self
                .participant_outcome(
                    &ticket_id,
                    &actor.identity,
                    self.manager
                        .add_participant(&ticket_id, &actor, &target)
                        .await,
                )
                .await,
            TicketEvent::RemoveRequested {
                ticket_id,
                actor,
                target,
            } => self
                .participant_outcome(
                    &ticket_id,
                    &actor.identity,
                    self.manager
                        .remove_participant(&ticket_id, &actor, &target)
                        .await,
                )
                .await,
            TicketEvent::CloseRequested { ticket_id, actor } => self
                .manager
                .close(&ticket_id, &actor)
                .await
                .map(|_| None),
            TicketEvent::InfoRequested { ticket_id } => self
                .manager
                .describe(&ticket_id)
                .map(|info| Some(render_ticket_info(&info))),
        };

        match result {
            Ok(reply) => DispatchOutcome::Completed {
                event: event_name,
                reply,
            },
            Err(rejection) => {
                tracing::info!(
                    event = event_name,
                    reason_code = rejection.reason_code(),
                    rejection = %rejection,
                    "ticket event rejected"
                );
                DispatchOutcome::Rejected {
                    event: event_name,
                    reason_code: rejection.reason_code(),
                    reply: render_rejection(&rejection),
                }
            }
        }
    }

    async fn participant_outcome(
        &self,
        ticket_id: &ChannelId,
        actor: &Identity,
        result: Result<ParticipantUpdate, TicketRejection>,
    ) -> Result<Option<String>, TicketRejection> {
        let update = result?;
        let text = render_participant_update(&update, actor);
        if update.change.is_change() {
            Ok(self.announce_or_reply(ticket_id, text).await)
        } else {
            Ok(Some(text))
        }
    }

    /// Posts `text` into the ticket channel; hands it back as the reply if posting fails.
    async fn announce_or_reply(&self, channel_id: &ChannelId, text: String) -> Option<String> {
        let message = TicketMessage::text(text);
        if self.announce_best_effort(channel_id, &message).await {
            None
        } else {
            message.content
        }
    }

    async fn announce_best_effort(&self, channel_id: &ChannelId, message: &TicketMessage) -> bool {
        match self.announcer.post_message(channel_id, message).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    channel_id = %channel_id,
                    error = %error,
                    "ticket announcement failed"
                );
                false
            }
        }
    }
}
