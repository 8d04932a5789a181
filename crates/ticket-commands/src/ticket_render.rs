//! User-facing text for ticket replies, intros and announcements.

use serde::Serialize;
use ticket_core::{format_unix_ms_rfc3339, Identity};
use ticket_lifecycle::{
    ClaimOutcome, ParticipantChange, ParticipantUpdate, Ticket, TicketAction, TicketCategory,
    TicketInfo, TicketRejection,
};

pub const TICKET_INTRO_TITLE: &str = "New Ticket";
pub const TICKET_EMBED_COLOR: u32 = 0x3498db;
const UNCATEGORIZED_LABEL: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<TicketEmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Message posted into a ticket channel.
pub struct TicketMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<TicketEmbed>,
}

impl TicketMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    /// Flattens the message into one line of text for logs.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(content) = &self.content {
            parts.push(content.clone());
        }
        if let Some(embed) = &self.embed {
            parts.push(format!("[{}] {}", embed.title, embed.description));
            parts.extend(
                embed
                    .fields
                    .iter()
                    .map(|field| format!("{}: {}", field.name, field.value)),
            );
        }
        parts.join(" | ")
    }
}

fn category_label(category: Option<TicketCategory>) -> &'static str {
    category
        .map(TicketCategory::label)
        .unwrap_or(UNCATEGORIZED_LABEL)
}

/// Intro posted as the first message of a new ticket channel.
pub fn render_ticket_intro(ticket: &Ticket) -> TicketMessage {
    TicketMessage {
        content: None,
        embed: Some(TicketEmbed {
            title: TICKET_INTRO_TITLE.to_string(),
            description: ticket.reason.clone(),
            color: TICKET_EMBED_COLOR,
            fields: vec![
                TicketEmbedField {
                    name: "Category".to_string(),
                    value: category_label(ticket.category).to_string(),
                    inline: true,
                },
                TicketEmbedField {
                    name: "Requester".to_string(),
                    value: ticket.requester.mention(),
                    inline: true,
                },
                TicketEmbedField {
                    name: "Opened".to_string(),
                    value: format_unix_ms_rfc3339(ticket.created_unix_ms),
                    inline: false,
                },
            ],
        }),
    }
}

pub fn render_ticket_created_reply(ticket: &Ticket) -> String {
    format!(
        "{}, your ticket has been created: {}",
        ticket.requester.mention(),
        ticket.id.mention()
    )
}

pub fn render_claim_announcement(outcome: &ClaimOutcome, claimant: &Identity) -> String {
    match &outcome.previous_claimant {
        Some(previous) if previous != claimant => format!(
            "{} has claimed this ticket (reassigned from {}).",
            claimant.mention(),
            previous.mention()
        ),
        _ => format!("{} has claimed this ticket.", claimant.mention()),
    }
}

/// Announcement for a participant change, or the no-op notice when nothing changed.
pub fn render_participant_update(update: &ParticipantUpdate, actor: &Identity) -> String {
    let target = update.target.mention();
    match update.change {
        ParticipantChange::Added => {
            format!("{target} was added to this ticket by {}.", actor.mention())
        }
        ParticipantChange::Removed => {
            format!("{target} was removed from this ticket by {}.", actor.mention())
        }
        ParticipantChange::AlreadyPresent => format!("{target} is already part of this ticket."),
        ParticipantChange::NotPresent => format!("{target} is not part of this ticket."),
    }
}

pub fn render_ticket_info(info: &TicketInfo) -> String {
    let participants = info
        .participants
        .iter()
        .map(Identity::mention)
        .collect::<Vec<_>>()
        .join(", ");
    let claimed_by = info
        .claimed_by
        .as_ref()
        .map(Identity::mention)
        .unwrap_or_else(|| "unclaimed".to_string());
    [
        format!("Ticket {} ({})", info.ticket_id.mention(), info.state.as_str()),
        format!("Requester: {}", info.requester.mention()),
        format!("Category: {}", category_label(info.category)),
        format!("Reason: {}", info.reason),
        format!("Claimed by: {claimed_by}"),
        format!("Participants: {participants}"),
        format!("Opened: {}", format_unix_ms_rfc3339(info.created_unix_ms)),
    ]
    .join("\n")
}

pub fn render_category_list() -> String {
    let mut lines = vec!["Ticket categories:".to_string()];
    lines.extend(
        TicketCategory::ALL
            .iter()
            .map(|category| format!("- {} (`{}`)", category.label(), category.slug())),
    );
    lines.join("\n")
}

fn action_phrase(action: TicketAction) -> &'static str {
    match action {
        TicketAction::Claim => "claim tickets",
        TicketAction::AddParticipant => "add members to tickets",
        TicketAction::RemoveParticipant => "remove members from tickets",
        TicketAction::Close => "close tickets",
    }
}

/// Non-fatal text shown to the actor whose request was rejected.
pub fn render_rejection(rejection: &TicketRejection) -> String {
    match rejection {
        TicketRejection::AlreadyOpen {
            requester,
            existing: Some(existing),
        } => format!(
            "{}, you already have an open ticket: {}",
            requester.mention(),
            existing.id.mention()
        ),
        TicketRejection::AlreadyOpen {
            requester,
            existing: None,
        } => format!(
            "{}, your ticket is already being created.",
            requester.mention()
        ),
        TicketRejection::Forbidden { action, .. } => {
            format!("You do not have permission to {}.", action_phrase(*action))
        }
        TicketRejection::ProvisioningFailed { .. } => {
            "The ticket channel could not be updated right now. Please try again later."
                .to_string()
        }
        TicketRejection::NotFound { .. } => "This channel is not an open ticket.".to_string(),
        TicketRejection::ProtectedParticipant { target, .. } => {
            format!("{} cannot be removed from this ticket.", target.mention())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ticket_core::{ChannelId, Identity};
    use ticket_lifecycle::{
        ClaimOutcome, ProvisioningError, Ticket, TicketAction, TicketCategory, TicketRejection,
    };

    use super::{
        render_claim_announcement, render_rejection, render_ticket_created_reply,
        render_ticket_info, render_ticket_intro, TICKET_EMBED_COLOR, TICKET_INTRO_TITLE,
    };

    fn identity(raw: &str) -> Identity {
        Identity::new(raw).expect("identity")
    }

    fn sample_ticket() -> Ticket {
        Ticket {
            id: ChannelId::new("900").expect("channel"),
            channel_name: "ticket-alice".to_string(),
            requester: identity("100"),
            requester_name: "alice".to_string(),
            category: Some(TicketCategory::PlayerReports),
            reason: "griefing in spawn".to_string(),
            participants: BTreeSet::from([identity("100"), identity("1")]),
            claimed_by: None,
            created_unix_ms: 1_700_000_000_123,
        }
    }

    #[test]
    fn unit_created_reply_mentions_requester_and_channel() {
        assert_eq!(
            render_ticket_created_reply(&sample_ticket()),
            "<@100>, your ticket has been created: <#900>"
        );
    }

    #[test]
    fn unit_intro_embed_carries_reason_and_category() {
        let message = render_ticket_intro(&sample_ticket());
        let embed = message.embed.clone().expect("embed");
        assert_eq!(embed.title, TICKET_INTRO_TITLE);
        assert_eq!(embed.description, "griefing in spawn");
        assert_eq!(embed.color, TICKET_EMBED_COLOR);
        assert_eq!(embed.fields[0].value, "Player Reports");
        assert_eq!(embed.fields[1].value, "<@100>");
        assert_eq!(embed.fields[2].value, "2023-11-14T22:13:20Z");
        assert!(message.plain_text().starts_with("[New Ticket] griefing in spawn"));
    }

    #[test]
    fn unit_claim_announcement_reports_reassignment() {
        let mut ticket = sample_ticket();
        ticket.claimed_by = Some(identity("300"));
        let outcome = ClaimOutcome {
            ticket,
            previous_claimant: Some(identity("200")),
        };
        assert_eq!(
            render_claim_announcement(&outcome, &identity("300")),
            "<@300> has claimed this ticket (reassigned from <@200>)."
        );
    }

    #[test]
    fn unit_info_lists_participants_and_claim_state() {
        let mut ticket = sample_ticket();
        ticket.claimed_by = Some(identity("200"));
        let rendered = render_ticket_info(&ticket.info());
        assert!(rendered.contains("Ticket <#900> (claimed)"));
        assert!(rendered.contains("Claimed by: <@200>"));
        assert!(rendered.contains("Participants: <@100>, <@1>"));
        assert!(rendered.contains("Opened: 2023-11-14T22:13:20Z"));
    }

    #[test]
    fn unit_rejections_render_as_non_fatal_text() {
        let forbidden = TicketRejection::Forbidden {
            actor: identity("5"),
            action: TicketAction::Close,
        };
        assert_eq!(
            render_rejection(&forbidden),
            "You do not have permission to close tickets."
        );
        let already_open = TicketRejection::AlreadyOpen {
            requester: identity("100"),
            existing: Some(Box::new(sample_ticket())),
        };
        assert_eq!(
            render_rejection(&already_open),
            "<@100>, you already have an open ticket: <#900>"
        );
        let failed = TicketRejection::from(ProvisioningError::Transport("reset".to_string()));
        assert!(!render_rejection(&failed).contains("reset"));
    }
}
