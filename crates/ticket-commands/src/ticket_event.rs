use ticket_core::{ChannelId, Identity};
use ticket_lifecycle::{Actor, TicketRequest};

use crate::ticket_command::{ticket_command_usage, TicketCommand};
use crate::ticket_render::render_category_list;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Typed trigger consumed by the ticket dispatcher.
pub enum TicketEvent {
    TicketRequested {
        request: TicketRequest,
        source_channel: ChannelId,
    },
    ClaimRequested {
        ticket_id: ChannelId,
        actor: Actor,
    },
    AddRequested {
        ticket_id: ChannelId,
        actor: Actor,
        target: Identity,
    },
    RemoveRequested {
        ticket_id: ChannelId,
        actor: Actor,
        target: Identity,
    },
    CloseRequested {
        ticket_id: ChannelId,
        actor: Actor,
    },
    InfoRequested {
        ticket_id: ChannelId,
    },
}

impl TicketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TicketRequested { .. } => "ticket_requested",
            Self::ClaimRequested { .. } => "claim_requested",
            Self::AddRequested { .. } => "add_requested",
            Self::RemoveRequested { .. } => "remove_requested",
            Self::CloseRequested { .. } => "close_requested",
            Self::InfoRequested { .. } => "info_requested",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Who issued a command and where.
pub struct CommandContext {
    pub actor: Actor,
    pub actor_name: String,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRoute {
    Dispatch(TicketEvent),
    Reply(String),
}

/// Maps a parsed command onto a dispatcher event or a direct reply.
///
/// Staff commands address the channel they were issued in; the ticket id is
/// the channel id.
pub fn route_ticket_command(
    command: TicketCommand,
    context: CommandContext,
    prefix: &str,
) -> CommandRoute {
    let CommandContext {
        actor,
        actor_name,
        channel_id,
    } = context;
    let event = match command {
        TicketCommand::Ticket { category, reason } => TicketEvent::TicketRequested {
            request: TicketRequest {
                requester: actor.identity,
                requester_name: actor_name,
                category,
                reason,
            },
            source_channel: channel_id,
        },
        TicketCommand::Claim => TicketEvent::ClaimRequested {
            ticket_id: channel_id,
            actor,
        },
        TicketCommand::Add { target } => TicketEvent::AddRequested {
            ticket_id: channel_id,
            actor,
            target,
        },
        TicketCommand::Remove { target } => TicketEvent::RemoveRequested {
            ticket_id: channel_id,
            actor,
            target,
        },
        TicketCommand::Close => TicketEvent::CloseRequested {
            ticket_id: channel_id,
            actor,
        },
        TicketCommand::Info => TicketEvent::InfoRequested {
            ticket_id: channel_id,
        },
        TicketCommand::Categories => return CommandRoute::Reply(render_category_list()),
        TicketCommand::Help => return CommandRoute::Reply(ticket_command_usage(prefix)),
        TicketCommand::Invalid { message } => return CommandRoute::Reply(message),
    };
    CommandRoute::Dispatch(event)
}

#[cfg(test)]
mod tests {
    use ticket_core::{ChannelId, Identity};
    use ticket_lifecycle::{Actor, TicketCategory};

    use super::{route_ticket_command, CommandContext, CommandRoute, TicketEvent};
    use crate::ticket_command::TicketCommand;

    fn context(is_admin: bool) -> CommandContext {
        let identity = Identity::new("100").expect("identity");
        CommandContext {
            actor: Actor { identity, is_admin },
            actor_name: "alice".to_string(),
            channel_id: ChannelId::new("500").expect("channel"),
        }
    }

    #[test]
    fn unit_ticket_command_routes_to_request_from_source_channel() {
        let route = route_ticket_command(
            TicketCommand::Ticket {
                category: Some(TicketCategory::GeneralSupport),
                reason: Some("help".to_string()),
            },
            context(false),
            "!",
        );
        let CommandRoute::Dispatch(TicketEvent::TicketRequested {
            request,
            source_channel,
        }) = &route
        else {
            panic!("expected ticket request, got {route:?}");
        };
        assert_eq!(request.requester.as_str(), "100");
        assert_eq!(request.requester_name, "alice");
        assert_eq!(request.category, Some(TicketCategory::GeneralSupport));
        assert_eq!(source_channel.as_str(), "500");
    }

    #[test]
    fn unit_staff_commands_target_the_current_channel() {
        let route = route_ticket_command(TicketCommand::Close, context(true), "!");
        assert_eq!(
            route,
            CommandRoute::Dispatch(TicketEvent::CloseRequested {
                ticket_id: ChannelId::new("500").expect("channel"),
                actor: context(true).actor,
            })
        );
    }

    #[test]
    fn unit_informational_commands_reply_directly() {
        let CommandRoute::Reply(help) = route_ticket_command(TicketCommand::Help, context(false), "?")
        else {
            panic!("expected reply");
        };
        assert!(help.contains("`?close`"));
        let CommandRoute::Reply(categories) =
            route_ticket_command(TicketCommand::Categories, context(false), "!")
        else {
            panic!("expected reply");
        };
        assert!(categories.contains("Appeals & Reviews (`appeals-reviews`)"));
    }
}
