//! Text command parsing for prefixed ticket commands.

use ticket_core::Identity;
use ticket_lifecycle::TicketCategory;

pub const DEFAULT_COMMAND_PREFIX: &str = "!";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Parsed ticket command issued in a guild channel.
pub enum TicketCommand {
    Ticket {
        category: Option<TicketCategory>,
        reason: Option<String>,
    },
    Claim,
    Add {
        target: Identity,
    },
    Remove {
        target: Identity,
    },
    Close,
    Info,
    Categories,
    Help,
    Invalid {
        message: String,
    },
}

impl TicketCommand {
    /// Staff actions gated by administrative capability.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::Claim | Self::Add { .. } | Self::Remove { .. } | Self::Close
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ticket { .. } => "ticket",
            Self::Claim => "claim",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Close => "close",
            Self::Info => "info",
            Self::Categories => "categories",
            Self::Help => "help",
            Self::Invalid { .. } => "invalid",
        }
    }
}

pub fn ticket_command_usage(prefix: &str) -> String {
    [
        "Supported ticket commands:".to_string(),
        format!("- `{prefix}ticket [category] [reason]` opens a private ticket channel"),
        format!("- `{prefix}categories` lists ticket categories"),
        format!("- `{prefix}claim` claims the current ticket (staff)"),
        format!("- `{prefix}add <@user>` adds a member to the current ticket (staff)"),
        format!("- `{prefix}remove <@user>` removes a member from the current ticket (staff)"),
        format!("- `{prefix}close` closes and deletes the current ticket (staff)"),
        format!("- `{prefix}info` shows details about the current ticket"),
        format!("- `{prefix}help`"),
    ]
    .join("\n")
}

/// Parses `content` as a ticket command.
///
/// Returns `None` when the message does not start with `prefix` or names a
/// command this bot does not own. Known commands with malformed arguments
/// parse to [`TicketCommand::Invalid`] carrying a usage line.
pub fn parse_ticket_command(content: &str, prefix: &str) -> Option<TicketCommand> {
    if prefix.trim().is_empty() {
        return None;
    }
    let trimmed = content.trim();
    let args = trimmed.strip_prefix(prefix)?;
    if args.is_empty() || args.starts_with(char::is_whitespace) {
        return None;
    }

    let mut parts = args.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_ascii_lowercase();
    let remainder = parts.next().unwrap_or_default().trim();
    let parsed = match command.as_str() {
        "ticket" => parse_ticket_request(remainder),
        "add" => match parse_single_target(remainder) {
            Some(target) => TicketCommand::Add { target },
            None => TicketCommand::Invalid {
                message: format!("Usage: {prefix}add <@user>"),
            },
        },
        "remove" => match parse_single_target(remainder) {
            Some(target) => TicketCommand::Remove { target },
            None => TicketCommand::Invalid {
                message: format!("Usage: {prefix}remove <@user>"),
            },
        },
        "claim" => no_argument_command(remainder, TicketCommand::Claim, prefix, "claim"),
        "close" => no_argument_command(remainder, TicketCommand::Close, prefix, "close"),
        "info" => no_argument_command(remainder, TicketCommand::Info, prefix, "info"),
        "categories" => no_argument_command(
            remainder,
            TicketCommand::Categories,
            prefix,
            "categories",
        ),
        "help" => no_argument_command(remainder, TicketCommand::Help, prefix, "help"),
        _ => return None,
    };
    Some(parsed)
}

fn parse_ticket_request(remainder: &str) -> TicketCommand {
    if remainder.is_empty() {
        return TicketCommand::Ticket {
            category: None,
            reason: None,
        };
    }
    if let Some((category, rest)) = strip_category_label(remainder) {
        return TicketCommand::Ticket {
            category: Some(category),
            reason: non_empty(rest),
        };
    }
    let mut parts = remainder.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    match TicketCategory::parse(first) {
        Some(category) => TicketCommand::Ticket {
            category: Some(category),
            reason: non_empty(parts.next().unwrap_or_default()),
        },
        None => TicketCommand::Ticket {
            category: None,
            reason: non_empty(remainder),
        },
    }
}

/// Matches the longest category label at the start of `remainder`, ignoring case.
fn strip_category_label(remainder: &str) -> Option<(TicketCategory, &str)> {
    TicketCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let label = category.label();
            let head = remainder.get(..label.len())?;
            let rest = &remainder[label.len()..];
            let at_boundary = rest.is_empty() || rest.starts_with(char::is_whitespace);
            (head.eq_ignore_ascii_case(label) && at_boundary).then_some((category, rest))
        })
        .max_by_key(|(category, _)| category.label().len())
}

fn parse_single_target(remainder: &str) -> Option<Identity> {
    let mut tokens = remainder.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(raw), None) => Identity::parse_mention(raw).ok(),
        _ => None,
    }
}

fn no_argument_command(
    remainder: &str,
    command: TicketCommand,
    prefix: &str,
    name: &str,
) -> TicketCommand {
    if remainder.is_empty() {
        command
    } else {
        TicketCommand::Invalid {
            message: format!("Usage: {prefix}{name}"),
        }
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
