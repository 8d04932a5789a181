use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use ticket_core::{ChannelId, Identity};

pub const DEFAULT_TICKET_REASON: &str = "No reason provided";
pub const TICKET_CHANNEL_PREFIX: &str = "ticket";
const CHANNEL_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates the fixed ticket categories offered to requesters.
pub enum TicketCategory {
    GeneralSupport,
    HrSupport,
    PlayerReports,
    TechnicalIssues,
    AppealsAndReviews,
    EventCoordination,
    AccountAndAccess,
    OtherInquiries,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 8] = [
        Self::GeneralSupport,
        Self::HrSupport,
        Self::PlayerReports,
        Self::TechnicalIssues,
        Self::AppealsAndReviews,
        Self::EventCoordination,
        Self::AccountAndAccess,
        Self::OtherInquiries,
    ];

    /// Human-facing label shown in menus and intro messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::GeneralSupport => "General Support",
            Self::HrSupport => "HR Support",
            Self::PlayerReports => "Player Reports",
            Self::TechnicalIssues => "Technical Issues",
            Self::AppealsAndReviews => "Appeals & Reviews",
            Self::EventCoordination => "Event Coordination",
            Self::AccountAndAccess => "Account & Access",
            Self::OtherInquiries => "Other Inquiries",
        }
    }

    /// Channel-name safe slug.
    pub fn slug(self) -> &'static str {
        match self {
            Self::GeneralSupport => "general-support",
            Self::HrSupport => "hr-support",
            Self::PlayerReports => "player-reports",
            Self::TechnicalIssues => "technical-issues",
            Self::AppealsAndReviews => "appeals-reviews",
            Self::EventCoordination => "event-coordination",
            Self::AccountAndAccess => "account-access",
            Self::OtherInquiries => "other-inquiries",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Self::GeneralSupport => "general",
            Self::HrSupport => "hr",
            Self::PlayerReports => "report",
            Self::TechnicalIssues => "technical",
            Self::AppealsAndReviews => "appeal",
            Self::EventCoordination => "event",
            Self::AccountAndAccess => "account",
            Self::OtherInquiries => "other",
        }
    }

    /// Parses a category from its label, slug or single-word alias, ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|category| {
            normalized == category.label().to_ascii_lowercase()
                || normalized == category.slug()
                || normalized == category.alias()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Controls how the one-open-ticket rule is keyed.
pub enum TicketKeyMode {
    #[default]
    PerRequester,
    PerRequesterCategory,
}

impl TicketKeyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerRequester => "per_requester",
            Self::PerRequesterCategory => "per_requester_category",
        }
    }

    pub fn key_for(self, requester: &Identity, category: Option<TicketCategory>) -> TicketKey {
        TicketKey {
            requester: requester.clone(),
            category: match self {
                Self::PerRequester => None,
                Self::PerRequesterCategory => category,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Uniqueness key for open tickets.
pub struct TicketKey {
    pub requester: Identity,
    pub category: Option<TicketCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Observable state of a tracked ticket.
pub enum TicketState {
    Open,
    Claimed,
}

impl TicketState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed => "claimed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A private support channel opened for one requester.
pub struct Ticket {
    pub id: ChannelId,
    pub channel_name: String,
    pub requester: Identity,
    pub requester_name: String,
    pub category: Option<TicketCategory>,
    pub reason: String,
    pub participants: BTreeSet<Identity>,
    pub claimed_by: Option<Identity>,
    pub created_unix_ms: u64,
}

impl Ticket {
    pub fn state(&self) -> TicketState {
        if self.claimed_by.is_some() {
            TicketState::Claimed
        } else {
            TicketState::Open
        }
    }

    pub fn has_participant(&self, identity: &Identity) -> bool {
        self.participants.contains(identity)
    }

    /// Read-only projection served by `describe`.
    pub fn info(&self) -> TicketInfo {
        let mut participants = Vec::with_capacity(self.participants.len());
        participants.push(self.requester.clone());
        participants.extend(
            self.participants
                .iter()
                .filter(|identity| **identity != self.requester)
                .cloned(),
        );
        TicketInfo {
            ticket_id: self.id.clone(),
            channel_name: self.channel_name.clone(),
            requester: self.requester.clone(),
            category: self.category,
            reason: self.reason.clone(),
            state: self.state(),
            claimed_by: self.claimed_by.clone(),
            participants,
            created_unix_ms: self.created_unix_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Read-only ticket projection with the participants that can read the channel.
pub struct TicketInfo {
    pub ticket_id: ChannelId,
    pub channel_name: String,
    pub requester: Identity,
    pub category: Option<TicketCategory>,
    pub reason: String,
    pub state: TicketState,
    pub claimed_by: Option<Identity>,
    pub participants: Vec<Identity>,
    pub created_unix_ms: u64,
}

/// Returns the trimmed reason or the default placeholder.
pub fn normalize_ticket_reason(reason: Option<&str>) -> String {
    reason
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_TICKET_REASON.to_string())
}

/// Derives the deterministic channel name for a requester's ticket.
pub fn channel_name_for_ticket(
    requester: &Identity,
    requester_name: &str,
    category: Option<TicketCategory>,
) -> String {
    let mut name_part = sanitize_channel_component(requester_name);
    if name_part.is_empty() {
        name_part = sanitize_channel_component(requester.as_str());
    }
    let mut channel_name = match category {
        Some(category) => format!("{TICKET_CHANNEL_PREFIX}-{}-{name_part}", category.slug()),
        None => format!("{TICKET_CHANNEL_PREFIX}-{name_part}"),
    };
    if channel_name.len() > CHANNEL_NAME_MAX_CHARS {
        channel_name.truncate(CHANNEL_NAME_MAX_CHARS);
        while channel_name.ends_with('-') {
            channel_name.pop();
        }
    }
    channel_name
}

fn sanitize_channel_component(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '_' {
            ch.to_ascii_lowercase()
        } else {
            '-'
        };
        if mapped == '-' && (output.is_empty() || output.ends_with('-')) {
            continue;
        }
        output.push(mapped);
    }
    while output.ends_with('-') {
        output.pop();
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ticket_core::{ChannelId, Identity};

    use super::{
        channel_name_for_ticket, normalize_ticket_reason, Ticket, TicketCategory, TicketKeyMode,
        TicketState, DEFAULT_TICKET_REASON,
    };

    fn identity(raw: &str) -> Identity {
        Identity::new(raw).expect("identity")
    }

    #[test]
    fn unit_category_parse_accepts_label_slug_and_alias() {
        assert_eq!(
            TicketCategory::parse("Technical Issues"),
            Some(TicketCategory::TechnicalIssues)
        );
        assert_eq!(
            TicketCategory::parse("appeals-reviews"),
            Some(TicketCategory::AppealsAndReviews)
        );
        assert_eq!(
            TicketCategory::parse("HR"),
            Some(TicketCategory::HrSupport)
        );
        assert_eq!(
            TicketCategory::parse("account & access"),
            Some(TicketCategory::AccountAndAccess)
        );
        assert_eq!(TicketCategory::parse("billing"), None);
        assert_eq!(TicketCategory::parse("  "), None);
    }

    #[test]
    fn unit_category_labels_and_slugs_are_unique() {
        let labels = TicketCategory::ALL
            .iter()
            .map(|category| category.label())
            .collect::<BTreeSet<_>>();
        let slugs = TicketCategory::ALL
            .iter()
            .map(|category| category.slug())
            .collect::<BTreeSet<_>>();
        assert_eq!(labels.len(), TicketCategory::ALL.len());
        assert_eq!(slugs.len(), TicketCategory::ALL.len());
    }

    #[test]
    fn unit_normalize_reason_defaults_blank_input() {
        assert_eq!(normalize_ticket_reason(None), DEFAULT_TICKET_REASON);
        assert_eq!(normalize_ticket_reason(Some("   ")), DEFAULT_TICKET_REASON);
        assert_eq!(normalize_ticket_reason(Some(" lag spikes ")), "lag spikes");
    }

    #[test]
    fn functional_channel_name_matches_requester_name_convention() {
        let requester = identity("1001");
        assert_eq!(
            channel_name_for_ticket(&requester, "Alice", None),
            "ticket-alice"
        );
        assert_eq!(
            channel_name_for_ticket(&requester, "Alice W.", Some(TicketCategory::TechnicalIssues)),
            "ticket-technical-issues-alice-w"
        );
    }

    #[test]
    fn regression_channel_name_falls_back_to_identity_for_unicode_only_names() {
        let requester = identity("1001");
        assert_eq!(
            channel_name_for_ticket(&requester, "🙂🙂", None),
            "ticket-1001"
        );
        let long_name = "x".repeat(240);
        let name = channel_name_for_ticket(&requester, &long_name, None);
        assert!(name.len() <= 100);
        assert!(name.starts_with("ticket-x"));
    }

    #[test]
    fn unit_key_mode_scopes_category_only_when_requested() {
        let requester = identity("alice");
        let per_requester =
            TicketKeyMode::PerRequester.key_for(&requester, Some(TicketCategory::HrSupport));
        assert_eq!(per_requester.category, None);
        let per_category = TicketKeyMode::PerRequesterCategory
            .key_for(&requester, Some(TicketCategory::HrSupport));
        assert_eq!(per_category.category, Some(TicketCategory::HrSupport));
    }

    #[test]
    fn unit_ticket_info_lists_requester_first_and_tracks_state() {
        let mut ticket = Ticket {
            id: ChannelId::new("c-1").expect("channel"),
            channel_name: "ticket-zed".to_string(),
            requester: identity("zed"),
            requester_name: "zed".to_string(),
            category: None,
            reason: DEFAULT_TICKET_REASON.to_string(),
            participants: BTreeSet::from([identity("service"), identity("zed")]),
            claimed_by: None,
            created_unix_ms: 5,
        };
        let info = ticket.info();
        assert_eq!(info.participants, vec![identity("zed"), identity("service")]);
        assert_eq!(info.state, TicketState::Open);

        ticket.claimed_by = Some(identity("bob"));
        assert_eq!(ticket.state(), TicketState::Claimed);
        assert_eq!(ticket.state().as_str(), "claimed");
    }

    #[test]
    fn unit_ticket_info_serializes_with_snake_case_enums() {
        let ticket = Ticket {
            id: ChannelId::new("c-2").expect("channel"),
            channel_name: "ticket-technical-issues-amy".to_string(),
            requester: identity("amy"),
            requester_name: "amy".to_string(),
            category: Some(TicketCategory::TechnicalIssues),
            reason: "lag".to_string(),
            participants: BTreeSet::from([identity("amy"), identity("service")]),
            claimed_by: Some(identity("bob")),
            created_unix_ms: 7,
        };
        let value = serde_json::to_value(ticket.info()).expect("serialize");
        assert_eq!(value["ticket_id"], "c-2");
        assert_eq!(value["category"], "technical_issues");
        assert_eq!(value["state"], "claimed");
        assert_eq!(value["participants"], serde_json::json!(["amy", "service"]));
    }
}
