use thiserror::Error;
use ticket_core::{ChannelId, Identity};

use crate::ticket_model::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Failures reported by a channel provisioning backend.
pub enum ProvisioningError {
    #[error("provisioning backend returned status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("provisioning transport error: {0}")]
    Transport(String),
    #[error("provisioning backend returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ProvisioningError {
    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Ticket operations gated by administrative capability.
pub enum TicketAction {
    Claim,
    AddParticipant,
    RemoveParticipant,
    Close,
}

impl TicketAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::AddParticipant => "add_participant",
            Self::RemoveParticipant => "remove_participant",
            Self::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Recoverable rejections returned by lifecycle operations.
pub enum TicketRejection {
    /// `existing` is `None` while the earlier request is still provisioning.
    #[error("requester {requester} already has an open ticket")]
    AlreadyOpen {
        requester: Identity,
        existing: Option<Box<Ticket>>,
    },
    #[error("{actor} is not allowed to {}", .action.as_str())]
    Forbidden { actor: Identity, action: TicketAction },
    #[error("channel provisioning failed: {source}")]
    ProvisioningFailed {
        #[source]
        source: ProvisioningError,
    },
    #[error("ticket {ticket_id} is not tracked")]
    NotFound { ticket_id: ChannelId },
    #[error("{target} cannot be removed from ticket {ticket_id}")]
    ProtectedParticipant {
        ticket_id: ChannelId,
        target: Identity,
    },
}

impl TicketRejection {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::AlreadyOpen { .. } => "ticket_already_open",
            Self::Forbidden { .. } => "ticket_forbidden",
            Self::ProvisioningFailed { .. } => "ticket_provisioning_failed",
            Self::NotFound { .. } => "ticket_not_found",
            Self::ProtectedParticipant { .. } => "ticket_protected_participant",
        }
    }
}

impl From<ProvisioningError> for TicketRejection {
    fn from(source: ProvisioningError) -> Self {
        Self::ProvisioningFailed { source }
    }
}

#[cfg(test)]
mod tests {
    use ticket_core::{ChannelId, Identity};

    use super::{ProvisioningError, TicketAction, TicketRejection};

    #[test]
    fn unit_provisioning_error_classifies_retryable_statuses() {
        assert!(ProvisioningError::Http {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(ProvisioningError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProvisioningError::Http {
            status: 403,
            body: "Missing Permissions".to_string()
        }
        .is_retryable());
        assert!(ProvisioningError::Transport("reset".to_string()).is_retryable());
    }

    #[test]
    fn unit_rejection_reason_codes_and_messages_are_stable() {
        let forbidden = TicketRejection::Forbidden {
            actor: Identity::new("mallory").expect("identity"),
            action: TicketAction::Close,
        };
        assert_eq!(forbidden.reason_code(), "ticket_forbidden");
        assert_eq!(forbidden.to_string(), "mallory is not allowed to close");

        let missing = TicketRejection::NotFound {
            ticket_id: ChannelId::new("c-9").expect("channel"),
        };
        assert_eq!(missing.reason_code(), "ticket_not_found");
        assert_eq!(missing.to_string(), "ticket c-9 is not tracked");

        let failed: TicketRejection =
            ProvisioningError::Transport("connection reset".to_string()).into();
        assert_eq!(failed.reason_code(), "ticket_provisioning_failed");
        assert!(failed.to_string().contains("connection reset"));
    }
}
