//! Ticket lifecycle manager: uniqueness, access grants and staff actions.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ticket_core::{current_unix_timestamp_ms, ChannelId, Identity};

use crate::provisioning::{ChannelCreateRequest, ChannelProvisioner};
use crate::ticket_access::{
    compute_access_grants, grants_for_ticket, readable_members, AccessCapability,
    AccessGrantContext,
};
use crate::ticket_error::{TicketAction, TicketRejection};
use crate::ticket_model::{
    channel_name_for_ticket, normalize_ticket_reason, Ticket, TicketCategory, TicketInfo,
    TicketKey, TicketKeyMode,
};

const TICKET_TOPIC_MAX_CHARS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Runtime configuration for [`TicketLifecycleManager`].
pub struct TicketLifecycleConfig {
    /// Identity of the bot itself; always granted access to ticket channels.
    pub service_identity: Identity,
    pub key_mode: TicketKeyMode,
    pub staff_role_ids: Vec<String>,
    pub category_staff_role_ids: BTreeMap<TicketCategory, Vec<String>>,
}

impl TicketLifecycleConfig {
    pub fn new(service_identity: Identity) -> Self {
        Self {
            service_identity,
            key_mode: TicketKeyMode::default(),
            staff_role_ids: Vec::new(),
            category_staff_role_ids: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Caller of a lifecycle operation and whether it holds administrative capability.
pub struct Actor {
    pub identity: Identity,
    pub is_admin: bool,
}

impl Actor {
    pub fn member(identity: Identity) -> Self {
        Self {
            identity,
            is_admin: false,
        }
    }

    pub fn admin(identity: Identity) -> Self {
        Self {
            identity,
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    pub requester: Identity,
    pub requester_name: String,
    pub category: Option<TicketCategory>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantChange {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
}

impl ParticipantChange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::AlreadyPresent => "already_present",
            Self::Removed => "removed",
            Self::NotPresent => "not_present",
        }
    }

    /// Whether the operation changed the participant set.
    pub fn is_change(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantUpdate {
    pub ticket: Ticket,
    pub target: Identity,
    pub change: ParticipantChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub ticket: Ticket,
    pub previous_claimant: Option<Identity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OpenSlot {
    Pending,
    Open(ChannelId),
}

#[derive(Debug, Default)]
struct TicketRegistry {
    open_by_key: HashMap<TicketKey, OpenSlot>,
    tickets: BTreeMap<ChannelId, Ticket>,
}

impl TicketRegistry {
    fn ticket(&self, ticket_id: &ChannelId) -> Result<&Ticket, TicketRejection> {
        self.tickets
            .get(ticket_id)
            .ok_or_else(|| TicketRejection::NotFound {
                ticket_id: ticket_id.clone(),
            })
    }

    fn ticket_mut(&mut self, ticket_id: &ChannelId) -> Result<&mut Ticket, TicketRejection> {
        self.tickets
            .get_mut(ticket_id)
            .ok_or_else(|| TicketRejection::NotFound {
                ticket_id: ticket_id.clone(),
            })
    }
}

/// Releases a pending uniqueness reservation unless it was committed.
struct PendingReservation<'a> {
    registry: &'a Mutex<TicketRegistry>,
    key: Option<TicketKey>,
}

impl PendingReservation<'_> {
    fn commit(mut self, registry: &mut TicketRegistry, ticket: Ticket) {
        if let Some(key) = self.key.take() {
            registry
                .open_by_key
                .insert(key, OpenSlot::Open(ticket.id.clone()));
        }
        registry.tickets.insert(ticket.id.clone(), ticket);
    }
}

impl Drop for PendingReservation<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut registry = self
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if registry.open_by_key.get(&key) == Some(&OpenSlot::Pending) {
                registry.open_by_key.remove(&key);
            }
        }
    }
}

/// Sole owner and mutator of ticket state.
///
/// The registry lock is only held for map reads and writes, never across a
/// provisioning call. Ticket creation reserves the requester key before
/// provisioning so concurrent requests from the same requester cannot both
/// pass the uniqueness check.
pub struct TicketLifecycleManager {
    config: TicketLifecycleConfig,
    provisioner: Arc<dyn ChannelProvisioner>,
    registry: Mutex<TicketRegistry>,
}

impl TicketLifecycleManager {
    pub fn new(config: TicketLifecycleConfig, provisioner: Arc<dyn ChannelProvisioner>) -> Self {
        Self {
            config,
            provisioner,
            registry: Mutex::new(TicketRegistry::default()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, TicketRegistry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn grant_context(&self) -> AccessGrantContext<'_> {
        AccessGrantContext {
            service_identity: &self.config.service_identity,
            staff_role_ids: &self.config.staff_role_ids,
            category_staff_role_ids: &self.config.category_staff_role_ids,
        }
    }

    fn authorize(actor: &Actor, action: TicketAction) -> Result<(), TicketRejection> {
        if actor.is_admin {
            return Ok(());
        }
        tracing::debug!(
            actor = %actor.identity,
            action = action.as_str(),
            "ticket action denied for non-admin actor"
        );
        Err(TicketRejection::Forbidden {
            actor: actor.identity.clone(),
            action,
        })
    }

    /// Opens a ticket channel for the requester unless one is already open.
    #[tracing::instrument(
        name = "ticket_lifecycle.create_ticket",
        skip_all,
        fields(
            requester = %request.requester,
            category = request.category.map(TicketCategory::slug).unwrap_or("none")
        )
    )]
    pub async fn create_ticket(&self, request: TicketRequest) -> Result<Ticket, TicketRejection> {
        let key = self
            .config
            .key_mode
            .key_for(&request.requester, request.category);
        let reservation = {
            let mut registry = self.registry();
            match registry.open_by_key.get(&key) {
                Some(OpenSlot::Open(existing_id)) => {
                    return Err(TicketRejection::AlreadyOpen {
                        requester: request.requester.clone(),
                        existing: registry.tickets.get(existing_id).cloned().map(Box::new),
                    });
                }
                Some(OpenSlot::Pending) => {
                    return Err(TicketRejection::AlreadyOpen {
                        requester: request.requester.clone(),
                        existing: None,
                    });
                }
                None => {
                    registry.open_by_key.insert(key.clone(), OpenSlot::Pending);
                }
            }
            PendingReservation {
                registry: &self.registry,
                key: Some(key),
            }
        };

        let reason = normalize_ticket_reason(request.reason.as_deref());
        let channel_name =
            channel_name_for_ticket(&request.requester, &request.requester_name, request.category);
        let create_request = ChannelCreateRequest {
            name: channel_name.clone(),
            topic: Some(ticket_topic(&request.requester, request.category, &reason)),
            grants: compute_access_grants(
                &self.grant_context(),
                request.category,
                &request.requester,
                std::iter::empty(),
            ),
        };

        let channel_id = match self.provisioner.create_channel(&create_request).await {
            Ok(channel_id) => channel_id,
            Err(error) => {
                tracing::warn!(
                    channel_name = %channel_name,
                    retryable = error.is_retryable(),
                    error = %error,
                    "ticket channel provisioning failed"
                );
                return Err(error.into());
            }
        };

        let ticket = Ticket {
            id: channel_id,
            channel_name,
            requester: request.requester.clone(),
            requester_name: request.requester_name.trim().to_string(),
            category: request.category,
            reason,
            participants: BTreeSet::from([
                request.requester,
                self.config.service_identity.clone(),
            ]),
            claimed_by: None,
            created_unix_ms: current_unix_timestamp_ms(),
        };
        {
            let mut registry = self.registry();
            reservation.commit(&mut registry, ticket.clone());
        }
        tracing::info!(
            ticket_id = %ticket.id,
            channel_name = %ticket.channel_name,
            "ticket created"
        );
        Ok(ticket)
    }

    /// Grants `target` read+write access; adding a present participant is a no-op.
    #[tracing::instrument(
        name = "ticket_lifecycle.add_participant",
        skip_all,
        fields(actor = %actor.identity, ticket_id = %ticket_id, target = %target)
    )]
    pub async fn add_participant(
        &self,
        ticket_id: &ChannelId,
        actor: &Actor,
        target: &Identity,
    ) -> Result<ParticipantUpdate, TicketRejection> {
        Self::authorize(actor, TicketAction::AddParticipant)?;
        {
            let registry = self.registry();
            let ticket = registry.ticket(ticket_id)?;
            if ticket.has_participant(target) {
                return Ok(ParticipantUpdate {
                    ticket: ticket.clone(),
                    target: target.clone(),
                    change: ParticipantChange::AlreadyPresent,
                });
            }
        }

        self.provisioner
            .set_access(ticket_id, target, AccessCapability::READ_WRITE)
            .await?;

        let mut registry = self.registry();
        let ticket = registry.ticket_mut(ticket_id)?;
        let change = if ticket.participants.insert(target.clone()) {
            ParticipantChange::Added
        } else {
            ParticipantChange::AlreadyPresent
        };
        tracing::info!(change = change.as_str(), "ticket participant updated");
        Ok(ParticipantUpdate {
            ticket: ticket.clone(),
            target: target.clone(),
            change,
        })
    }

    /// Revokes `target`'s access. The requester and the service identity cannot be removed.
    #[tracing::instrument(
        name = "ticket_lifecycle.remove_participant",
        skip_all,
        fields(actor = %actor.identity, ticket_id = %ticket_id, target = %target)
    )]
    pub async fn remove_participant(
        &self,
        ticket_id: &ChannelId,
        actor: &Actor,
        target: &Identity,
    ) -> Result<ParticipantUpdate, TicketRejection> {
        Self::authorize(actor, TicketAction::RemoveParticipant)?;
        {
            let registry = self.registry();
            let ticket = registry.ticket(ticket_id)?;
            if *target == ticket.requester || *target == self.config.service_identity {
                return Err(TicketRejection::ProtectedParticipant {
                    ticket_id: ticket_id.clone(),
                    target: target.clone(),
                });
            }
            if !ticket.has_participant(target) {
                return Ok(ParticipantUpdate {
                    ticket: ticket.clone(),
                    target: target.clone(),
                    change: ParticipantChange::NotPresent,
                });
            }
        }

        self.provisioner
            .set_access(ticket_id, target, AccessCapability::NONE)
            .await?;

        let mut registry = self.registry();
        let ticket = registry.ticket_mut(ticket_id)?;
        let change = if ticket.participants.remove(target) {
            ParticipantChange::Removed
        } else {
            ParticipantChange::NotPresent
        };
        tracing::info!(change = change.as_str(), "ticket participant updated");
        Ok(ParticipantUpdate {
            ticket: ticket.clone(),
            target: target.clone(),
            change,
        })
    }

    /// Marks the actor as the ticket's handler; a later claim replaces an earlier one.
    #[tracing::instrument(
        name = "ticket_lifecycle.claim",
        skip_all,
        fields(actor = %actor.identity, ticket_id = %ticket_id)
    )]
    pub fn claim(&self, ticket_id: &ChannelId, actor: &Actor) -> Result<ClaimOutcome, TicketRejection> {
        Self::authorize(actor, TicketAction::Claim)?;
        let mut registry = self.registry();
        let ticket = registry.ticket_mut(ticket_id)?;
        let previous_claimant = ticket.claimed_by.replace(actor.identity.clone());
        tracing::info!(
            reassigned = previous_claimant.is_some(),
            "ticket claimed"
        );
        Ok(ClaimOutcome {
            ticket: ticket.clone(),
            previous_claimant,
        })
    }

    /// Deletes the ticket channel and forgets the ticket once deletion succeeds.
    #[tracing::instrument(
        name = "ticket_lifecycle.close",
        skip_all,
        fields(actor = %actor.identity, ticket_id = %ticket_id)
    )]
    pub async fn close(&self, ticket_id: &ChannelId, actor: &Actor) -> Result<Ticket, TicketRejection> {
        Self::authorize(actor, TicketAction::Close)?;
        self.registry().ticket(ticket_id)?;

        if let Err(error) = self.provisioner.delete_channel(ticket_id).await {
            tracing::warn!(
                retryable = error.is_retryable(),
                error = %error,
                "ticket channel deletion failed; ticket stays tracked"
            );
            return Err(error.into());
        }

        let mut registry = self.registry();
        let ticket = registry
            .tickets
            .remove(ticket_id)
            .ok_or_else(|| TicketRejection::NotFound {
                ticket_id: ticket_id.clone(),
            })?;
        let key = self.config.key_mode.key_for(&ticket.requester, ticket.category);
        if registry.open_by_key.get(&key) == Some(&OpenSlot::Open(ticket.id.clone())) {
            registry.open_by_key.remove(&key);
        }
        tracing::info!(requester = %ticket.requester, "ticket closed");
        Ok(ticket)
    }

    /// Read-only projection of a tracked ticket; performs no authorization.
    ///
    /// Participants are the members the channel's grant set lets read it,
    /// requester first and the service identity second.
    pub fn describe(&self, ticket_id: &ChannelId) -> Result<TicketInfo, TicketRejection> {
        let registry = self.registry();
        let ticket = registry.ticket(ticket_id)?;
        let mut info = ticket.info();
        info.participants = readable_members(&grants_for_ticket(&self.grant_context(), ticket));
        Ok(info)
    }

    pub fn ticket(&self, ticket_id: &ChannelId) -> Option<Ticket> {
        self.registry().tickets.get(ticket_id).cloned()
    }

    /// The requester's open ticket under the configured key mode.
    pub fn open_ticket_for(
        &self,
        requester: &Identity,
        category: Option<TicketCategory>,
    ) -> Option<Ticket> {
        let key = self.config.key_mode.key_for(requester, category);
        let registry = self.registry();
        match registry.open_by_key.get(&key) {
            Some(OpenSlot::Open(ticket_id)) => registry.tickets.get(ticket_id).cloned(),
            _ => None,
        }
    }

    pub fn open_ticket_count(&self) -> usize {
        self.registry().tickets.len()
    }
}

fn ticket_topic(requester: &Identity, category: Option<TicketCategory>, reason: &str) -> String {
    let category = category
        .map(TicketCategory::label)
        .unwrap_or("Uncategorized");
    format!("Support ticket for {} | {category} | {reason}", requester.mention())
        .chars()
        .take(TICKET_TOPIC_MAX_CHARS)
        .collect()
}
