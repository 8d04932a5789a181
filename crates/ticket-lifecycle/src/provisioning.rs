//! Channel provisioning contract and the in-process provisioner.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use ticket_core::{ChannelId, Identity};
use tokio::sync::Mutex;

use crate::ticket_access::{AccessCapability, AccessGrant, AccessSubject};
use crate::ticket_error::ProvisioningError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Request for a new private ticket channel.
pub struct ChannelCreateRequest {
    pub name: String,
    pub topic: Option<String>,
    pub grants: Vec<AccessGrant>,
}

#[async_trait]
/// Trait contract for the external service that owns chat channels.
pub trait ChannelProvisioner: Send + Sync {
    async fn create_channel(
        &self,
        request: &ChannelCreateRequest,
    ) -> Result<ChannelId, ProvisioningError>;

    async fn set_access(
        &self,
        channel_id: &ChannelId,
        identity: &Identity,
        capability: AccessCapability,
    ) -> Result<(), ProvisioningError>;

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), ProvisioningError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisioningOperation {
    CreateChannel,
    SetAccess,
    DeleteChannel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Call journal entry recorded by [`InMemoryChannelProvisioner`].
pub enum ProvisioningCall {
    CreateChannel {
        name: String,
        grants: Vec<AccessGrant>,
    },
    SetAccess {
        channel_id: ChannelId,
        identity: Identity,
        capability: AccessCapability,
    },
    DeleteChannel {
        channel_id: ChannelId,
    },
}

impl ProvisioningCall {
    pub fn operation(&self) -> ProvisioningOperation {
        match self {
            Self::CreateChannel { .. } => ProvisioningOperation::CreateChannel,
            Self::SetAccess { .. } => ProvisioningOperation::SetAccess,
            Self::DeleteChannel { .. } => ProvisioningOperation::DeleteChannel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Channel held by the in-memory provisioner.
pub struct ProvisionedChannel {
    pub name: String,
    pub topic: Option<String>,
    pub grants: Vec<AccessGrant>,
}

impl ProvisionedChannel {
    pub fn capability_for(&self, identity: &Identity) -> Option<AccessCapability> {
        self.grants.iter().find_map(|grant| match &grant.subject {
            AccessSubject::Member(member) if member == identity => Some(grant.capability),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
struct InMemoryProvisionerState {
    next_channel_seq: u64,
    channels: BTreeMap<ChannelId, ProvisionedChannel>,
    calls: Vec<ProvisioningCall>,
    injected_failures: VecDeque<(ProvisioningOperation, ProvisioningError)>,
}

impl InMemoryProvisionerState {
    fn take_failure(&mut self, operation: ProvisioningOperation) -> Option<ProvisioningError> {
        let index = self
            .injected_failures
            .iter()
            .position(|(candidate, _)| *candidate == operation)?;
        self.injected_failures.remove(index).map(|(_, error)| error)
    }
}

/// Provisioner that keeps channels in process memory.
///
/// Backs the `dry-run` provisioning mode and the lifecycle tests. Calls are
/// journaled, failures can be injected per operation, and channel creation
/// can be slowed down to widen race windows.
pub struct InMemoryChannelProvisioner {
    channel_prefix: String,
    create_delay: Duration,
    state: Mutex<InMemoryProvisionerState>,
}

impl Default for InMemoryChannelProvisioner {
    fn default() -> Self {
        Self::new("channel-")
    }
}

impl InMemoryChannelProvisioner {
    pub fn new(channel_prefix: impl Into<String>) -> Self {
        Self {
            channel_prefix: channel_prefix.into(),
            create_delay: Duration::ZERO,
            state: Mutex::new(InMemoryProvisionerState::default()),
        }
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Queues `error` for the next call of `operation`.
    pub async fn fail_next(&self, operation: ProvisioningOperation, error: ProvisioningError) {
        self.state
            .lock()
            .await
            .injected_failures
            .push_back((operation, error));
    }

    pub async fn calls(&self) -> Vec<ProvisioningCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, operation: ProvisioningOperation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub async fn channel(&self, channel_id: &ChannelId) -> Option<ProvisionedChannel> {
        self.state.lock().await.channels.get(channel_id).cloned()
    }

    pub async fn channel_count(&self) -> usize {
        self.state.lock().await.channels.len()
    }
}

#[async_trait]
impl ChannelProvisioner for InMemoryChannelProvisioner {
    async fn create_channel(
        &self,
        request: &ChannelCreateRequest,
    ) -> Result<ChannelId, ProvisioningError> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        let mut state = self.state.lock().await;
        state.calls.push(ProvisioningCall::CreateChannel {
            name: request.name.clone(),
            grants: request.grants.clone(),
        });
        if let Some(error) = state.take_failure(ProvisioningOperation::CreateChannel) {
            return Err(error);
        }
        state.next_channel_seq = state.next_channel_seq.saturating_add(1);
        let channel_id = ChannelId::new(format!(
            "{}{}",
            self.channel_prefix, state.next_channel_seq
        ))
        .map_err(|error| ProvisioningError::InvalidResponse(error.to_string()))?;
        state.channels.insert(
            channel_id.clone(),
            ProvisionedChannel {
                name: request.name.clone(),
                topic: request.topic.clone(),
                grants: request.grants.clone(),
            },
        );
        Ok(channel_id)
    }

    async fn set_access(
        &self,
        channel_id: &ChannelId,
        identity: &Identity,
        capability: AccessCapability,
    ) -> Result<(), ProvisioningError> {
        let mut state = self.state.lock().await;
        state.calls.push(ProvisioningCall::SetAccess {
            channel_id: channel_id.clone(),
            identity: identity.clone(),
            capability,
        });
        if let Some(error) = state.take_failure(ProvisioningOperation::SetAccess) {
            return Err(error);
        }
        let channel = state.channels.get_mut(channel_id).ok_or_else(|| {
            ProvisioningError::Http {
                status: 404,
                body: format!("unknown channel {channel_id}"),
            }
        })?;
        let subject = AccessSubject::Member(identity.clone());
        match channel
            .grants
            .iter_mut()
            .find(|grant| grant.subject == subject)
        {
            Some(grant) => grant.capability = capability,
            None => channel.grants.push(AccessGrant::new(subject, capability)),
        }
        Ok(())
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), ProvisioningError> {
        let mut state = self.state.lock().await;
        state.calls.push(ProvisioningCall::DeleteChannel {
            channel_id: channel_id.clone(),
        });
        if let Some(error) = state.take_failure(ProvisioningOperation::DeleteChannel) {
            return Err(error);
        }
        state
            .channels
            .remove(channel_id)
            .map(|_| ())
            .ok_or_else(|| ProvisioningError::Http {
                status: 404,
                body: format!("unknown channel {channel_id}"),
            })
    }
}
