//! Mapping from ticket access grants to Discord permission overwrites.

use serde::Serialize;
use ticket_lifecycle::{AccessCapability, AccessGrant, AccessSubject};

pub(super) const ADMINISTRATOR: u64 = 1 << 3;
pub(super) const VIEW_CHANNEL: u64 = 1 << 10;
pub(super) const SEND_MESSAGES: u64 = 1 << 11;
pub(super) const READ_MESSAGE_HISTORY: u64 = 1 << 16;

const READ_BITS: u64 = VIEW_CHANNEL | READ_MESSAGE_HISTORY;
const WRITE_BITS: u64 = SEND_MESSAGES;

pub(super) const OVERWRITE_KIND_ROLE: u8 = 0;
pub(super) const OVERWRITE_KIND_MEMBER: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One entry of a channel's `permission_overwrites`; bitsets are decimal strings.
pub(super) struct PermissionOverwrite {
    pub(super) id: String,
    #[serde(rename = "type")]
    pub(super) kind: u8,
    pub(super) allow: String,
    pub(super) deny: String,
}

/// Splits a capability into `(allow, deny)` bitsets.
pub(super) fn capability_bits(capability: AccessCapability) -> (u64, u64) {
    let mut allow = 0;
    let mut deny = 0;
    if capability.read {
        allow |= READ_BITS;
    } else {
        deny |= READ_BITS;
    }
    if capability.write {
        allow |= WRITE_BITS;
    } else {
        deny |= WRITE_BITS;
    }
    (allow, deny)
}

/// The everyone role shares the guild's id.
pub(super) fn overwrite_for_grant(grant: &AccessGrant, guild_id: u64) -> PermissionOverwrite {
    let (id, kind) = match &grant.subject {
        AccessSubject::Everyone => (guild_id.to_string(), OVERWRITE_KIND_ROLE),
        AccessSubject::Role(role_id) => (role_id.clone(), OVERWRITE_KIND_ROLE),
        AccessSubject::Member(identity) => (identity.as_str().to_string(), OVERWRITE_KIND_MEMBER),
    };
    member_or_role_overwrite(id, kind, grant.capability)
}

pub(super) fn member_or_role_overwrite(
    id: String,
    kind: u8,
    capability: AccessCapability,
) -> PermissionOverwrite {
    let (allow, deny) = capability_bits(capability);
    PermissionOverwrite {
        id,
        kind,
        allow: allow.to_string(),
        deny: deny.to_string(),
    }
}
