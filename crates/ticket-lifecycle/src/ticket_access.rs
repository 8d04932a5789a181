use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ticket_core::Identity;

use crate::ticket_model::{Ticket, TicketCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Per-subject channel capability applied as a permission overwrite.
pub struct AccessCapability {
    pub read: bool,
    pub write: bool,
}

impl AccessCapability {
    pub const NONE: AccessCapability = AccessCapability {
        read: false,
        write: false,
    };
    pub const READ_WRITE: AccessCapability = AccessCapability {
        read: true,
        write: true,
    };

    pub fn can_read(self) -> bool {
        self.read
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
/// Subject a grant applies to.
pub enum AccessSubject {
    /// Everybody in the scope who is not covered by a narrower grant.
    Everyone,
    /// A role whose holders are treated as staff.
    Role(String),
    Member(Identity),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub subject: AccessSubject,
    pub capability: AccessCapability,
}

impl AccessGrant {
    pub fn new(subject: AccessSubject, capability: AccessCapability) -> Self {
        Self {
            subject,
            capability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Inputs for the ticket channel grant set.
pub struct AccessGrantContext<'a> {
    pub service_identity: &'a Identity,
    pub staff_role_ids: &'a [String],
    pub category_staff_role_ids: &'a BTreeMap<TicketCategory, Vec<String>>,
}

impl AccessGrantContext<'_> {
    /// Staff roles that may see a ticket of the given category.
    pub fn staff_roles_for(&self, category: Option<TicketCategory>) -> Vec<&str> {
        let scoped = category
            .and_then(|category| self.category_staff_role_ids.get(&category))
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.staff_role_ids
            .iter()
            .chain(scoped.iter())
            .map(|role_id| role_id.trim())
            .filter(|role_id| !role_id.is_empty())
            .collect()
    }
}

/// Computes the ordered grant list for a ticket channel.
///
/// The everyone-deny grant always comes first so that narrower member and
/// role grants override it. Global staff roles precede the roles scoped to
/// `category`; the requester is emitted before the remaining participants and
/// duplicates are collapsed.
pub fn compute_access_grants<'a>(
    context: &AccessGrantContext<'_>,
    category: Option<TicketCategory>,
    requester: &'a Identity,
    participants: impl IntoIterator<Item = &'a Identity>,
) -> Vec<AccessGrant> {
    let mut grants = vec![AccessGrant::new(
        AccessSubject::Everyone,
        AccessCapability::NONE,
    )];
    for role_id in context.staff_roles_for(category) {
        push_unique(
            &mut grants,
            AccessGrant::new(
                AccessSubject::Role(role_id.to_string()),
                AccessCapability::READ_WRITE,
            ),
        );
    }
    push_unique(
        &mut grants,
        AccessGrant::new(
            AccessSubject::Member(requester.clone()),
            AccessCapability::READ_WRITE,
        ),
    );
    push_unique(
        &mut grants,
        AccessGrant::new(
            AccessSubject::Member(context.service_identity.clone()),
            AccessCapability::READ_WRITE,
        ),
    );
    for participant in participants {
        push_unique(
            &mut grants,
            AccessGrant::new(
                AccessSubject::Member(participant.clone()),
                AccessCapability::READ_WRITE,
            ),
        );
    }
    grants
}

/// Members of the ticket that can currently read the channel.
pub fn readable_members(grants: &[AccessGrant]) -> Vec<Identity> {
    grants
        .iter()
        .filter_map(|grant| match &grant.subject {
            AccessSubject::Member(identity) if grant.capability.can_read() => {
                Some(identity.clone())
            }
            _ => None,
        })
        .collect()
}

/// Grant list reflecting a tracked ticket's current participants.
pub fn grants_for_ticket(context: &AccessGrantContext<'_>, ticket: &Ticket) -> Vec<AccessGrant> {
    compute_access_grants(
        context,
        ticket.category,
        &ticket.requester,
        ticket.participants.iter(),
    )
}

fn push_unique(grants: &mut Vec<AccessGrant>, grant: AccessGrant) {
    if grants
        .iter()
        .any(|existing| existing.subject == grant.subject)
    {
        return;
    }
    grants.push(grant);
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use ticket_core::{ChannelId, Identity};

    use crate::ticket_model::{Ticket, TicketCategory};

    use super::{
        compute_access_grants, grants_for_ticket, readable_members, AccessCapability, AccessGrant,
        AccessGrantContext, AccessSubject,
    };

    fn identity(raw: &str) -> Identity {
        Identity::new(raw).expect("identity")
    }

    #[test]
    fn unit_creation_grants_deny_everyone_and_allow_requester_and_service() {
        let service = identity("service");
        let requester = identity("alice");
        let scoped = BTreeMap::new();
        let context = AccessGrantContext {
            service_identity: &service,
            staff_role_ids: &[],
            category_staff_role_ids: &scoped,
        };
        let grants = compute_access_grants(&context, None, &requester, std::iter::empty());
        assert_eq!(
            grants,
            vec![
                AccessGrant::new(AccessSubject::Everyone, AccessCapability::NONE),
                AccessGrant::new(
                    AccessSubject::Member(requester.clone()),
                    AccessCapability::READ_WRITE
                ),
                AccessGrant::new(
                    AccessSubject::Member(service.clone()),
                    AccessCapability::READ_WRITE
                ),
            ]
        );
    }

    #[test]
    fn functional_staff_roles_are_granted_and_blank_roles_skipped() {
        let service = identity("service");
        let requester = identity("alice");
        let roles = vec!["staff".to_string(), " ".to_string(), "staff".to_string()];
        let scoped = BTreeMap::from([(
            TicketCategory::HrSupport,
            vec!["hr-team".to_string()],
        )]);
        let context = AccessGrantContext {
            service_identity: &service,
            staff_role_ids: &roles,
            category_staff_role_ids: &scoped,
        };
        let role_subjects = |category| {
            compute_access_grants(&context, category, &requester, std::iter::empty())
                .into_iter()
                .filter_map(|grant| match grant.subject {
                    AccessSubject::Role(role_id) => Some(role_id),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(role_subjects(None), vec!["staff".to_string()]);
        assert_eq!(
            role_subjects(Some(TicketCategory::HrSupport)),
            vec!["staff".to_string(), "hr-team".to_string()]
        );
        assert_eq!(
            role_subjects(Some(TicketCategory::PlayerReports)),
            vec!["staff".to_string()]
        );
    }

    #[test]
    fn regression_duplicate_participants_collapse_into_single_grant() {
        let service = identity("service");
        let requester = identity("alice");
        let dave = identity("dave");
        let participants = [requester.clone(), service.clone(), dave.clone(), dave.clone()];
        let scoped = BTreeMap::new();
        let context = AccessGrantContext {
            service_identity: &service,
            staff_role_ids: &[],
            category_staff_role_ids: &scoped,
        };
        let grants = compute_access_grants(&context, None, &requester, participants.iter());
        assert_eq!(readable_members(&grants), vec![requester, service, dave]);
    }

    #[test]
    fn functional_ticket_grants_follow_current_participants() {
        let service = identity("service");
        let requester = identity("alice");
        let carol = identity("carol");
        let scoped = BTreeMap::from([(TicketCategory::HrSupport, vec!["hr-team".to_string()])]);
        let context = AccessGrantContext {
            service_identity: &service,
            staff_role_ids: &[],
            category_staff_role_ids: &scoped,
        };
        let ticket = Ticket {
            id: ChannelId::new("91").expect("channel"),
            channel_name: "ticket-hr-support-alice".to_string(),
            requester: requester.clone(),
            requester_name: "alice".to_string(),
            category: Some(TicketCategory::HrSupport),
            reason: "payroll".to_string(),
            participants: BTreeSet::from([requester.clone(), service.clone(), carol.clone()]),
            claimed_by: None,
            created_unix_ms: 0,
        };
        let grants = grants_for_ticket(&context, &ticket);
        assert_eq!(
            grants[1],
            AccessGrant::new(
                AccessSubject::Role("hr-team".to_string()),
                AccessCapability::READ_WRITE
            )
        );
        assert_eq!(readable_members(&grants), vec![requester, service, carol]);
    }
}
