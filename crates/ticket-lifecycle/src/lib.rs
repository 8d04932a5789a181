//! Ticket lifecycle core for the support-ticket bot.
//!
//! Owns the requester-to-ticket and ticket-to-claimant state, computes the
//! per-subject access grants for ticket channels, and drives the external
//! channel provisioner through the create/claim/add/remove/close lifecycle.

pub mod lifecycle_manager;
pub mod provisioning;
pub mod ticket_access;
pub mod ticket_error;
pub mod ticket_model;

pub use lifecycle_manager::*;
pub use provisioning::*;
pub use ticket_access::*;
pub use ticket_error::*;
pub use ticket_model::*;
