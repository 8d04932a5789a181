//! Discord transport for the support-ticket bot.
//!
//! Hosts the REST provisioning adapter, the serenity gateway bridge and the
//! runtime entry point used by the `ticketbot` binary.

mod discord_runtime;

pub use discord_runtime::{
    parse_category_staff_roles, run_discord_ticket_runtime, DiscordTicketRuntimeConfig,
    ProvisioningMode, DEFAULT_DISCORD_API_BASE,
};
