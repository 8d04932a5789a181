//! Foundational identity and time utilities shared across ticketbot crates.
//!
//! Provides the opaque identity/ticket id newtypes, chat mention parsing and
//! the timestamp helpers used for ticket creation metadata.

pub mod identity;
pub mod time_utils;

pub use identity::{parse_snowflake, ChannelId, Identity, IdentityParseError};
pub use time_utils::{current_unix_timestamp_ms, format_unix_ms_rfc3339};
