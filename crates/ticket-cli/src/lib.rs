//! CLI argument models for the `ticketbot` binary.

pub mod cli_args;
pub mod cli_types;

pub use cli_args::Cli;
pub use cli_types::*;
