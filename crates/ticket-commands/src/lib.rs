//! Command surface for the support-ticket bot.
//!
//! Parses prefixed text commands, routes them to typed [`TicketEvent`]s and
//! dispatches those to the lifecycle manager, posting intros and staff
//! announcements through a [`TicketAnnouncer`].

pub mod ticket_command;
pub mod ticket_dispatcher;
pub mod ticket_event;
pub mod ticket_render;

pub use ticket_command::*;
pub use ticket_dispatcher::*;
pub use ticket_event::*;
pub use ticket_render::*;
