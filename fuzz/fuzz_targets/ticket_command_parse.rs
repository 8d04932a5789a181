#![no_main]

use libfuzzer_sys::fuzz_target;
use ticket_commands::{parse_ticket_command, ticket_command_usage, TicketCommand};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    for prefix in ["!", "?", "tb!"] {
        let Some(command) = parse_ticket_command(&raw, prefix) else {
            continue;
        };
        assert!(raw.trim_start().starts_with(prefix));
        match command {
            TicketCommand::Ticket { reason, .. } => {
                if let Some(reason) = reason {
                    assert!(!reason.trim().is_empty());
                    assert_eq!(reason.trim(), reason);
                }
            }
            TicketCommand::Add { target } | TicketCommand::Remove { target } => {
                assert!(target.as_str().chars().all(|ch| ch.is_ascii_digit()));
            }
            TicketCommand::Invalid { message } => {
                assert!(message.starts_with("Usage: "));
                assert!(message.contains(prefix));
            }
            TicketCommand::Help => {
                assert!(ticket_command_usage(prefix).contains(prefix));
            }
            TicketCommand::Claim
            | TicketCommand::Close
            | TicketCommand::Info
            | TicketCommand::Categories => {}
        }
    }
});
