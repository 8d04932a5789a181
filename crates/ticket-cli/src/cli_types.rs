use clap::ValueEnum;

use ticket_discord_runtime::ProvisioningMode;
use ticket_lifecycle::TicketKeyMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliProvisioningMode {
    Discord,
    DryRun,
}

impl From<CliProvisioningMode> for ProvisioningMode {
    fn from(value: CliProvisioningMode) -> Self {
        match value {
            CliProvisioningMode::Discord => ProvisioningMode::Discord,
            CliProvisioningMode::DryRun => ProvisioningMode::DryRun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTicketKeyMode {
    PerRequester,
    PerRequesterCategory,
}

impl From<CliTicketKeyMode> for TicketKeyMode {
    fn from(value: CliTicketKeyMode) -> Self {
        match value {
            CliTicketKeyMode::PerRequester => TicketKeyMode::PerRequester,
            CliTicketKeyMode::PerRequesterCategory => TicketKeyMode::PerRequesterCategory,
        }
    }
}
