use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ticket_commands::{
    parse_ticket_command, route_ticket_command, CommandContext, CommandRoute, TicketAnnouncer,
    TicketDispatcher, TicketMessage,
};
use ticket_core::{ChannelId, Identity};
use ticket_lifecycle::{
    AccessCapability, Actor, InMemoryChannelProvisioner, ProvisioningOperation,
    TicketLifecycleConfig, TicketLifecycleManager,
};
use tokio::sync::Mutex;

const LOBBY_CHANNEL: &str = "500";
const SERVICE_ID: &str = "1";

#[derive(Default)]
struct RecordingAnnouncer {
    posted: Mutex<Vec<(ChannelId, String)>>,
}

#[async_trait]
impl TicketAnnouncer for RecordingAnnouncer {
    async fn post_message(&self, channel_id: &ChannelId, message: &TicketMessage) -> Result<()> {
        self.posted
            .lock()
            .await
            .push((channel_id.clone(), message.plain_text()));
        Ok(())
    }
}

struct Harness {
    provisioner: Arc<InMemoryChannelProvisioner>,
    announcer: Arc<RecordingAnnouncer>,
    dispatcher: TicketDispatcher,
}

impl Harness {
    fn new() -> Self {
        let mut config = TicketLifecycleConfig::new(identity(SERVICE_ID));
        config.staff_role_ids = vec!["30".to_string()];
        let provisioner = Arc::new(InMemoryChannelProvisioner::new("9"));
        let manager = Arc::new(TicketLifecycleManager::new(config, provisioner.clone()));
        let announcer = Arc::new(RecordingAnnouncer::default());
        let dispatcher = TicketDispatcher::new(manager, announcer.clone());
        Self {
            provisioner,
            announcer,
            dispatcher,
        }
    }

    /// Runs one chat message through parse, route and dispatch.
    async fn send(
        &self,
        author: (&str, &str),
        is_admin: bool,
        channel: &str,
        content: &str,
    ) -> Option<String> {
        let command = parse_ticket_command(content, "!")?;
        let context = CommandContext {
            actor: Actor {
                identity: identity(author.0),
                is_admin,
            },
            actor_name: author.1.to_string(),
            channel_id: ChannelId::new(channel).expect("channel"),
        };
        match route_ticket_command(command, context, "!") {
            CommandRoute::Reply(reply) => Some(reply),
            CommandRoute::Dispatch(event) => self
                .dispatcher
                .dispatch(event)
                .await
                .reply()
                .map(str::to_string),
        }
    }

    async fn capability(&self, channel: &str, member: &str) -> Option<AccessCapability> {
        self.provisioner
            .channel(&ChannelId::new(channel).expect("channel"))
            .await
            .and_then(|provisioned| provisioned.capability_for(&identity(member)))
    }
}

fn identity(raw: &str) -> Identity {
    Identity::new(raw).expect("identity")
}

const ALICE: (&str, &str) = ("100", "alice");
const BOB: (&str, &str) = ("200", "bob");
const CAROL: (&str, &str) = ("300", "carol");
const DAVE: (&str, &str) = ("400", "dave");

#[tokio::test]
async fn integration_full_ticket_lifecycle_through_text_commands() {
    let harness = Harness::new();

    let created = harness
        .send(ALICE, false, LOBBY_CHANNEL, "!ticket account locked out of my account")
        .await;
    assert_eq!(
        created.as_deref(),
        Some("<@100>, your ticket has been created: <#91>")
    );
    let channel = harness
        .provisioner
        .channel(&ChannelId::new("91").expect("channel"))
        .await
        .expect("ticket channel");
    assert_eq!(channel.name, "ticket-account-access-alice");
    assert_eq!(
        harness.capability("91", ALICE.0).await,
        Some(AccessCapability::READ_WRITE)
    );
    assert_eq!(
        harness.capability("91", SERVICE_ID).await,
        Some(AccessCapability::READ_WRITE)
    );
    assert_eq!(harness.capability("91", DAVE.0).await, None);

    let duplicate = harness
        .send(ALICE, false, LOBBY_CHANNEL, "!ticket another problem")
        .await;
    assert_eq!(
        duplicate.as_deref(),
        Some("<@100>, you already have an open ticket: <#91>")
    );
    assert_eq!(
        harness
            .provisioner
            .call_count(ProvisioningOperation::CreateChannel)
            .await,
        1
    );

    assert_eq!(harness.send(BOB, true, "91", "!claim").await, None);
    assert_eq!(harness.send(CAROL, true, "91", "!add <@400>").await, None);
    assert_eq!(
        harness.capability("91", DAVE.0).await,
        Some(AccessCapability::READ_WRITE)
    );

    let info = harness
        .send(DAVE, false, "91", "!info")
        .await
        .expect("info reply");
    assert!(info.contains("Claimed by: <@200>"), "{info}");
    assert!(info.contains("Participants: <@100>, <@1>, <@400>"), "{info}");

    assert_eq!(harness.send(CAROL, true, "91", "!remove <@!400>").await, None);
    assert_eq!(
        harness.capability("91", DAVE.0).await,
        Some(AccessCapability::NONE)
    );

    assert_eq!(harness.send(BOB, true, "91", "!close").await, None);
    assert_eq!(harness.provisioner.channel_count().await, 0);
    assert_eq!(
        harness.send(BOB, true, "91", "!info").await.as_deref(),
        Some("This channel is not an open ticket.")
    );

    let reopened = harness
        .send(ALICE, false, LOBBY_CHANNEL, "!ticket still locked out")
        .await;
    assert_eq!(
        reopened.as_deref(),
        Some("<@100>, your ticket has been created: <#92>")
    );

    let announcements = harness
        .announcer
        .posted
        .lock()
        .await
        .iter()
        .filter(|(channel_id, _)| channel_id.as_str() == "91")
        .map(|(_, text)| text.clone())
        .collect::<Vec<_>>();
    assert_eq!(announcements.len(), 4);
    assert_eq!(announcements[1], "<@200> has claimed this ticket.");
    assert_eq!(announcements[2], "<@400> was added to this ticket by <@300>.");
}

#[tokio::test]
async fn integration_member_cannot_run_staff_commands() {
    let harness = Harness::new();
    harness
        .send(ALICE, false, LOBBY_CHANNEL, "!ticket help please")
        .await;

    for (content, action) in [
        ("!claim", "claim"),
        ("!add <@400>", "add members to"),
        ("!remove <@400>", "remove members from"),
        ("!close", "close"),
    ] {
        let reply = harness.send(ALICE, false, "91", content).await;
        assert_eq!(
            reply,
            Some(format!("You do not have permission to {action} tickets.")),
            "{content}"
        );
    }
    assert_eq!(harness.provisioner.channel_count().await, 1);
    assert_eq!(harness.capability("91", DAVE.0).await, None);
}

#[tokio::test]
async fn regression_chatter_and_unknown_commands_produce_no_reply() {
    let harness = Harness::new();
    assert_eq!(harness.send(ALICE, false, LOBBY_CHANNEL, "hello").await, None);
    assert_eq!(harness.send(ALICE, false, LOBBY_CHANNEL, "!dance").await, None);
    assert_eq!(
        harness.send(ALICE, true, LOBBY_CHANNEL, "!add").await.as_deref(),
        Some("Usage: !add <@user>")
    );
    assert!(harness.provisioner.calls().await.is_empty());
}
