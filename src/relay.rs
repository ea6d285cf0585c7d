use std::sync::Arc;

use warp::ws::Message;

use crate::registry::{Member, Outbound, Registry};

/// Name used to tag lines originated by the relay itself.
pub const SERVER_NAME: &str = "server";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deliver a member's chat lines back to that member as well.
    pub echo_to_sender: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            echo_to_sender: true,
        }
    }
}

/// Fans lines out to every member of a [`Registry`].
#[derive(Debug)]
pub struct Relay {
    registry: Arc<Registry>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(registry: Arc<Registry>, config: RelayConfig) -> Relay {
        Relay { registry, config }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Deliver `[server] <text>` to all members.
    pub async fn broadcast_system(&self, text: &str) -> usize {
        let line = format_line(SERVER_NAME, text);
        self.deliver(&line, None).await
    }

    /// Register a member writing to `outbound` and announce it to everyone,
    /// itself included.
    ///
    /// The announcement goes out before the registry lock is released, so
    /// joins are announced in name order and a new member's first line is its
    /// own join.
    pub async fn join(&self, outbound: Outbound) -> Member {
        self.registry
            .register_with(outbound, |member, members| {
                let line = format_line(SERVER_NAME, &format!("Member joined: {}.", member.name));
                fan_out(&Message::text(line), members);
            })
            .await
    }

    /// Unregister a member and announce its departure to the rest.
    ///
    /// Returns false, announcing nothing, if the member was already gone.
    pub async fn leave(&self, member: &Member) -> bool {
        self.registry
            .unregister_with(&member.id, |member, members| {
                let line = format_line(SERVER_NAME, &format!("Member left: {}.", member.name));
                fan_out(&Message::text(line), members);
            })
            .await
            .is_some()
    }

    /// Deliver `[<name>] <text>` on behalf of `member`.
    ///
    /// The sender is included unless echo is disabled in the config.
    pub async fn broadcast_from(&self, member: &Member, text: &str) -> usize {
        let line = format_line(&member.name, text);
        let except = if self.config.echo_to_sender {
            None
        } else {
            Some(member)
        };
        self.deliver(&line, except).await
    }

    /// Returns how many members accepted the line.
    async fn deliver(&self, line: &str, except: Option<&Member>) -> usize {
        let message = Message::text(line);
        let mut delivered = 0;
        let mut send = |member: &Member| {
            if send_to(member, &message) {
                delivered += 1;
            }
        };
        match except {
            Some(sender) => self.registry.for_each_except(&sender.id, &mut send).await,
            None => self.registry.for_each(&mut send).await,
        }
        delivered
    }
}

fn fan_out<'a>(message: &Message, members: impl Iterator<Item = &'a Member>) -> usize {
    members.filter(|member| send_to(member, message)).count()
}

fn send_to(member: &Member, message: &Message) -> bool {
    match member.send(message.clone()) {
        Ok(()) => true,
        Err(_disconnected) => {
            // The writer is gone; whichever session observes the close
            // unregisters the member.
            log::debug!("dropping line for {}: transport closed", member.name);
            false
        }
    }
}

pub fn format_line(name: &str, text: &str) -> String {
    format!("[{}] {}", name, text)
}
