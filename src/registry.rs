use std::{
    collections::{hash_map::Values, HashMap},
    sync::atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use warp::ws::Message;

/// Opaque per-connection identifier, generated at connect time.
pub type SessionId = Uuid;

/// Sending half of a member's socket writer.
pub type Outbound = mpsc::UnboundedSender<Message>;

/// One connected participant.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: SessionId,
    pub name: String,
    outbound: Outbound,
}

impl Member {
    /// Queue a message on this member's socket writer.
    ///
    /// Fails only when the writer has gone away, i.e. the transport is dead.
    pub fn send(&self, message: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.outbound.send(message)
    }
}

/// Our state of currently connected members.
///
/// - Key is their session id
/// - Value is the member, holding the sender of `warp::ws::Message`
///
/// Inserts, removals and fan-out traversals all go through the same lock.
#[derive(Debug)]
pub struct Registry {
    members: RwLock<HashMap<SessionId, Member>>,
    next_user: AtomicUsize,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            members: RwLock::new(HashMap::new()),
            next_user: AtomicUsize::new(1),
        }
    }
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Register a new member writing to `outbound` and return a copy of its record.
    pub async fn register(&self, outbound: Outbound) -> Member {
        self.register_with(outbound, |_, _| {}).await
    }

    /// Register a new member, then call `f` with it and every registered
    /// member (itself included) before the write lock is released.
    pub async fn register_with<F>(&self, outbound: Outbound, f: F) -> Member
    where
        F: FnOnce(&Member, Values<'_, SessionId, Member>),
    {
        let mut members = self.members.write().await;
        // Allocated under the write lock so insertion order follows name order.
        let number = self.next_user.fetch_add(1, Ordering::Relaxed);
        let member = Member {
            id: Uuid::new_v4(),
            name: format!("user{}", number),
            outbound,
        };
        members.insert(member.id, member.clone());
        log::debug!("registered {} ({}), {} online", member.name, member.id, members.len());
        f(&member, members.values());
        member
    }

    /// Remove a member. Removing an unknown or already removed id is a no-op.
    pub async fn unregister(&self, id: &SessionId) -> Option<Member> {
        self.unregister_with(id, |_, _| {}).await
    }

    /// Remove a member, then call `f` with it and the remaining members
    /// before the write lock is released. `f` only runs if the member was
    /// still registered.
    pub async fn unregister_with<F>(&self, id: &SessionId, f: F) -> Option<Member>
    where
        F: FnOnce(&Member, Values<'_, SessionId, Member>),
    {
        let mut members = self.members.write().await;
        let removed = members.remove(id);
        if let Some(member) = &removed {
            log::debug!("unregistered {} ({})", member.name, member.id);
            f(member, members.values());
        }
        removed
    }

    /// Visit every registered member except `except`.
    pub async fn for_each_except<F>(&self, except: &SessionId, f: F)
    where
        F: FnMut(&Member),
    {
        self.visit(Some(except), f).await
    }

    /// Visit every registered member.
    pub async fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Member),
    {
        self.visit(None, f).await
    }

    async fn visit<F>(&self, except: Option<&SessionId>, mut f: F)
    where
        F: FnMut(&Member),
    {
        let members = self.members.read().await;
        members
            .values()
            .filter(|member| Some(&member.id) != except)
            .for_each(|member| f(member));
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Display names of the current members, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .members
            .read()
            .await
            .values()
            .map(|member| member.name.clone())
            .collect();
        names.sort();
        names
    }
}
