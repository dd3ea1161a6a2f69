//! Connection registry: the single owner of who is connected and what they
//! are subscribed to.
//!
//! All membership state sits behind one lock, so register, join, unregister
//! and lookups are linearizable: a lookup sees a connection either fully
//! enrolled or fully removed. Lookups return copies; nothing outside this
//! module holds a reference into the maps.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use relay_core::{Channel, ConnectionId, GroupId, UserId};

use crate::outbox::Outbox;

/// Result of a join request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// The connection is gone (or never existed); nothing changed.
    UnknownConnection,
}

/// A resolved delivery target, copied out of the registry.
#[derive(Clone, Debug)]
pub struct Recipient {
    pub connection_id: ConnectionId,
    pub outbox: Outbox,
}

/// What a connection held at the moment it was unregistered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Departed {
    pub user: Option<UserId>,
    pub groups: Vec<GroupId>,
}

struct Entry {
    user: Option<UserId>,
    groups: HashSet<GroupId>,
    outbox: Outbox,
}

#[derive(Default)]
struct Memberships {
    connections: HashMap<ConnectionId, Entry>,
    identities: HashMap<UserId, HashSet<ConnectionId>>,
    groups: HashMap<GroupId, HashSet<ConnectionId>>,
}

impl Memberships {
    /// Remove a connection and every index entry pointing at it. Empty
    /// channel keys are dropped so no stale index survives.
    fn detach(&mut self, id: &ConnectionId) -> Option<Entry> {
        let entry = self.connections.remove(id)?;

        if let Some(user) = &entry.user {
            remove_member(&mut self.identities, user, id);
        }
        for group in &entry.groups {
            remove_member(&mut self.groups, group, id);
        }
        Some(entry)
    }

    fn members(&self, channel: &Channel) -> Option<&HashSet<ConnectionId>> {
        match channel {
            Channel::Identity(user) => self.identities.get(user),
            Channel::Group(group) => self.groups.get(group),
        }
    }
}

fn remove_member<K: std::hash::Hash + Eq>(
    index: &mut HashMap<K, HashSet<ConnectionId>>,
    key: &K,
    id: &ConnectionId,
) {
    if let Some(members) = index.get_mut(key) {
        members.remove(id);
        if members.is_empty() {
            index.remove(key);
        }
    }
}

/// Registry of live connections and their channel memberships.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Memberships>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a connection, placing it in its identity channel when `user` is set.
    ///
    /// Registering an id that is already present replaces it: the old
    /// identity and group memberships are dropped first.
    pub fn register(&self, id: ConnectionId, user: Option<UserId>, outbox: Outbox) {
        let mut inner = self.inner.write();
        if inner.detach(&id).is_some() {
            tracing::warn!(conn_id = %id, "connection re-registered, previous memberships dropped");
        }

        if let Some(user) = &user {
            inner
                .identities
                .entry(user.clone())
                .or_default()
                .insert(id.clone());
        }
        inner.connections.insert(
            id,
            Entry {
                user,
                groups: HashSet::new(),
                outbox,
            },
        );
    }

    /// Add a connection to a group channel. Set semantics: joining twice is
    /// the same as joining once.
    pub fn join_group(&self, id: &ConnectionId, group: GroupId) -> JoinOutcome {
        let mut inner = self.inner.write();
        let Some(entry) = inner.connections.get_mut(id) else {
            return JoinOutcome::UnknownConnection;
        };
        if !entry.groups.insert(group.clone()) {
            return JoinOutcome::AlreadyMember;
        }
        inner.groups.entry(group).or_default().insert(id.clone());
        JoinOutcome::Joined
    }

    /// Remove a connection from its identity channel and every group it
    /// joined. Returns `None` if it was already gone.
    pub fn unregister(&self, id: &ConnectionId) -> Option<Departed> {
        let entry = self.inner.write().detach(id)?;
        let mut groups: Vec<GroupId> = entry.groups.into_iter().collect();
        groups.sort();
        Some(Departed {
            user: entry.user,
            groups,
        })
    }

    /// Snapshot of the connection ids subscribed to `channel`, sorted.
    /// Empty when nobody is subscribed.
    pub fn members_of(&self, channel: &Channel) -> Vec<ConnectionId> {
        let inner = self.inner.read();
        let mut ids: Vec<ConnectionId> = inner
            .members(channel)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Snapshot of the delivery targets for `channel`. The lock is released
    /// before this returns, so callers push without holding it.
    pub fn resolve(&self, channel: &Channel) -> Vec<Recipient> {
        let inner = self.inner.read();
        let Some(members) = inner.members(channel) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| {
                inner.connections.get(id).map(|entry| Recipient {
                    connection_id: id.clone(),
                    outbox: entry.outbox.clone(),
                })
            })
            .collect()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.inner.read().connections.contains_key(id)
    }

    pub fn user_of(&self, id: &ConnectionId) -> Option<UserId> {
        self.inner.read().connections.get(id).and_then(|e| e.user.clone())
    }

    /// Groups a connection has joined, sorted.
    pub fn groups_of(&self, id: &ConnectionId) -> Vec<GroupId> {
        let inner = self.inner.read();
        let mut groups: Vec<GroupId> = inner
            .connections
            .get(id)
            .map(|e| e.groups.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Number of identity channels with at least one member.
    pub fn identity_count(&self) -> usize {
        self.inner.read().identities.len()
    }

    /// Number of group channels with at least one member.
    pub fn group_count(&self) -> usize {
        self.inner.read().groups.len()
    }
}
