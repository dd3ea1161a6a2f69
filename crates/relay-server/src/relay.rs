//! The relay's inbound event surface: connect, join, send, disconnect.

use std::sync::Arc;

use relay_core::{ConnectionId, DispatchEvent, GroupId, InboundEvent, Payload, UserId};
use relay_telemetry::MetricsRecorder;
use tracing::{debug, info};

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::outbox::Outbox;
use crate::registry::{ConnectionRegistry, JoinOutcome};

/// What handling one inbound event produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Joined(JoinOutcome),
    Dispatched(DispatchReport),
}

/// Registry plus dispatcher, shared by every connection task.
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    metrics: Arc<MetricsRecorder>,
}

impl Relay {
    pub fn new(metrics: Arc<MetricsRecorder>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&metrics));
        Self {
            registry,
            dispatcher,
            metrics,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// A transport connection was accepted. Assigns its id and enrolls it in
    /// its identity channel when `user` is set.
    pub fn connect(&self, user: Option<UserId>, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new();
        info!(
            conn_id = %id,
            user_id = user.as_ref().map_or("", |u| u.as_str()),
            "connection registered"
        );
        self.registry.register(id.clone(), user, outbox);
        self.metrics.counter_inc("relay_connections_opened", &[], 1);
        self.metrics.gauge_add("relay_connections_active", &[], 1);
        id
    }

    pub fn join_group(&self, id: &ConnectionId, group: GroupId) -> JoinOutcome {
        let outcome = self.registry.join_group(id, group.clone());
        match outcome {
            JoinOutcome::Joined => {
                self.metrics.counter_inc("relay_group_joins", &[], 1);
                debug!(conn_id = %id, group_id = %group, "joined group");
            }
            JoinOutcome::AlreadyMember => {
                debug!(conn_id = %id, group_id = %group, "already a member");
            }
            JoinOutcome::UnknownConnection => {
                debug!(conn_id = %id, group_id = %group, "join from unknown connection ignored");
            }
        }
        outcome
    }

    pub fn send_direct(
        &self,
        sender: &ConnectionId,
        recipient: UserId,
        payload: Payload,
    ) -> DispatchReport {
        self.dispatcher
            .dispatch(DispatchEvent::direct(recipient, payload).from_sender(sender.clone()))
    }

    pub fn send_group(&self, sender: &ConnectionId, group: GroupId, payload: Payload) -> DispatchReport {
        self.dispatcher
            .dispatch(DispatchEvent::group(group, payload).from_sender(sender.clone()))
    }

    /// Apply one decoded inbound event from connection `id`.
    pub fn handle_event(&self, id: &ConnectionId, event: InboundEvent) -> EventOutcome {
        match event {
            InboundEvent::JoinGroup { group_id } => EventOutcome::Joined(self.join_group(id, group_id)),
            InboundEvent::SendDirectMessage {
                recipient_id,
                payload,
            } => EventOutcome::Dispatched(self.send_direct(id, recipient_id, payload)),
            InboundEvent::SendGroupMessage { group_id, payload } => {
                EventOutcome::Dispatched(self.send_group(id, group_id, payload))
            }
        }
    }

    /// The transport closed. Removes every membership; a second call for
    /// the same id does nothing and returns `false`.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        match self.registry.unregister(id) {
            Some(departed) => {
                self.metrics.counter_inc("relay_connections_closed", &[], 1);
                self.metrics.gauge_add("relay_connections_active", &[], -1);
                info!(
                    conn_id = %id,
                    user_id = departed.user.as_ref().map_or("", |u| u.as_str()),
                    groups = departed.groups.len(),
                    "connection unregistered"
                );
                true
            }
            None => false,
        }
    }
}
