use serde_json::value::RawValue;

use crate::channel::Channel;
use crate::ids::{ConnectionId, GroupId, UserId};

/// Opaque application payload. Kept as the exact JSON span the sender wrote;
/// the relay never parses or re-serializes it.
pub type Payload = Box<RawValue>;

/// Build a payload from a JSON text fragment.
pub fn payload_from_str(json: &str) -> Result<Payload, serde_json::Error> {
    RawValue::from_string(json.to_owned())
}

/// A routed event received from a connected client.
///
/// Connect and disconnect are transport-level and never arrive as frames.
#[derive(Debug)]
pub enum InboundEvent {
    JoinGroup {
        group_id: GroupId,
    },
    SendDirectMessage {
        recipient_id: UserId,
        payload: Payload,
    },
    SendGroupMessage {
        group_id: GroupId,
        payload: Payload,
    },
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinGroup { .. } => "joinGroup",
            Self::SendDirectMessage { .. } => "sendDirectMessage",
            Self::SendGroupMessage { .. } => "sendGroupMessage",
        }
    }
}

/// Outbound event type, chosen by the kind of channel the message was routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboundEvent {
    NewDirectMessage,
    NewGroupMessage,
}

impl OutboundEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewDirectMessage => "newDirectMessage",
            Self::NewGroupMessage => "newGroupMessage",
        }
    }
}

/// A payload plus the channel it should fan out to.
#[derive(Debug)]
pub struct DispatchEvent {
    pub channel: Channel,
    pub payload: Payload,
    /// Carried for logging only; the sender is not excluded from delivery.
    pub sender: Option<ConnectionId>,
}

impl DispatchEvent {
    pub fn direct(recipient: UserId, payload: Payload) -> Self {
        Self {
            channel: Channel::Identity(recipient),
            payload,
            sender: None,
        }
    }

    pub fn group(group: GroupId, payload: Payload) -> Self {
        Self {
            channel: Channel::Group(group),
            payload,
            sender: None,
        }
    }

    pub fn from_sender(mut self, sender: ConnectionId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn outbound(&self) -> OutboundEvent {
        match self.channel {
            Channel::Identity(_) => OutboundEvent::NewDirectMessage,
            Channel::Group(_) => OutboundEvent::NewGroupMessage,
        }
    }
}
