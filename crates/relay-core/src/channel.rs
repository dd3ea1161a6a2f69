use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, UserId};

/// Which membership index a channel key lives in.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Keyed by user id; membership comes from the connect handshake.
    Identity,
    /// Keyed by group id; membership comes from explicit joins.
    Group,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fan-out target: one identity channel or one group channel.
///
/// Channels are never created or destroyed explicitly. A channel exists while
/// at least one live connection references its key.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Channel {
    Identity(UserId),
    Group(GroupId),
}

impl Channel {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Identity(_) => ChannelKind::Identity,
            Self::Group(_) => ChannelKind::Group,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Identity(user) => user.as_str(),
            Self::Group(group) => group.as_str(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}
