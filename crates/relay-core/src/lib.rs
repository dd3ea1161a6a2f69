pub mod channel;
pub mod errors;
pub mod events;
pub mod ids;

pub use channel::{Channel, ChannelKind};
pub use errors::FrameError;
pub use events::{payload_from_str, DispatchEvent, InboundEvent, OutboundEvent, Payload};
pub use ids::{ConnectionId, GroupId, UserId};
