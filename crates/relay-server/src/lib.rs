//! # relay-server
//!
//! WebSocket message relay: tracks live connections, their identity and group
//! channel memberships, and fans routed messages out to every current member.
//!
//! - [`registry`]: connection registry and membership indexes
//! - [`dispatch`]: resolve a channel and push a payload to each member
//! - [`relay`]: the inbound event surface (connect, join, send, disconnect)
//! - [`client`]: per-socket reader/writer tasks and heartbeat
//! - [`server`]: Axum router, `/ws` upgrade, health and metrics endpoints

pub mod client;
pub mod config;
pub mod dispatch;
pub mod handler;
pub mod health;
pub mod outbox;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod shutdown;

pub use config::{ConfigError, ServerConfig};
pub use dispatch::{DispatchReport, Dispatcher};
pub use outbox::{Outbox, PushError};
pub use registry::{ConnectionRegistry, JoinOutcome};
pub use relay::Relay;
pub use server::{build_router, start, AppState, ServerHandle};
