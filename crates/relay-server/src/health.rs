//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::registry::ConnectionRegistry;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Identity channels with at least one connection.
    pub identities: usize,
    /// Group channels with at least one connection.
    pub groups: usize,
}

/// Build a health response from live registry counters.
pub fn health_check(start_time: Instant, registry: &ConnectionRegistry) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: registry.connection_count(),
        identities: registry.identity_count(),
        groups: registry.group_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Outbox;
    use relay_core::{ConnectionId, GroupId, UserId};

    #[test]
    fn empty_registry() {
        let resp = health_check(Instant::now(), &ConnectionRegistry::new());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
        assert_eq!(resp.connections, 0);
        assert_eq!(resp.identities, 0);
        assert_eq!(resp.groups, 0);
    }

    #[test]
    fn counts_reflect_registry() {
        let registry = ConnectionRegistry::new();
        let a = ConnectionId::new();
        registry.register(a.clone(), Some(UserId::from_raw("1")), Outbox::channel(1).0);
        registry.register(ConnectionId::new(), Some(UserId::from_raw("1")), Outbox::channel(1).0);
        registry.register(ConnectionId::new(), None, Outbox::channel(1).0);
        registry.join_group(&a, GroupId::from_raw("g1"));

        let resp = health_check(Instant::now(), &registry);
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.identities, 1);
        assert_eq!(resp.groups, 1);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, &ConnectionRegistry::new());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), &ConnectionRegistry::new());
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed["uptime_secs"].is_number());
        assert!(parsed["groups"].is_number());
    }
}
