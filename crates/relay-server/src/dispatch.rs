//! Fan-out of a routed message to every current member of its channel.

use std::sync::Arc;

use relay_core::DispatchEvent;
use relay_telemetry::MetricsRecorder;
use tracing::{debug, warn};

use crate::protocol;
use crate::registry::ConnectionRegistry;

/// Per-dispatch delivery counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Members resolved at dispatch time.
    pub targets: usize,
    /// Frames queued successfully.
    pub delivered: usize,
    /// Targets whose queue was full or closed.
    pub failed: usize,
}

/// Resolves channels through the registry and pushes delivery frames.
///
/// Delivery is at-most-once and fire-and-forget. A failed push is logged and
/// skipped; it never aborts the remaining targets or reaches the sender.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<MetricsRecorder>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { registry, metrics }
    }

    pub fn dispatch(&self, event: DispatchEvent) -> DispatchReport {
        let kind = event.channel.kind().as_str();
        self.metrics.counter_inc("relay_dispatches", &[("kind", kind)], 1);

        // Snapshot first; the registry lock is not held while pushing.
        let recipients = self.registry.resolve(&event.channel);
        let mut report = DispatchReport {
            targets: recipients.len(),
            ..DispatchReport::default()
        };
        if recipients.is_empty() {
            debug!(channel = %event.channel, "no members, nothing to deliver");
            return report;
        }

        let frame: Arc<str> = match protocol::encode_delivery(event.outbound(), &event.payload) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!(channel = %event.channel, error = %e, "failed to encode delivery frame");
                report.failed = report.targets;
                self.metrics.counter_inc("relay_pushes_failed", &[], report.failed as u64);
                return report;
            }
        };

        for recipient in recipients {
            match recipient.outbox.push(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        conn_id = %recipient.connection_id,
                        channel = %event.channel,
                        error = %e,
                        "push failed, skipping target"
                    );
                }
            }
        }

        self.metrics
            .counter_inc("relay_pushes_delivered", &[], report.delivered as u64);
        if report.failed > 0 {
            self.metrics
                .counter_inc("relay_pushes_failed", &[], report.failed as u64);
        }

        debug!(
            channel = %event.channel,
            sender = ?event.sender.as_ref().map(|s| s.as_str()),
            targets = report.targets,
            delivered = report.delivered,
            failed = report.failed,
            "dispatched"
        );
        report
    }
}
