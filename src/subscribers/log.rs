//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] renders each event through `tracing` in a compact
//! key-value format. Useful while developing an embedding; production
//! deployments usually implement their own [`Subscribe`] sink.
//!
//! ## Output format
//! ```text
//! labor=w-3f9k@host event=node_up phase=loading
//! labor=w-3f9k@host event=load_failed error="release fetch failed: ..." attempt=2 delay=4s
//! labor=w-3f9k@host event=paired phase=active
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Tracing-backed event logger.
///
/// Enabled via the `logging` feature. Failures and timeouts log at `warn`,
/// everything else at `info`.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) {
        let labor = event.labor.as_deref().unwrap_or("-");
        let kind = event.kind.as_label();
        let phase = event.phase.map(|p| p.as_label()).unwrap_or("-");

        match event.kind {
            EventKind::SpawnFailed
            | EventKind::LoadFailed
            | EventKind::ConnTimeout
            | EventKind::PairTimeout
            | EventKind::EndpointExit
            | EventKind::UnknownNode => {
                tracing::warn!(
                    labor,
                    event = kind,
                    phase,
                    error = event.error.as_deref().unwrap_or("-"),
                    attempt = event.attempt,
                    delay = ?event.delay,
                    "overseer event"
                );
            }
            _ => {
                tracing::info!(labor, event = kind, phase, "overseer event");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
