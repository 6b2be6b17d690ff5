//! Routing layer that only logs.
//!
//! The network transport is outside this crate.  Until one is plugged in, the
//! server binary routes through [`LogRouting`], which records every decision
//! at `info`/`debug`/`trace` level and keeps counters that the binary prints
//! on exit.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use gridshare_core::ClipboardId;
use tracing::{debug, info, trace};

use crate::application::route_input::{ForwardedInput, RoutingLayer};

/// Counts of what went through a [`LogRouting`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingStats {
    pub switches: u64,
    pub forwarded: u64,
    pub clipboard_messages: u64,
}

/// A [`RoutingLayer`] that writes every call to the log.
#[derive(Debug, Default)]
pub struct LogRouting {
    switches: AtomicU64,
    forwarded: AtomicU64,
    clipboard_messages: AtomicU64,
}

impl LogRouting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RoutingStats {
        RoutingStats {
            switches: self.switches.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            clipboard_messages: self.clipboard_messages.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RoutingLayer for LogRouting {
    async fn switched(&self, from: &str, to: &str, x: i32, y: i32) -> Result<(), String> {
        self.switches.fetch_add(1, Ordering::Relaxed);
        info!(from, to, x, y, "route: enter screen");
        Ok(())
    }

    async fn forward(&self, screen: &str, input: ForwardedInput) -> Result<(), String> {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        trace!(screen, ?input, "route: forward");
        Ok(())
    }

    async fn clipboard_changed(
        &self,
        owner: &str,
        id: ClipboardId,
        sequence: u32,
        peers: &[String],
    ) -> Result<(), String> {
        self.clipboard_messages.fetch_add(1, Ordering::Relaxed);
        debug!(owner, ?id, sequence, ?peers, "route: clipboard changed");
        Ok(())
    }

    async fn clipboard_handoff(
        &self,
        owner: &str,
        target: &str,
        id: ClipboardId,
        sequence: u32,
    ) -> Result<(), String> {
        self.clipboard_messages.fetch_add(1, Ordering::Relaxed);
        debug!(owner, target, ?id, sequence, "route: clipboard handoff");
        Ok(())
    }

    async fn restart_connections(&self) -> Result<(), String> {
        info!("route: restart all connections");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_routing_counts_calls() {
        // Arrange
        let routing = LogRouting::new();

        // Act
        routing.switched("server", "laptop", 1, 400).await.unwrap();
        routing
            .forward("laptop", ForwardedInput::MouseDown(1))
            .await
            .unwrap();
        routing
            .clipboard_handoff("server", "laptop", ClipboardId::Clipboard, 3)
            .await
            .unwrap();

        // Assert
        assert_eq!(
            routing.stats(),
            RoutingStats {
                switches: 1,
                forwarded: 1,
                clipboard_messages: 1
            }
        );
    }
}
