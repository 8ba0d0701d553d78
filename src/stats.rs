use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Interval between periodic stats log lines
const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Snapshot of relay statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStats {
    /// Total number of sessions since startup
    pub total_sessions: u64,
    /// Currently active sessions
    pub active_sessions: u64,
    /// Bytes forwarded client -> upstream
    pub bytes_to_upstream: u64,
    /// Payload bytes forwarded upstream -> client (before compression)
    pub bytes_to_client: u64,
}

/// Statistics tracker shared by all sessions
///
/// Cheap to clone; counters are atomics, updated from session tasks
/// and read by the periodic reporter.
#[derive(Debug, Clone, Default)]
pub struct RelayStatsTracker {
    total_sessions: Arc<AtomicU64>,
    active_sessions: Arc<AtomicU64>,
    bytes_to_upstream: Arc<AtomicU64>,
    bytes_to_client: Arc<AtomicU64>,
}

impl RelayStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment session counters (called when a session starts bridging)
    pub fn session_started(&self) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active sessions (called when both pumps have returned)
    pub fn session_ended(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Add bytes forwarded client -> upstream
    pub fn add_bytes_up(&self, bytes: u64) {
        self.bytes_to_upstream.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Add payload bytes forwarded upstream -> client
    pub fn add_bytes_down(&self, bytes: u64) {
        self.bytes_to_client.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get current snapshot of stats
    pub fn snapshot(&self) -> RelayStats {
        RelayStats {
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            bytes_to_upstream: self.bytes_to_upstream.load(Ordering::Relaxed),
            bytes_to_client: self.bytes_to_client.load(Ordering::Relaxed),
        }
    }

    /// Spawn the periodic stats reporter task
    pub fn start_reporter(self) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(REPORT_INTERVAL).await;
                let stats = self.snapshot();
                debug!(
                    "Stats: {} active / {} total sessions, {} bytes to upstream, {} bytes to clients",
                    stats.active_sessions,
                    stats.total_sessions,
                    stats.bytes_to_upstream,
                    stats.bytes_to_client
                );
            }
        });
    }
}
