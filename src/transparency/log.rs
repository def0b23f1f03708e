//! Protection ledger.
//!
//! Counts what the protection layer detected and how its defenses fared.
//! Only counts are kept: no screen content, no notification content, no
//! timestamps of individual events.
//!
//! The coordinator feeds capture events and overlay outcomes; the CLI feeds
//! provisioning reports after each cold start. Counters accumulate across
//! runs when the ledger is persisted under `Config::ledger_path`.

use crate::capture::ClassifiedEvent;
use crate::channels::ProvisionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Running protection counters, optionally persisted.
///
/// Counters are atomics so the ledger can be shared through an `Arc` with a
/// provisioning worker while the coordinator owns the main context.
#[derive(Debug)]
pub struct ProtectionLog {
    screenshots_detected: AtomicU64,
    recordings_started: AtomicU64,
    recordings_stopped: AtomicU64,
    /// Successful overlay installs and re-arms
    overlay_armed: AtomicU64,
    /// Installs that ended in `Failed`, including retries
    overlay_failures: AtomicU64,
    /// Channels the OS accepted, summed over every reconciliation
    channels_provisioned: AtomicU64,
    channel_failures: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl ProtectionLog {
    pub fn new() -> Self {
        Self {
            screenshots_detected: AtomicU64::new(0),
            recordings_started: AtomicU64::new(0),
            recordings_stopped: AtomicU64::new(0),
            overlay_armed: AtomicU64::new(0),
            overlay_failures: AtomicU64::new(0),
            channels_provisioned: AtomicU64::new(0),
            channel_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous protection stats: {}", e);
        }

        log
    }

    /// Count a classified capture event. A synthesized start for a recording
    /// already running at subscribe time counts like any other start.
    pub fn record_capture(&self, event: &ClassifiedEvent) {
        let counter = match event {
            ClassifiedEvent::Screenshot { .. } => &self.screenshots_detected,
            ClassifiedEvent::Recording { active: true, .. } => &self.recordings_started,
            ClassifiedEvent::Recording { active: false, .. } => &self.recordings_stopped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an overlay that reached `Armed`, whether from start, a resume
    /// re-arm or a retry after failure.
    pub fn record_overlay_armed(&self) {
        self.overlay_armed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overlay_failure(&self) {
        self.overlay_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add one reconciliation pass. An unsupported OS reports nothing, so
    /// it leaves both counters unchanged.
    pub fn record_provisioning(&self, report: &ProvisionReport) {
        self.channels_provisioned
            .fetch_add(report.channels.len() as u64, Ordering::Relaxed);
        self.channel_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ProtectionStats {
        ProtectionStats {
            screenshots_detected: self.screenshots_detected.load(Ordering::Relaxed),
            recordings_started: self.recordings_started.load(Ordering::Relaxed),
            recordings_stopped: self.recordings_stopped.load(Ordering::Relaxed),
            overlay_armed: self.overlay_armed.load(Ordering::Relaxed),
            overlay_failures: self.overlay_failures.load(Ordering::Relaxed),
            channels_provisioned: self.channels_provisioned.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Protection Statistics:\n\
             - Screenshots detected: {}\n\
             - Recordings started: {}\n\
             - Recordings stopped: {}\n\
             - Overlay armed: {}\n\
             - Overlay failures: {}\n\
             - Channels provisioned: {}\n\
             - Channel failures: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No screen content captured\n\
             - No notification content recorded\n\
             - Only event counts retained",
            stats.screenshots_detected,
            stats.recordings_started,
            stats.recordings_stopped,
            stats.overlay_armed,
            stats.overlay_failures,
            stats.channels_provisioned,
            stats.channel_failures,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                screenshots_detected: stats.screenshots_detected,
                recordings_started: stats.recordings_started,
                recordings_stopped: stats.recordings_stopped,
                overlay_armed: stats.overlay_armed,
                overlay_failures: stats.overlay_failures,
                channels_provisioned: stats.channels_provisioned,
                channel_failures: stats.channel_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.screenshots_detected
                    .store(persisted.screenshots_detected, Ordering::Relaxed);
                self.recordings_started
                    .store(persisted.recordings_started, Ordering::Relaxed);
                self.recordings_stopped
                    .store(persisted.recordings_stopped, Ordering::Relaxed);
                self.overlay_armed
                    .store(persisted.overlay_armed, Ordering::Relaxed);
                self.overlay_failures
                    .store(persisted.overlay_failures, Ordering::Relaxed);
                self.channels_provisioned
                    .store(persisted.channels_provisioned, Ordering::Relaxed);
                self.channel_failures
                    .store(persisted.channel_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        for counter in [
            &self.screenshots_detected,
            &self.recordings_started,
            &self.recordings_stopped,
            &self.overlay_armed,
            &self.overlay_failures,
            &self.channels_provisioned,
            &self.channel_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ProtectionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of protection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionStats {
    pub screenshots_detected: u64,
    pub recordings_started: u64,
    pub recordings_stopped: u64,
    pub overlay_armed: u64,
    pub overlay_failures: u64,
    pub channels_provisioned: u64,
    pub channel_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    screenshots_detected: u64,
    recordings_started: u64,
    recordings_stopped: u64,
    overlay_armed: u64,
    overlay_failures: u64,
    channels_provisioned: u64,
    channel_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Protection log shared between the coordinator and the host.
pub type SharedProtectionLog = Arc<ProtectionLog>;

pub fn create_shared_log() -> SharedProtectionLog {
    Arc::new(ProtectionLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedProtectionLog {
    Arc::new(ProtectionLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_counting() {
        let log = ProtectionLog::new();
        let now = Utc::now();

        log.record_capture(&ClassifiedEvent::Screenshot { timestamp: now });
        log.record_capture(&ClassifiedEvent::Screenshot { timestamp: now });
        log.record_capture(&ClassifiedEvent::Recording {
            active: true,
            timestamp: now,
        });

        let stats = log.stats();
        assert_eq!(stats.screenshots_detected, 2);
        assert_eq!(stats.recordings_started, 1);
        assert_eq!(stats.recordings_stopped, 0);
    }

    #[test]
    fn test_provisioning_counts() {
        let log = ProtectionLog::new();
        let report = ProvisionReport {
            supported: true,
            channels: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        log.record_provisioning(&report);
        assert_eq!(log.stats().channels_provisioned, 2);
        assert_eq!(log.stats().channel_failures, 0);

        log.record_provisioning(&ProvisionReport::unsupported());
        assert_eq!(log.stats().channels_provisioned, 2);
    }

    #[test]
    fn test_reset() {
        let log = ProtectionLog::new();
        log.record_overlay_armed();
        log.record_overlay_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.overlay_armed, 0);
        assert_eq!(stats.overlay_failures, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("nookly-guard-log-{}", uuid::Uuid::new_v4()))
            .join("protection.json");

        let log = ProtectionLog::with_persistence(path.clone());
        log.record_overlay_armed();
        log.record_capture(&ClassifiedEvent::Screenshot {
            timestamp: Utc::now(),
        });
        log.save().unwrap();

        let reloaded = ProtectionLog::with_persistence(path.clone());
        assert_eq!(reloaded.stats().overlay_armed, 1);
        assert_eq!(reloaded.stats().screenshots_detected, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let summary = ProtectionLog::new().summary();
        assert!(summary.contains("Screenshots detected"));
        assert!(summary.contains("Privacy Guarantee"));
        assert!(summary.contains("No screen content captured"));
    }
}
