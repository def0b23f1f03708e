//! Reconciles the declared catalog against the OS notification manager.
//!
//! The registrar does not diff. Every process start replays the full
//! declarative state; the OS primitive is idempotent on identical identity and
//! attributes, so a second run changes nothing. Channels are never deleted
//! here, since deleting one discards the user's own overrides for it.

use super::catalog::{validate_batch, Catalog, CatalogError};
use super::types::{ChannelDefinition, ChannelGroup};
use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// The OS notification manager, as seen by the registrar.
pub trait NotificationPort {
    fn create_channel_group(&mut self, group: &ChannelGroup) -> Result<(), PortError>;

    fn create_channel(&mut self, definition: &ChannelDefinition) -> Result<(), PortError>;

    /// Ids of every channel the OS currently holds for this app.
    fn channel_ids(&self) -> Result<Vec<String>, PortError> {
        Err(PortError::Unsupported)
    }
}

impl<P: NotificationPort + ?Sized> NotificationPort for &mut P {
    fn create_channel_group(&mut self, group: &ChannelGroup) -> Result<(), PortError> {
        (**self).create_channel_group(group)
    }

    fn create_channel(&mut self, definition: &ChannelDefinition) -> Result<(), PortError> {
        (**self).create_channel(definition)
    }

    fn channel_ids(&self) -> Result<Vec<String>, PortError> {
        (**self).channel_ids()
    }
}

impl<P: NotificationPort + ?Sized> NotificationPort for Box<P> {
    fn create_channel_group(&mut self, group: &ChannelGroup) -> Result<(), PortError> {
        (**self).create_channel_group(group)
    }

    fn create_channel(&mut self, definition: &ChannelDefinition) -> Result<(), PortError> {
        (**self).create_channel(definition)
    }

    fn channel_ids(&self) -> Result<Vec<String>, PortError> {
        (**self).channel_ids()
    }
}

/// Errors reported by a [`NotificationPort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The OS has no notification channels (too old, or not this platform).
    Unsupported,
    /// The OS refused this particular group or channel.
    Rejected(String),
}

impl std::fmt::Display for PortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortError::Unsupported => write!(f, "Notification channels are not supported"),
            PortError::Rejected(reason) => write!(f, "Rejected by the OS: {reason}"),
        }
    }
}

impl std::error::Error for PortError {}

/// Whole-batch errors. Per-item problems go into [`ProvisionReport::failures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The batch itself is inconsistent; nothing was sent to the OS.
    InvalidBatch(CatalogError),
    /// The background worker went away without reporting.
    WorkerLost,
}

impl std::fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionError::InvalidBatch(e) => write!(f, "Invalid provisioning batch: {e}"),
            ProvisionError::WorkerLost => write!(f, "Provisioning worker exited unexpectedly"),
        }
    }
}

impl std::error::Error for ProvisionError {}

impl From<CatalogError> for ProvisionError {
    fn from(e: CatalogError) -> Self {
        ProvisionError::InvalidBatch(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Group,
    Channel,
}

/// One group or channel that could not be provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionFailure {
    pub target: Target,
    pub id: String,
    pub reason: String,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Catalog version replayed, when reconciled from a [`Catalog`].
    pub catalog_version: Option<u32>,
    /// False when the OS has no channel support; everything else is then empty.
    pub supported: bool,
    pub groups: Vec<String>,
    pub channels: Vec<String>,
    pub failures: Vec<ProvisionFailure>,
    /// Channels the OS holds that the batch no longer declares. Reported only.
    pub stale: Vec<String>,
}

impl ProvisionReport {
    /// Report for an OS without channel support.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }

    fn fail(&mut self, target: Target, id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Failed to provision {:?} '{}': {}", target, id, reason);
        self.failures.push(ProvisionFailure {
            target,
            id: id.to_string(),
            reason,
        });
    }
}

/// Replay `groups` then `definitions` against the OS.
///
/// Returns an error only when the batch is structurally invalid. OS
/// capability absence yields [`ProvisionReport::unsupported`]; individual
/// rejections are recorded and the remaining items are still provisioned.
pub fn reconcile<P: NotificationPort + ?Sized>(
    port: &mut P,
    groups: &[ChannelGroup],
    definitions: &[ChannelDefinition],
) -> Result<ProvisionReport, ProvisionError> {
    validate_batch(groups, definitions)?;

    let mut report = ProvisionReport {
        supported: true,
        ..ProvisionReport::default()
    };

    let mut provisioned_groups = HashSet::new();
    for group in groups {
        match port.create_channel_group(group) {
            Ok(()) => {
                debug!("Provisioned channel group '{}'", group.id);
                provisioned_groups.insert(group.id.as_str());
                report.groups.push(group.id.clone());
            }
            Err(PortError::Unsupported) => return Ok(degrade()),
            Err(PortError::Rejected(reason)) => report.fail(Target::Group, &group.id, reason),
        }
    }

    for definition in definitions {
        if let Err(reason) = definition.validate() {
            report.fail(Target::Channel, &definition.id, reason);
            continue;
        }
        if let Some(ref group_id) = definition.group_id {
            if !provisioned_groups.contains(group_id.as_str()) {
                report.fail(
                    Target::Channel,
                    &definition.id,
                    format!("group '{group_id}' was not provisioned"),
                );
                continue;
            }
        }

        match port.create_channel(definition) {
            Ok(()) => {
                debug!(
                    "Provisioned channel '{}' ({:?})",
                    definition.id, definition.urgency
                );
                report.channels.push(definition.id.clone());
            }
            Err(PortError::Unsupported) => return Ok(degrade()),
            Err(PortError::Rejected(reason)) => {
                report.fail(Target::Channel, &definition.id, reason)
            }
        }
    }

    match port.channel_ids() {
        Ok(existing) => {
            let declared: HashSet<&str> = definitions.iter().map(|d| d.id.as_str()).collect();
            report.stale = existing
                .into_iter()
                .filter(|id| !declared.contains(id.as_str()))
                .collect();
            if !report.stale.is_empty() {
                info!(
                    "{} channel(s) no longer declared, left in place: {:?}",
                    report.stale.len(),
                    report.stale
                );
            }
        }
        Err(e) => debug!("Skipping stale channel check: {}", e),
    }

    info!(
        "Provisioned {} group(s), {} channel(s), {} failure(s)",
        report.groups.len(),
        report.channels.len(),
        report.failures.len()
    );
    Ok(report)
}

/// Reconcile a whole catalog.
pub fn reconcile_catalog<P: NotificationPort + ?Sized>(
    port: &mut P,
    catalog: &Catalog,
) -> Result<ProvisionReport, ProvisionError> {
    let mut report = reconcile(port, catalog.groups(), catalog.definitions())?;
    report.catalog_version = Some(catalog.version());
    Ok(report)
}

fn degrade() -> ProvisionReport {
    info!("Notification channels unsupported; using OS default notification behavior");
    ProvisionReport::unsupported()
}

type Outcome<P> = (P, Result<ProvisionReport, ProvisionError>);

/// A reconciliation running on a worker thread.
///
/// The app is not ready to notify until this has finished; callers can poll
/// [`is_pending`](Self::is_pending) or block on [`wait`](Self::wait).
pub struct ProvisionHandle<P> {
    receiver: Receiver<Outcome<P>>,
    finished: Option<Outcome<P>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl<P> ProvisionHandle<P> {
    fn poll(&mut self) {
        if self.finished.is_none() {
            if let Ok(outcome) = self.receiver.try_recv() {
                self.finished = Some(outcome);
            }
        }
    }

    pub fn is_pending(&mut self) -> bool {
        self.poll();
        self.finished.is_none()
    }

    /// The result, if the worker has finished.
    pub fn try_result(&mut self) -> Option<&Result<ProvisionReport, ProvisionError>> {
        self.poll();
        self.finished.as_ref().map(|(_, result)| result)
    }

    /// Block until the worker finishes, returning the port along with the result.
    pub fn wait(mut self) -> Result<Outcome<P>, ProvisionError> {
        let outcome = match self.finished.take() {
            Some(outcome) => outcome,
            None => self
                .receiver
                .recv()
                .map_err(|_| ProvisionError::WorkerLost)?,
        };
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        Ok(outcome)
    }
}

/// Run [`reconcile_catalog`] on a background thread.
pub fn spawn_reconcile<P>(mut port: P, catalog: Catalog) -> ProvisionHandle<P>
where
    P: NotificationPort + Send + 'static,
{
    let (sender, receiver) = bounded(1);

    let handle = thread::spawn(move || {
        let result = reconcile_catalog(&mut port, &catalog);
        if let Err(ref e) = result {
            warn!("Background provisioning failed: {}", e);
        }
        let _ = sender.send((port, result));
    });

    ProvisionHandle {
        receiver,
        finished: None,
        thread_handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::types::{HapticSignal, Urgency};

    /// Records calls and rejects ids listed in `reject`.
    #[derive(Default)]
    struct RecordingPort {
        calls: Vec<String>,
        reject: Vec<String>,
        unsupported: bool,
    }

    impl NotificationPort for RecordingPort {
        fn create_channel_group(&mut self, group: &ChannelGroup) -> Result<(), PortError> {
            if self.unsupported {
                return Err(PortError::Unsupported);
            }
            self.calls.push(format!("group:{}", group.id));
            if self.reject.contains(&group.id) {
                return Err(PortError::Rejected("nope".to_string()));
            }
            Ok(())
        }

        fn create_channel(&mut self, definition: &ChannelDefinition) -> Result<(), PortError> {
            self.calls.push(format!("channel:{}", definition.id));
            if self.reject.contains(&definition.id) {
                return Err(PortError::Rejected("nope".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_groups_provisioned_before_channels() {
        let mut port = RecordingPort::default();
        let report = reconcile_catalog(&mut port, &Catalog::standard()).unwrap();

        let first_channel = port
            .calls
            .iter()
            .position(|c| c.starts_with("channel:"))
            .unwrap();
        assert!(port.calls[..first_channel]
            .iter()
            .all(|c| c.starts_with("group:")));
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.channels.len(), 7);
        assert!(report.is_clean());
        assert_eq!(report.catalog_version, Some(1));
        // The default port cannot list channels.
        assert!(report.stale.is_empty());
    }

    #[test]
    fn test_unsupported_yields_empty_report() {
        let mut port = RecordingPort {
            unsupported: true,
            ..Default::default()
        };
        let report = reconcile_catalog(&mut port, &Catalog::standard()).unwrap();
        assert!(!report.supported);
        assert!(report.groups.is_empty());
        assert!(report.channels.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_rejected_group_skips_its_channels() {
        let mut port = RecordingPort {
            reject: vec!["engagement".to_string()],
            ..Default::default()
        };
        let report = reconcile_catalog(&mut port, &Catalog::standard()).unwrap();

        assert_eq!(report.groups, vec!["core_features".to_string()]);
        let mut failed = report.failed_ids();
        failed.sort();
        assert_eq!(
            failed,
            vec!["app_updates", "engagement", "promotions", "social_activity"]
        );
        assert!(!port.calls.contains(&"channel:promotions".to_string()));
        assert!(report.channels.contains(&"default_channel".to_string()));
    }

    #[test]
    fn test_malformed_channel_never_reaches_os() {
        let mut port = RecordingPort::default();
        let definitions = vec![
            ChannelDefinition::new("a", "A", "", Urgency::Low),
            ChannelDefinition::new("b", "B", "", Urgency::Low)
                .haptic(HapticSignal::pattern(&[0, 0])),
            ChannelDefinition::new("c", "C", "", Urgency::Low),
        ];
        let report = reconcile(&mut port, &[], &definitions).unwrap();

        assert_eq!(report.channels, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.failed_ids(), vec!["b"]);
        assert_eq!(port.calls, vec!["channel:a", "channel:c"]);
    }

    #[test]
    fn test_dangling_reference_rejects_batch() {
        let mut port = RecordingPort::default();
        let definitions =
            vec![ChannelDefinition::new("a", "A", "", Urgency::Low).in_group("ghost")];
        let result = reconcile(&mut port, &[], &definitions);

        assert!(matches!(
            result,
            Err(ProvisionError::InvalidBatch(CatalogError::DanglingGroup { .. }))
        ));
        assert!(port.calls.is_empty());
    }

    #[test]
    fn test_background_reconcile() {
        let handle = spawn_reconcile(RecordingPort::default(), Catalog::standard());
        let (port, result) = handle.wait().unwrap();
        let report = result.unwrap();
        assert_eq!(report.channels.len(), 7);
        assert_eq!(port.calls.len(), 9);
    }

    #[test]
    fn test_background_reconcile_is_observably_pending() {
        let mut handle = spawn_reconcile(RecordingPort::default(), Catalog::standard());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while handle.is_pending() {
            assert!(std::time::Instant::now() < deadline, "provisioning never finished");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let report = handle.try_result().unwrap().as_ref().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.catalog_version, Some(crate::channels::CATALOG_VERSION));

        let (port, result) = handle.wait().unwrap();
        assert_eq!(result.unwrap().channels.len(), 7);
        assert_eq!(port.calls.len(), 9);
    }
}
