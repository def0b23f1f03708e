//! In-memory stand-ins for the OS ports.
//!
//! The capture and window simulations are cheap handles over shared state:
//! clone one, give the clone to the library, and drive the other as "the OS".

use crate::capture::{CaptureObservationPort, CaptureSignal, ObservationError};
use crate::channels::{ChannelDefinition, ChannelGroup, NotificationPort, PortError};
use crate::overlay::{SurfaceError, SurfaceId, SurfacePort, SurfaceSpec};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the simulated notification manager holds for this app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationState {
    pub groups: BTreeMap<String, ChannelGroup>,
    pub channels: BTreeMap<String, ChannelDefinition>,
}

/// Simulated OS notification manager.
///
/// Mirrors the usual platform rule for re-creating an existing channel: name,
/// description and (if unset) group are updated; urgency, sound, vibration and
/// the rest stay as the user last left them.
#[derive(Debug)]
pub struct SimulatedNotificationManager {
    state: NotificationState,
    supported: bool,
    reject: HashSet<String>,
    calls: u64,
}

impl SimulatedNotificationManager {
    pub fn new() -> Self {
        Self::with_support(true)
    }

    /// A manager on an OS that predates notification channels.
    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            state: NotificationState::default(),
            supported,
            reject: HashSet::new(),
            calls: 0,
        }
    }

    /// Load previously provisioned state, or start empty if the file is absent.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let mut manager = Self::new();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            manager.state = serde_json::from_str(&content).map_err(std::io::Error::other)?;
        }
        Ok(manager)
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Make the OS refuse the group or channel with this id.
    pub fn reject(&mut self, id: impl Into<String>) {
        self.reject.insert(id.into());
    }

    /// Apply a change the user made in system settings.
    pub fn user_override(&mut self, id: &str, change: impl FnOnce(&mut ChannelDefinition)) {
        if let Some(channel) = self.state.channels.get_mut(id) {
            change(channel);
        }
    }

    /// Insert a channel as if an older build had created it.
    pub fn preexisting(&mut self, definition: ChannelDefinition) {
        self.state
            .channels
            .insert(definition.id.clone(), definition);
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn channel(&self, id: &str) -> Option<&ChannelDefinition> {
        self.state.channels.get(id)
    }

    /// Total create calls received.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn check(&mut self, id: &str) -> Result<(), PortError> {
        self.calls += 1;
        if !self.supported {
            return Err(PortError::Unsupported);
        }
        if self.reject.contains(id) {
            return Err(PortError::Rejected(format!("'{id}' refused by policy")));
        }
        Ok(())
    }
}

impl Default for SimulatedNotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPort for SimulatedNotificationManager {
    fn create_channel_group(&mut self, group: &ChannelGroup) -> Result<(), PortError> {
        self.check(&group.id)?;
        self.state.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    fn create_channel(&mut self, definition: &ChannelDefinition) -> Result<(), PortError> {
        self.check(&definition.id)?;
        if let Some(ref group_id) = definition.group_id {
            if !self.state.groups.contains_key(group_id) {
                return Err(PortError::Rejected(format!("unknown group '{group_id}'")));
            }
        }

        match self.state.channels.get_mut(&definition.id) {
            Some(existing) => {
                existing.display_name = definition.display_name.clone();
                existing.description = definition.description.clone();
                if existing.group_id.is_none() {
                    existing.group_id = definition.group_id.clone();
                }
                debug!("Updated existing channel '{}'", definition.id);
            }
            None => {
                self.state
                    .channels
                    .insert(definition.id.clone(), definition.clone());
                debug!("Created channel '{}'", definition.id);
            }
        }
        Ok(())
    }

    fn channel_ids(&self) -> Result<Vec<String>, PortError> {
        if !self.supported {
            return Err(PortError::Unsupported);
        }
        Ok(self.state.channels.keys().cloned().collect())
    }
}

#[derive(Debug)]
struct CaptureInner {
    sender: Option<Sender<CaptureSignal>>,
    captured: bool,
    available: bool,
}

/// Simulated screenshot and screen-capture notifications.
#[derive(Debug, Clone)]
pub struct SimulatedCapture {
    inner: Arc<Mutex<CaptureInner>>,
}

impl SimulatedCapture {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureInner {
                sender: None,
                captured: false,
                available: true,
            })),
        }
    }

    /// An OS without capture notifications.
    pub fn unavailable() -> Self {
        let capture = Self::new();
        lock(&capture.inner).available = false;
        capture
    }

    /// The user takes a screenshot.
    pub fn take_screenshot(&self) {
        self.emit(CaptureSignal::screenshot());
    }

    /// Set the capture level and notify, even if the level did not change.
    pub fn set_captured(&self, captured: bool) {
        lock(&self.inner).captured = captured;
        self.emit(CaptureSignal::level(captured));
    }

    pub fn is_observed(&self) -> bool {
        lock(&self.inner).sender.is_some()
    }

    fn emit(&self, signal: CaptureSignal) {
        let inner = lock(&self.inner);
        if let Some(ref sender) = inner.sender {
            if sender.send(signal).is_err() {
                debug!("Capture signal dropped; nobody is listening");
            }
        }
    }
}

impl Default for SimulatedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureObservationPort for SimulatedCapture {
    fn is_captured(&self) -> Result<bool, ObservationError> {
        let inner = lock(&self.inner);
        if !inner.available {
            return Err(ObservationError::Unavailable(
                "simulated OS has no capture API".to_string(),
            ));
        }
        Ok(inner.captured)
    }

    fn start(&mut self, sender: Sender<CaptureSignal>) -> Result<(), ObservationError> {
        let mut inner = lock(&self.inner);
        if !inner.available {
            return Err(ObservationError::Unavailable(
                "simulated OS has no capture API".to_string(),
            ));
        }
        inner.sender = Some(sender);
        Ok(())
    }

    fn stop(&mut self) {
        lock(&self.inner).sender = None;
    }
}

#[derive(Debug, Default)]
struct WindowInner {
    attached: Vec<SurfaceId>,
    attach_calls: u32,
    detach_calls: u32,
    raise_calls: u32,
    prevent_calls: u32,
    failing_attaches: u32,
    no_root: bool,
}

/// Simulated root window accepting secure surfaces.
#[derive(Debug, Clone, Default)]
pub struct SimulatedWindow {
    inner: Arc<Mutex<WindowInner>>,
}

impl SimulatedWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` attach attempts fail.
    pub fn fail_next_attaches(&self, count: u32) {
        lock(&self.inner).failing_attaches = count;
    }

    /// Remove or restore the root window.
    pub fn set_root_window(&self, present: bool) {
        lock(&self.inner).no_root = !present;
    }

    /// The OS throws away every surface, as it may while the app is backgrounded.
    pub fn discard_surfaces(&self) {
        lock(&self.inner).attached.clear();
    }

    pub fn attach_calls(&self) -> u32 {
        lock(&self.inner).attach_calls
    }

    pub fn detach_calls(&self) -> u32 {
        lock(&self.inner).detach_calls
    }

    pub fn raise_calls(&self) -> u32 {
        lock(&self.inner).raise_calls
    }

    pub fn prevent_capture_calls(&self) -> u32 {
        lock(&self.inner).prevent_calls
    }

    /// Surfaces currently on the window.
    pub fn attached_surfaces(&self) -> usize {
        lock(&self.inner).attached.len()
    }
}

impl SurfacePort for SimulatedWindow {
    fn attach(&mut self, _spec: &SurfaceSpec) -> Result<SurfaceId, SurfaceError> {
        let mut inner = lock(&self.inner);
        inner.attach_calls += 1;
        if inner.no_root {
            return Err(SurfaceError::NoRootWindow);
        }
        if inner.failing_attaches > 0 {
            inner.failing_attaches -= 1;
            return Err(SurfaceError::Rejected("window hierarchy busy".to_string()));
        }
        let surface = SurfaceId::new();
        inner.attached.push(surface);
        Ok(surface)
    }

    fn detach(&mut self, surface: SurfaceId) {
        let mut inner = lock(&self.inner);
        inner.detach_calls += 1;
        inner.attached.retain(|s| *s != surface);
    }

    fn bring_to_front(&mut self, surface: SurfaceId) -> Result<(), SurfaceError> {
        let mut inner = lock(&self.inner);
        inner.raise_calls += 1;
        if !inner.attached.contains(&surface) {
            return Err(SurfaceError::Rejected("surface is no longer attached".to_string()));
        }
        Ok(())
    }

    fn prevent_capture(&mut self) -> Result<(), SurfaceError> {
        lock(&self.inner).prevent_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{reconcile_catalog, Catalog, Urgency};

    #[test]
    fn test_existing_channel_keeps_user_settings() {
        let mut manager = SimulatedNotificationManager::new();
        reconcile_catalog(&mut manager, &Catalog::standard()).unwrap();

        manager.user_override("promotions", |c| c.urgency = Urgency::High);
        reconcile_catalog(&mut manager, &Catalog::standard()).unwrap();

        assert_eq!(manager.channel("promotions").unwrap().urgency, Urgency::High);
    }

    #[test]
    fn test_state_persists() {
        let path = std::env::temp_dir()
            .join(format!("nookly-guard-sim-{}", uuid::Uuid::new_v4()))
            .join("notifications.json");

        let mut manager = SimulatedNotificationManager::new();
        reconcile_catalog(&mut manager, &Catalog::standard()).unwrap();
        manager.save(&path).unwrap();

        let reloaded = SimulatedNotificationManager::load(&path).unwrap();
        assert_eq!(reloaded.state(), manager.state());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_window_counts_surfaces() {
        let mut window = SimulatedWindow::new();
        let handle = window.clone();

        let surface = window.attach(&SurfaceSpec::default()).unwrap();
        assert_eq!(handle.attached_surfaces(), 1);
        assert!(window.bring_to_front(surface).is_ok());

        handle.discard_surfaces();
        assert!(window.bring_to_front(surface).is_err());
    }

    #[test]
    fn test_capture_only_emits_when_observed() {
        let capture = SimulatedCapture::new();
        assert!(!capture.is_observed());
        capture.take_screenshot();
        assert!(!capture.is_observed());

        // The screenshot taken before anyone subscribed is not replayed.
        let mut source = crate::capture::CaptureEventSource::new(capture.clone());
        let _handle = source.subscribe(|_| {}).unwrap();
        assert!(capture.is_observed());
        assert_eq!(source.pump(), 0);

        capture.take_screenshot();
        assert_eq!(source.pump(), 1);
    }
}
