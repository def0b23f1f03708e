//! Secure overlay defense.
//!
//! The controller keeps an always-on-top, non-interactive secure surface over
//! the root window. The surface cannot stop OS-level capture APIs; it only
//! blanks captured frames on platforms that honor secure surfaces. A failed
//! install degrades protection but never reaches the host as an error.

use crate::lifecycle::LifecycleObserver;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of an attached surface, assigned by the [`SurfacePort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub Uuid);

impl SurfaceId {
    pub fn new() -> Self {
        SurfaceId(Uuid::new_v4())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

/// How the secure surface should be built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    /// 0.0 is fully transparent; keep it just above zero so the OS still composites it.
    pub opacity: f32,
    pub secure: bool,
    pub interactive: bool,
    /// Also ask the window for capture prevention before attaching.
    pub prevent_capture: bool,
}

impl Default for SurfaceSpec {
    fn default() -> Self {
        Self {
            opacity: 0.01,
            secure: true,
            interactive: false,
            prevent_capture: true,
        }
    }
}

/// The OS window/surface API.
pub trait SurfacePort {
    /// Attach a covering surface to the root window and raise it to the top.
    fn attach(&mut self, spec: &SurfaceSpec) -> Result<SurfaceId, SurfaceError>;

    fn detach(&mut self, surface: SurfaceId);

    fn bring_to_front(&mut self, surface: SurfaceId) -> Result<(), SurfaceError>;

    /// Turn on window-level capture prevention where the platform has it.
    fn prevent_capture(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

/// Errors from the surface port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    NoRootWindow,
    Unsupported,
    Rejected(String),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::NoRootWindow => write!(f, "No root window to attach to"),
            SurfaceError::Unsupported => write!(f, "Secure surfaces are not supported"),
            SurfaceError::Rejected(reason) => write!(f, "Surface rejected: {reason}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Lifecycle of the overlay defense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum OverlayState {
    Uninstalled,
    Installing,
    Armed,
    Failed(String),
}

impl OverlayState {
    pub fn is_armed(&self) -> bool {
        matches!(self, OverlayState::Armed)
    }
}

/// Observer for overlay state transitions.
pub trait DiagnosticSink {
    fn on_transition(&mut self, from: &OverlayState, to: &OverlayState);
}

impl<F> DiagnosticSink for F
where
    F: FnMut(&OverlayState, &OverlayState),
{
    fn on_transition(&mut self, from: &OverlayState, to: &OverlayState) {
        self(from, to)
    }
}

/// Owns the secure surface and its [`OverlayState`].
pub struct OverlayController<S: SurfacePort> {
    port: S,
    spec: SurfaceSpec,
    state: OverlayState,
    surface: Option<SurfaceId>,
    diagnostics: Option<Box<dyn DiagnosticSink>>,
}

impl<S: SurfacePort> OverlayController<S> {
    pub fn new(port: S, spec: SurfaceSpec) -> Self {
        Self {
            port,
            spec,
            state: OverlayState::Uninstalled,
            surface: None,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Some(Box::new(sink));
        self
    }

    /// Arm the overlay. From `Armed` this only re-raises the surface.
    ///
    /// Arming is synchronous, so `Installing` here means an earlier attempt
    /// was cut short; it is retried like `Failed`.
    pub fn install(&mut self) {
        match self.state {
            OverlayState::Armed => self.refresh(),
            OverlayState::Uninstalled | OverlayState::Installing | OverlayState::Failed(_) => {
                self.arm()
            }
        }
    }

    /// Re-arm the overlay. From `Armed` the surface is detached and attached
    /// again so it sits above anything added to the window since.
    pub fn reinstall(&mut self) {
        match self.state {
            OverlayState::Armed => {
                if let Some(surface) = self.surface.take() {
                    self.detach(surface);
                }
                self.arm();
            }
            OverlayState::Uninstalled | OverlayState::Installing | OverlayState::Failed(_) => {
                self.arm()
            }
        }
    }

    /// Remove the surface. Only used at teardown.
    pub fn uninstall(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.detach(surface);
        }
        if self.state != OverlayState::Uninstalled {
            self.transition(OverlayState::Uninstalled);
        }
    }

    pub fn current_state(&self) -> OverlayState {
        self.state.clone()
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    fn arm(&mut self) {
        self.transition(OverlayState::Installing);

        if self.spec.prevent_capture {
            if let Err(e) = self.guarded(|port| port.prevent_capture()) {
                debug!("Window-level capture prevention unavailable: {}", e);
            }
        }

        if let Some(stale) = self.surface.take() {
            self.detach(stale);
        }

        let spec = self.spec;
        match self.guarded(|port| port.attach(&spec)) {
            Ok(surface) => {
                self.surface = Some(surface);
                self.transition(OverlayState::Armed);
                info!("Secure overlay armed");
            }
            Err(e) => {
                warn!("Secure overlay could not be installed: {}", e);
                self.transition(OverlayState::Failed(e.to_string()));
            }
        }
    }

    fn refresh(&mut self) {
        let Some(surface) = self.surface else {
            self.arm();
            return;
        };
        if let Err(e) = self.guarded(|port| port.bring_to_front(surface)) {
            warn!("Could not raise secure overlay, re-attaching: {}", e);
            self.surface = None;
            self.detach(surface);
            self.arm();
        }
    }

    fn detach(&mut self, surface: SurfaceId) {
        let detached = self.guarded(|port| {
            port.detach(surface);
            Ok(())
        });
        if let Err(e) = detached {
            warn!("Could not detach secure overlay: {}", e);
        }
    }

    /// Run a port call, turning a panic into [`SurfaceError::Rejected`].
    fn guarded<T>(
        &mut self,
        call: impl FnOnce(&mut S) -> Result<T, SurfaceError>,
    ) -> Result<T, SurfaceError> {
        let port = &mut self.port;
        catch_unwind(AssertUnwindSafe(|| call(port)))
            .unwrap_or_else(|_| Err(SurfaceError::Rejected("surface port panicked".to_string())))
    }

    fn transition(&mut self, next: OverlayState) {
        let previous = std::mem::replace(&mut self.state, next);
        debug!("Overlay {:?} -> {:?}", previous, self.state);
        if let Some(ref mut sink) = self.diagnostics {
            sink.on_transition(&previous, &self.state);
        }
    }
}

impl<S: SurfacePort> LifecycleObserver for OverlayController<S> {
    fn on_foreground_resume(&mut self) {
        self.reinstall();
    }

    fn on_became_active(&mut self) {
        self.install();
    }
}
