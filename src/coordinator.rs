//! Capture protection coordinator.
//!
//! Ties the capture event source and the overlay controller together and
//! forwards classified events to the host's [`EventSink`]. All state lives on
//! the host's main context: the coordinator is `!Send`, and capture events
//! are only delivered from [`CaptureProtectionCoordinator::pump`].

use crate::capture::{
    CaptureEvent, CaptureEventSource, CaptureKind, CaptureObservationPort, ClassifiedEvent,
    SubscriptionHandle,
};
use crate::lifecycle::{LifecycleObserver, LifecycleSignal};
use crate::overlay::{OverlayController, OverlayState, SurfacePort};
use crate::transparency::SharedProtectionLog;
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Receives classified capture events. What the host does with them is up to it.
pub trait EventSink {
    fn deliver(&mut self, event: ClassifiedEvent);
}

impl EventSink for Sender<ClassifiedEvent> {
    fn deliver(&mut self, event: ClassifiedEvent) {
        if self.send(event).is_err() {
            debug!("Event sink receiver dropped; discarding capture event");
        }
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: FnMut(ClassifiedEvent),
{
    fn deliver(&mut self, event: ClassifiedEvent) {
        (self.0)(event)
    }
}

/// State touched by the capture handler.
struct ProtectionState {
    recording: bool,
    sink: Box<dyn EventSink>,
    log: Option<SharedProtectionLog>,
}

impl ProtectionState {
    fn apply(&mut self, event: CaptureEvent) {
        match event.kind {
            CaptureKind::ScreenshotTaken => {}
            CaptureKind::RecordingStarted => self.recording = true,
            CaptureKind::RecordingStopped => self.recording = false,
        }

        let classified = ClassifiedEvent::from(event);
        info!("{}", classified.message());
        if let Some(ref log) = self.log {
            log.record_capture(&classified);
        }
        self.sink.deliver(classified);
    }
}

/// The capture-protection state machine.
pub struct CaptureProtectionCoordinator<P: CaptureObservationPort, S: SurfacePort> {
    source: CaptureEventSource<P>,
    overlay: OverlayController<S>,
    overlay_enabled: bool,
    state: Rc<RefCell<ProtectionState>>,
    subscription: Option<SubscriptionHandle>,
    observers: Vec<Box<dyn LifecycleObserver>>,
    started: bool,
}

impl<P: CaptureObservationPort, S: SurfacePort> CaptureProtectionCoordinator<P, S> {
    pub fn new(
        observation: P,
        overlay: OverlayController<S>,
        sink: impl EventSink + 'static,
    ) -> Self {
        Self {
            source: CaptureEventSource::new(observation),
            overlay,
            overlay_enabled: true,
            state: Rc::new(RefCell::new(ProtectionState {
                recording: false,
                sink: Box::new(sink),
                log: None,
            })),
            subscription: None,
            observers: Vec::new(),
            started: false,
        }
    }

    pub fn with_log(self, log: SharedProtectionLog) -> Self {
        self.state.borrow_mut().log = Some(log);
        self
    }

    /// Run without the overlay; detection only.
    pub fn without_overlay(mut self) -> Self {
        self.overlay_enabled = false;
        self
    }

    /// Register another observer for lifecycle signals. Observers run after
    /// the overlay, in registration order.
    pub fn add_observer(&mut self, observer: Box<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    /// Arm the overlay and subscribe to capture events. Calling it again is a no-op.
    ///
    /// Never fails: without capture observation the overlay alone protects.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        if self.overlay_enabled {
            self.overlay.install();
            self.record_overlay_outcome();
        }

        let state = self.state.clone();
        match self
            .source
            .subscribe(move |event| state.borrow_mut().apply(event))
        {
            Ok(handle) => {
                self.subscription = Some(handle);
                info!("Capture protection started");
            }
            Err(e) => warn!("Capture detection disabled, overlay only: {}", e),
        }
    }

    /// Deliver pending capture events. Call from the main context.
    pub fn pump(&mut self) -> usize {
        self.source.pump()
    }

    /// Forward a host lifecycle signal to the overlay and every observer.
    pub fn dispatch(&mut self, signal: LifecycleSignal) {
        debug!("Lifecycle signal: {:?}", signal);
        if self.overlay_enabled {
            signal.deliver_to(&mut self.overlay);
            self.record_overlay_outcome();
        }
        for observer in self.observers.iter_mut() {
            signal.deliver_to(observer.as_mut());
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state.borrow().recording
    }

    pub fn overlay_state(&self) -> OverlayState {
        self.overlay.current_state()
    }

    /// Whether capture events are being received.
    pub fn is_detecting(&self) -> bool {
        self.subscription
            .as_ref()
            .map(|handle| handle.is_active())
            .unwrap_or(false)
    }

    pub fn overlay(&self) -> &OverlayController<S> {
        &self.overlay
    }

    pub fn source(&self) -> &CaptureEventSource<P> {
        &self.source
    }

    /// Release the subscription and remove the overlay. Process teardown only.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.release();
        }
        self.source.pump();
        self.overlay.uninstall();
        self.started = false;
        info!("Capture protection stopped");
    }

    fn record_overlay_outcome(&self) {
        let state = self.state.borrow();
        let Some(ref log) = state.log else {
            return;
        };
        match self.overlay.current_state() {
            OverlayState::Armed => log.record_overlay_armed(),
            OverlayState::Failed(_) => log.record_overlay_failure(),
            OverlayState::Uninstalled | OverlayState::Installing => {}
        }
    }
}

impl<P: CaptureObservationPort, S: SurfacePort> LifecycleObserver
    for CaptureProtectionCoordinator<P, S>
{
    fn on_foreground_resume(&mut self) {
        self.dispatch(LifecycleSignal::ForegroundResume);
    }

    fn on_became_active(&mut self) {
        self.dispatch(LifecycleSignal::BecameActive);
    }
}
