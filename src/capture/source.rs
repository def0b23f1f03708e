//! Normalizes OS capture signals into [`CaptureEvent`]s.
//!
//! The OS side pushes raw [`CaptureSignal`]s into a channel from whatever
//! thread it likes. Delivery to handlers only happens in [`CaptureEventSource::pump`],
//! which the host calls from its main context, so handlers always run there.

use crate::capture::types::{CaptureEvent, CaptureKind, CaptureSignal};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// The OS capture-observation API.
pub trait CaptureObservationPort {
    /// Current level of the "screen is being captured" signal.
    fn is_captured(&self) -> Result<bool, ObservationError>;

    /// Begin forwarding OS signals into `sender`.
    fn start(&mut self, sender: Sender<CaptureSignal>) -> Result<(), ObservationError>;

    /// Stop forwarding signals.
    fn stop(&mut self);
}

/// Errors from the observation port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    /// Capture signals cannot be obtained on this OS.
    Unavailable(String),
}

impl std::fmt::Display for ObservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationError::Unavailable(reason) => {
                write!(f, "Capture observation unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for ObservationError {}

/// Releases a subscription when dropped or when [`release`](Self::release) is called.
///
/// The handle stays on the context that subscribed; it is not `Send`:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<nookly_guard::SubscriptionHandle>();
/// ```
#[must_use = "dropping the handle releases the subscription"]
#[derive(Debug)]
pub struct SubscriptionHandle {
    active: Rc<Cell<bool>>,
}

impl SubscriptionHandle {
    /// Stop delivery. No handler call happens after this returns, including
    /// for signals the OS had already queued.
    pub fn release(&self) {
        if self.active.replace(false) {
            debug!("Capture subscription released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

struct Subscriber {
    active: Rc<Cell<bool>>,
    handler: Box<dyn FnMut(CaptureEvent)>,
}

/// Edge-detecting event source over a [`CaptureObservationPort`].
pub struct CaptureEventSource<P: CaptureObservationPort> {
    port: P,
    receiver: Option<Receiver<CaptureSignal>>,
    subscribers: Vec<Subscriber>,
    /// Last level seen from the "is captured" signal.
    captured: bool,
}

impl<P: CaptureObservationPort> CaptureEventSource<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            receiver: None,
            subscribers: Vec::new(),
            captured: false,
        }
    }

    /// Register `handler` for capture events.
    ///
    /// If the screen is already being captured, the handler receives one
    /// synthesized `RecordingStarted` before this returns.
    pub fn subscribe<F>(&mut self, handler: F) -> Result<SubscriptionHandle, ObservationError>
    where
        F: FnMut(CaptureEvent) + 'static,
    {
        self.prune();

        if self.receiver.is_none() {
            let (sender, receiver) = unbounded();
            self.port.start(sender)?;
            self.receiver = Some(receiver);
            self.captured = match self.port.is_captured() {
                Ok(captured) => captured,
                Err(e) => {
                    warn!("Could not query initial capture state: {}", e);
                    false
                }
            };
            debug!("Capture observation started (captured: {})", self.captured);
        }

        let mut handler: Box<dyn FnMut(CaptureEvent)> = Box::new(handler);
        if self.captured {
            handler(CaptureEvent::new(CaptureKind::RecordingStarted, Utc::now()));
        }

        let active = Rc::new(Cell::new(true));
        self.subscribers.push(Subscriber {
            active: active.clone(),
            handler,
        });
        Ok(SubscriptionHandle { active })
    }

    /// Deliver every queued signal to the live subscribers.
    ///
    /// Returns the number of events produced.
    pub fn pump(&mut self) -> usize {
        self.prune();
        if self.subscribers.is_empty() {
            self.shutdown();
            return 0;
        }

        let signals: Vec<CaptureSignal> = match self.receiver {
            Some(ref receiver) => receiver.try_iter().collect(),
            None => return 0,
        };

        let mut produced = 0;
        for signal in signals {
            let Some(event) = self.normalize(signal) else {
                continue;
            };
            produced += 1;
            for subscriber in self.subscribers.iter_mut() {
                // A handler may release any subscription, including a later one.
                if subscriber.active.get() {
                    (subscriber.handler)(event);
                }
            }
        }
        produced
    }

    /// Whether the OS port is currently being observed.
    pub fn is_observing(&self) -> bool {
        self.receiver.is_some()
    }

    /// Last known capture level.
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    fn normalize(&mut self, signal: CaptureSignal) -> Option<CaptureEvent> {
        match signal {
            CaptureSignal::Screenshot { at } => {
                Some(CaptureEvent::new(CaptureKind::ScreenshotTaken, at))
            }
            CaptureSignal::CaptureLevel { captured, at } => {
                if captured == self.captured {
                    trace!("Ignoring repeated capture level {}", captured);
                    return None;
                }
                self.captured = captured;
                let kind = if captured {
                    CaptureKind::RecordingStarted
                } else {
                    CaptureKind::RecordingStopped
                };
                Some(CaptureEvent::new(kind, at))
            }
        }
    }

    fn prune(&mut self) {
        self.subscribers
            .retain(|subscriber| subscriber.active.get());
    }

    /// Stop the port and discard anything still queued.
    fn shutdown(&mut self) {
        if self.receiver.take().is_some() {
            self.port.stop();
            self.captured = false;
            debug!("Capture observation stopped");
        }
    }
}

impl<P: CaptureObservationPort> Drop for CaptureEventSource<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Port whose sender is exposed so tests can play the OS.
    #[derive(Default)]
    struct ManualPort {
        sender: Rc<RefCell<Option<Sender<CaptureSignal>>>>,
        captured: bool,
        stopped: Rc<RefCell<bool>>,
    }

    impl CaptureObservationPort for ManualPort {
        fn is_captured(&self) -> Result<bool, ObservationError> {
            Ok(self.captured)
        }

        fn start(&mut self, sender: Sender<CaptureSignal>) -> Result<(), ObservationError> {
            *self.sender.borrow_mut() = Some(sender);
            Ok(())
        }

        fn stop(&mut self) {
            *self.stopped.borrow_mut() = true;
        }
    }

    fn collecting() -> (Rc<RefCell<Vec<CaptureKind>>>, impl FnMut(CaptureEvent)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |event: CaptureEvent| sink.borrow_mut().push(event.kind))
    }

    fn emit(port: &Rc<RefCell<Option<Sender<CaptureSignal>>>>, signal: CaptureSignal) {
        port.borrow().as_ref().unwrap().send(signal).unwrap();
    }

    #[test]
    fn test_level_signal_is_edge_detected() {
        let port = ManualPort::default();
        let os = port.sender.clone();
        let mut source = CaptureEventSource::new(port);
        let (seen, handler) = collecting();
        let _handle = source.subscribe(handler).unwrap();

        emit(&os, CaptureSignal::level(true));
        emit(&os, CaptureSignal::level(true));
        emit(&os, CaptureSignal::screenshot());
        emit(&os, CaptureSignal::level(false));
        emit(&os, CaptureSignal::level(false));

        assert_eq!(source.pump(), 3);
        assert_eq!(
            *seen.borrow(),
            vec![
                CaptureKind::RecordingStarted,
                CaptureKind::ScreenshotTaken,
                CaptureKind::RecordingStopped
            ]
        );
    }

    #[test]
    fn test_subscribe_while_captured_synthesizes_start() {
        let port = ManualPort {
            captured: true,
            ..Default::default()
        };
        let os = port.sender.clone();
        let mut source = CaptureEventSource::new(port);
        let (seen, handler) = collecting();
        let _handle = source.subscribe(handler).unwrap();

        assert_eq!(*seen.borrow(), vec![CaptureKind::RecordingStarted]);

        // The OS repeating the level it already reported is not a new start.
        emit(&os, CaptureSignal::level(true));
        source.pump();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_release_drops_queued_signals() {
        let port = ManualPort::default();
        let os = port.sender.clone();
        let stopped = port.stopped.clone();
        let mut source = CaptureEventSource::new(port);
        let (seen, handler) = collecting();
        let handle = source.subscribe(handler).unwrap();

        emit(&os, CaptureSignal::screenshot());
        handle.release();
        assert!(!handle.is_active());

        assert_eq!(source.pump(), 0);
        assert!(seen.borrow().is_empty());
        assert!(*stopped.borrow());
        assert!(!source.is_observing());
    }

    #[test]
    fn test_dropping_handle_releases() {
        let port = ManualPort::default();
        let os = port.sender.clone();
        let mut source = CaptureEventSource::new(port);
        let (seen, handler) = collecting();
        drop(source.subscribe(handler).unwrap());

        emit(&os, CaptureSignal::screenshot());
        source.pump();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_unavailable_port_fails_subscribe() {
        struct Blind;
        impl CaptureObservationPort for Blind {
            fn is_captured(&self) -> Result<bool, ObservationError> {
                Err(ObservationError::Unavailable("no api".to_string()))
            }
            fn start(&mut self, _sender: Sender<CaptureSignal>) -> Result<(), ObservationError> {
                Err(ObservationError::Unavailable("no api".to_string()))
            }
            fn stop(&mut self) {}
        }

        let mut source = CaptureEventSource::new(Blind);
        let result = source.subscribe(|_| {});
        assert!(matches!(result, Err(ObservationError::Unavailable(_))));
        assert!(!source.is_observing());
    }
}
