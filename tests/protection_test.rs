//! Integration tests for capture detection and the secure overlay

use crossbeam_channel::{unbounded, Receiver};
use nookly_guard::capture::{CaptureEvent, CaptureEventSource, CaptureKind};
use nookly_guard::platform::{SimulatedCapture, SimulatedWindow, UnsupportedCapture};
use nookly_guard::transparency::create_shared_log;
use nookly_guard::{
    CaptureProtectionCoordinator, ClassifiedEvent, LifecycleSignal, OverlayController,
    OverlayState, SurfaceSpec,
};
use std::cell::RefCell;
use std::rc::Rc;

fn protected(
    capture: &SimulatedCapture,
    window: &SimulatedWindow,
) -> (
    CaptureProtectionCoordinator<SimulatedCapture, SimulatedWindow>,
    Receiver<ClassifiedEvent>,
) {
    let (sender, events) = unbounded();
    let overlay = OverlayController::new(window.clone(), SurfaceSpec::default());
    let coordinator = CaptureProtectionCoordinator::new(capture.clone(), overlay, sender);
    (coordinator, events)
}

#[test]
fn test_screenshot_and_recording_sequence() {
    let capture = SimulatedCapture::new();
    let window = SimulatedWindow::new();
    let (mut coordinator, events) = protected(&capture, &window);
    coordinator.start();

    capture.take_screenshot();
    capture.set_captured(true);
    capture.set_captured(false);
    coordinator.pump();

    let received: Vec<ClassifiedEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 3);
    assert!(matches!(received[0], ClassifiedEvent::Screenshot { .. }));
    assert!(matches!(
        received[1],
        ClassifiedEvent::Recording { active: true, .. }
    ));
    assert!(matches!(
        received[2],
        ClassifiedEvent::Recording { active: false, .. }
    ));
    assert!(!coordinator.is_recording());
}

#[test]
fn test_repeated_capture_level_is_deduplicated() {
    let capture = SimulatedCapture::new();
    let (mut coordinator, events) = protected(&capture, &SimulatedWindow::new());
    coordinator.start();

    capture.set_captured(true);
    capture.set_captured(true);
    coordinator.pump();

    assert_eq!(events.try_iter().count(), 1);
    assert!(coordinator.is_recording());
}

#[test]
fn test_already_recording_at_start() {
    let capture = SimulatedCapture::new();
    capture.set_captured(true);
    let (mut coordinator, events) = protected(&capture, &SimulatedWindow::new());
    coordinator.start();

    let received: Vec<ClassifiedEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert!(matches!(
        received[0],
        ClassifiedEvent::Recording { active: true, .. }
    ));
    assert!(coordinator.is_recording());
}

#[test]
fn test_reinstall_after_failure_never_panics() {
    let capture = SimulatedCapture::new();
    let window = SimulatedWindow::new();
    window.set_root_window(false);
    let (mut coordinator, _events) = protected(&capture, &window);

    coordinator.start();
    assert!(matches!(coordinator.overlay_state(), OverlayState::Failed(_)));
    assert!(coordinator.is_detecting());

    // Still no root window: the retry goes Installing -> Failed.
    coordinator.dispatch(LifecycleSignal::ForegroundResume);
    assert!(matches!(coordinator.overlay_state(), OverlayState::Failed(_)));

    window.set_root_window(true);
    coordinator.dispatch(LifecycleSignal::ForegroundResume);
    assert_eq!(coordinator.overlay_state(), OverlayState::Armed);
    assert_eq!(window.attached_surfaces(), 1);
}

#[test]
fn test_resume_while_armed_keeps_one_surface() {
    let capture = SimulatedCapture::new();
    let window = SimulatedWindow::new();
    let (mut coordinator, _events) = protected(&capture, &window);
    coordinator.start();
    let attaches = window.attach_calls();

    for resumes in 1..=3 {
        coordinator.dispatch(LifecycleSignal::ForegroundResume);
        assert_eq!(coordinator.overlay_state(), OverlayState::Armed);
        assert_eq!(window.attached_surfaces(), 1);
        assert_eq!(window.attach_calls(), attaches + resumes);
    }
}

#[test]
fn test_became_active_rearms_discarded_surface() {
    let capture = SimulatedCapture::new();
    let window = SimulatedWindow::new();
    let (mut coordinator, _events) = protected(&capture, &window);
    coordinator.start();

    window.discard_surfaces();
    coordinator.dispatch(LifecycleSignal::BecameActive);

    assert_eq!(coordinator.overlay_state(), OverlayState::Armed);
    assert_eq!(window.attached_surfaces(), 1);
}

#[test]
fn test_overlay_failure_does_not_affect_detection() {
    let capture = SimulatedCapture::new();
    let window = SimulatedWindow::new();
    window.fail_next_attaches(1);
    let (mut coordinator, events) = protected(&capture, &window);
    coordinator.start();

    capture.take_screenshot();
    coordinator.pump();

    assert!(matches!(coordinator.overlay_state(), OverlayState::Failed(_)));
    assert_eq!(events.try_iter().count(), 1);
}

#[test]
fn test_detection_unavailable_runs_overlay_only() {
    let window = SimulatedWindow::new();
    let (sender, events) = unbounded::<ClassifiedEvent>();
    let overlay = OverlayController::new(window.clone(), SurfaceSpec::default());
    let mut coordinator = CaptureProtectionCoordinator::new(UnsupportedCapture, overlay, sender);

    coordinator.start();
    coordinator.pump();

    assert!(!coordinator.is_detecting());
    assert_eq!(coordinator.overlay_state(), OverlayState::Armed);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_release_drops_in_flight_signals() {
    let capture = SimulatedCapture::new();
    let mut source = CaptureEventSource::new(capture.clone());
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();

    let handle = source
        .subscribe(move |_| *counter.borrow_mut() += 1)
        .unwrap();
    capture.take_screenshot();
    handle.release();
    source.pump();

    assert_eq!(*calls.borrow(), 0);
    assert!(!source.is_observing());
    assert!(!capture.is_observed());
}

#[test]
fn test_release_during_delivery_stops_later_subscriber() {
    let capture = SimulatedCapture::new();
    let mut source = CaptureEventSource::new(capture.clone());
    let seen: Rc<RefCell<Vec<CaptureEvent>>> = Rc::new(RefCell::new(Vec::new()));

    let second_slot: Rc<RefCell<Option<nookly_guard::SubscriptionHandle>>> =
        Rc::new(RefCell::new(None));
    let releaser = second_slot.clone();
    let first = source
        .subscribe(move |_| {
            if let Some(handle) = releaser.borrow().as_ref() {
                handle.release();
            }
        })
        .unwrap();

    let sink = seen.clone();
    let second = source
        .subscribe(move |event| sink.borrow_mut().push(event))
        .unwrap();
    *second_slot.borrow_mut() = Some(second);

    capture.take_screenshot();
    source.pump();

    assert!(seen.borrow().is_empty());
    assert!(first.is_active());
}

#[test]
fn test_ledger_counts_protection_activity() {
    let capture = SimulatedCapture::new();
    let window = SimulatedWindow::new();
    let log = create_shared_log();
    let (coordinator, _events) = protected(&capture, &window);
    let mut coordinator = coordinator.with_log(log.clone());
    coordinator.start();

    capture.take_screenshot();
    capture.set_captured(true);
    capture.set_captured(false);
    coordinator.pump();
    coordinator.dispatch(LifecycleSignal::ForegroundResume);

    let stats = log.stats();
    assert_eq!(stats.screenshots_detected, 1);
    assert_eq!(stats.recordings_started, 1);
    assert_eq!(stats.recordings_stopped, 1);
    assert_eq!(stats.overlay_armed, 2);
    assert_eq!(stats.overlay_failures, 0);
}

#[test]
fn test_capture_event_kinds() {
    let capture = SimulatedCapture::new();
    let mut source = CaptureEventSource::new(capture.clone());
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = kinds.clone();
    let _handle = source
        .subscribe(move |event: CaptureEvent| sink.borrow_mut().push(event.kind))
        .unwrap();

    capture.set_captured(false);
    capture.set_captured(true);
    capture.take_screenshot();
    source.pump();

    assert_eq!(
        *kinds.borrow(),
        vec![CaptureKind::RecordingStarted, CaptureKind::ScreenshotTaken]
    );
}
