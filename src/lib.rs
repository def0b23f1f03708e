//! Nookly Guard - capture protection and notification channel provisioning.
//!
//! This library holds the platform-integration layer of a dating app: it
//! detects screenshots and screen recordings, keeps a secure overlay over the
//! app window, and provisions the app's notification channels on cold start.
//!
//! # Protection Guarantees
//!
//! - **Best effort**: The overlay blanks captured frames where the OS honors
//!   secure surfaces. It cannot block OS-level capture APIs.
//! - **Never fatal**: Missing capabilities degrade protection; nothing here
//!   panics or terminates the host.
//! - **Counts only**: The protection ledger records how many captures were
//!   seen, never what was on screen.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Nookly Guard                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Capture   │──▶│ Coordinator │──▶│ Event sink  │       │
//! │  │   source    │   │             │   │   (host)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲             │       │                             │
//! │         │             ▼       ▼                             │
//! │  ┌─────────────┐ ┌─────────┐ ┌─────────────┐               │
//! │  │  Lifecycle  │ │ Overlay │ │ Protection  │               │
//! │  │   signals   │ │ control │ │   ledger    │               │
//! │  └─────────────┘ └─────────┘ └─────────────┘               │
//! │                                                             │
//! │  ┌─────────────┐   ┌─────────────┐                         │
//! │  │   Catalog   │──▶│  Registrar  │──▶ NotificationPort     │
//! │  └─────────────┘   └─────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use nookly_guard::{
//!     channels, CaptureProtectionCoordinator, ClassifiedEvent, LifecycleSignal, OverlayController,
//!     SurfaceSpec,
//! };
//! use nookly_guard::platform::{SimulatedCapture, SimulatedNotificationManager, SimulatedWindow};
//!
//! // Cold start: provision notification channels
//! let mut notifications = SimulatedNotificationManager::new();
//! let report = channels::reconcile_catalog(&mut notifications, &channels::Catalog::standard())
//!     .expect("standard catalog is valid");
//! assert!(report.is_clean());
//!
//! // Start capture protection
//! let (sender, events) = crossbeam_channel::unbounded::<ClassifiedEvent>();
//! let overlay = OverlayController::new(SimulatedWindow::new(), SurfaceSpec::default());
//! let capture = SimulatedCapture::new();
//! let mut coordinator = CaptureProtectionCoordinator::new(capture, overlay, sender);
//! coordinator.start();
//!
//! // Forward host lifecycle transitions and deliver capture events on the main context
//! coordinator.dispatch(LifecycleSignal::ForegroundResume);
//! coordinator.pump();
//! for event in events.try_iter() {
//!     println!("{}", event.message());
//! }
//! ```

pub mod capture;
pub mod channels;
pub mod config;
pub mod coordinator;
pub mod lifecycle;
pub mod overlay;
pub mod platform;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use capture::{
    CaptureEvent, CaptureEventSource, CaptureKind, CaptureObservationPort, ClassifiedEvent,
    ObservationError, SubscriptionHandle,
};
pub use channels::{
    reconcile, Catalog, ChannelDefinition, ChannelGroup, NotificationPort, PortError,
    ProvisionError, ProvisionReport,
};
pub use config::{Config, ConfigError, OverlayConfig};
pub use coordinator::{CaptureProtectionCoordinator, EventSink, FnSink};
pub use lifecycle::{LifecycleObserver, LifecycleSignal};
pub use overlay::{OverlayController, OverlayState, SurfaceError, SurfacePort, SurfaceSpec};
pub use transparency::{ProtectionLog, ProtectionStats, SharedProtectionLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protection declaration that can be displayed to users.
pub const PROTECTION_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              NOOKLY GUARD - PROTECTION DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This layer protects conversations and profiles from capture.    ║
║                                                                  ║
║  ✓ WHAT WE DO:                                                   ║
║    • Notice when a screenshot is taken                           ║
║    • Notice when screen recording starts and stops               ║
║    • Keep a secure overlay that blanks captured frames           ║
║                                                                  ║
║  ✗ WHAT WE NEVER DO:                                             ║
║    • Read or store what was on screen                            ║
║    • Upload capture events anywhere                              ║
║    • Block the OS from taking the capture                        ║
║                                                                  ║
║  The overlay is best effort. Some platforms ignore secure        ║
║  surfaces; detection still works there.                          ║
║                                                                  ║
║  You can view protection statistics anytime with:                ║
║    nookly-guard status                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_declaration_contents() {
        assert!(PROTECTION_DECLARATION.contains("PROTECTION"));
        assert!(PROTECTION_DECLARATION.contains("NEVER DO"));
        assert!(PROTECTION_DECLARATION.contains("best effort"));
    }
}
