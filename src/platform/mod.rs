//! OS port implementations bundled with the crate.
//!
//! A mobile host supplies its own ports backed by the real notification
//! manager, capture notifications and window. The ports here cover the two
//! other cases: a simulated OS for tests and the CLI, and a platform that
//! lacks the capabilities entirely.

pub mod simulated;
pub mod unsupported;

pub use simulated::{
    NotificationState, SimulatedCapture, SimulatedNotificationManager, SimulatedWindow,
};
pub use unsupported::{UnsupportedCapture, UnsupportedNotifications, UnsupportedSurface};
