//! Screenshot and screen-recording detection.

pub mod source;
pub mod types;

pub use source::{CaptureEventSource, CaptureObservationPort, ObservationError, SubscriptionHandle};
pub use types::{CaptureEvent, CaptureKind, CaptureSignal, ClassifiedEvent};
