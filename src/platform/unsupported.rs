//! Ports for hosts that offer none of the required OS capabilities.
//!
//! Wiring these in keeps the crate usable everywhere: provisioning reports
//! "unsupported", capture detection is disabled, and the overlay stays failed.

use crate::capture::{CaptureObservationPort, CaptureSignal, ObservationError};
use crate::channels::{ChannelDefinition, ChannelGroup, NotificationPort, PortError};
use crate::overlay::{SurfaceError, SurfaceId, SurfacePort, SurfaceSpec};
use crossbeam_channel::Sender;

/// Notification manager without channel support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedNotifications;

impl NotificationPort for UnsupportedNotifications {
    fn create_channel_group(&mut self, _group: &ChannelGroup) -> Result<(), PortError> {
        Err(PortError::Unsupported)
    }

    fn create_channel(&mut self, _definition: &ChannelDefinition) -> Result<(), PortError> {
        Err(PortError::Unsupported)
    }
}

/// Capture observation that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCapture;

impl CaptureObservationPort for UnsupportedCapture {
    fn is_captured(&self) -> Result<bool, ObservationError> {
        Err(unavailable())
    }

    fn start(&mut self, _sender: Sender<CaptureSignal>) -> Result<(), ObservationError> {
        Err(unavailable())
    }

    fn stop(&mut self) {}
}

fn unavailable() -> ObservationError {
    ObservationError::Unavailable(
        "capture notifications are not available on this platform".to_string(),
    )
}

/// Window without secure surfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSurface;

impl SurfacePort for UnsupportedSurface {
    fn attach(&mut self, _spec: &SurfaceSpec) -> Result<SurfaceId, SurfaceError> {
        Err(SurfaceError::Unsupported)
    }

    fn detach(&mut self, _surface: SurfaceId) {}

    fn bring_to_front(&mut self, _surface: SurfaceId) -> Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported)
    }

    fn prevent_capture(&mut self) -> Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported)
    }
}
