//! Overlay defense against content capture.

pub mod controller;

pub use controller::{
    DiagnosticSink, OverlayController, OverlayState, SurfaceError, SurfaceId, SurfacePort,
    SurfaceSpec,
};
