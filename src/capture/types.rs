//! Capture event types.
//!
//! These carry only what kind of capture happened and when. Nothing about
//! what was on screen is ever observed or stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw signal from the OS observation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureSignal {
    /// One-shot: the user took a screenshot.
    Screenshot { at: DateTime<Utc> },
    /// Level: the screen is (or is not) being captured or mirrored.
    CaptureLevel { captured: bool, at: DateTime<Utc> },
}

impl CaptureSignal {
    pub fn screenshot() -> Self {
        CaptureSignal::Screenshot { at: Utc::now() }
    }

    pub fn level(captured: bool) -> Self {
        CaptureSignal::CaptureLevel {
            captured,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureKind {
    ScreenshotTaken,
    RecordingStarted,
    RecordingStopped,
}

/// A normalized capture event. Transient: consumed by the handler, then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub kind: CaptureKind,
    pub timestamp: DateTime<Utc>,
}

impl CaptureEvent {
    pub fn new(kind: CaptureKind, timestamp: DateTime<Utc>) -> Self {
        Self { kind, timestamp }
    }

    /// True while capture is in progress or has just happened.
    pub fn is_active(&self) -> bool {
        !matches!(self.kind, CaptureKind::RecordingStopped)
    }
}

/// Event handed to the host application's event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifiedEvent {
    Screenshot {
        timestamp: DateTime<Utc>,
    },
    Recording {
        active: bool,
        timestamp: DateTime<Utc>,
    },
}

impl ClassifiedEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ClassifiedEvent::Screenshot { timestamp } => *timestamp,
            ClassifiedEvent::Recording { timestamp, .. } => *timestamp,
        }
    }

    /// Short explanation suitable for a log line or a user-facing notice.
    pub fn message(&self) -> &'static str {
        match self {
            ClassifiedEvent::Screenshot { .. } => {
                "Screenshot was taken - protection may have failed"
            }
            ClassifiedEvent::Recording { active: true, .. } => {
                "Screen recording started - protection may have failed"
            }
            ClassifiedEvent::Recording { active: false, .. } => "Screen recording stopped",
        }
    }
}

impl From<CaptureEvent> for ClassifiedEvent {
    fn from(event: CaptureEvent) -> Self {
        match event.kind {
            CaptureKind::ScreenshotTaken => ClassifiedEvent::Screenshot {
                timestamp: event.timestamp,
            },
            CaptureKind::RecordingStarted | CaptureKind::RecordingStopped => {
                ClassifiedEvent::Recording {
                    active: event.is_active(),
                    timestamp: event.timestamp,
                }
            }
        }
    }
}
