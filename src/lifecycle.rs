//! Host lifecycle signals.

use serde::{Deserialize, Serialize};

/// Lifecycle transitions the host forwards to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// The process moved from background or inactive to foreground.
    ForegroundResume,
    /// The app became the active, input-receiving app.
    BecameActive,
}

impl LifecycleSignal {
    pub fn deliver_to(self, observer: &mut dyn LifecycleObserver) {
        match self {
            LifecycleSignal::ForegroundResume => observer.on_foreground_resume(),
            LifecycleSignal::BecameActive => observer.on_became_active(),
        }
    }
}

/// Something that reacts to host lifecycle transitions.
pub trait LifecycleObserver {
    fn on_foreground_resume(&mut self) {}

    fn on_became_active(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        resumes: u32,
        activations: u32,
    }

    impl LifecycleObserver for Counter {
        fn on_foreground_resume(&mut self) {
            self.resumes += 1;
        }

        fn on_became_active(&mut self) {
            self.activations += 1;
        }
    }

    #[test]
    fn test_signal_dispatch() {
        let mut counter = Counter::default();
        LifecycleSignal::ForegroundResume.deliver_to(&mut counter);
        LifecycleSignal::ForegroundResume.deliver_to(&mut counter);
        LifecycleSignal::BecameActive.deliver_to(&mut counter);
        assert_eq!(counter.resumes, 2);
        assert_eq!(counter.activations, 1);
    }
}
