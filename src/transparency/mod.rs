//! Transparency about what the protection layer has seen and done.
//!
//! Counts are exposed to the user through `nookly-guard status`.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, ProtectionLog, ProtectionStats,
    SharedProtectionLog,
};
