//! Notification channel registry.
//!
//! The catalog declares the channel taxonomy; the registrar provisions it
//! through an injected [`NotificationPort`] on every cold start.

pub mod catalog;
pub mod registrar;
pub mod types;

pub use catalog::{Catalog, CatalogError, CATALOG_VERSION};
pub use registrar::{
    reconcile, reconcile_catalog, spawn_reconcile, NotificationPort, PortError, ProvisionError,
    ProvisionFailure, ProvisionHandle, ProvisionReport, Target,
};
pub use types::{
    AudioContent, AudioSignal, AudioUsage, ChannelDefinition, ChannelGroup, Color, HapticSignal,
    LockScreenVisibility, SoundRef, Urgency, VisualSignal,
};
