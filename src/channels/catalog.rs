//! The declared notification taxonomy.
//!
//! A [`Catalog`] owns every group and channel the app provisions. It is built
//! once and never mutated; only the OS-side mirror is reconciled.

use super::types::{
    AudioContent, AudioSignal, AudioUsage, ChannelDefinition, ChannelGroup, Color, HapticSignal,
    LockScreenVisibility, SoundRef, Urgency, VisualSignal,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Version of the built-in taxonomy. Bump when a channel is added or an id is
/// replaced (for example to change its urgency).
pub const CATALOG_VERSION: u32 = 1;

pub const GROUP_CORE: &str = "core_features";
pub const GROUP_ENGAGEMENT: &str = "engagement";

/// Versioned table of channel groups and channel definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    version: u32,
    groups: Vec<ChannelGroup>,
    definitions: Vec<ChannelDefinition>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and dangling group references.
    pub fn new(
        version: u32,
        groups: Vec<ChannelGroup>,
        definitions: Vec<ChannelDefinition>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self {
            version,
            groups,
            definitions,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The taxonomy shipped with the app.
    pub fn standard() -> Self {
        let catalog = Self {
            version: CATALOG_VERSION,
            groups: standard_groups(),
            definitions: standard_definitions(),
        };
        debug_assert!(
            catalog.validate().is_ok(),
            "built-in catalog is inconsistent: {:?}",
            catalog.validate()
        );
        catalog
    }

    /// Load a catalog from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn groups(&self) -> &[ChannelGroup] {
        &self.groups
    }

    /// Channel definitions in provisioning order.
    pub fn definitions(&self) -> &[ChannelDefinition] {
        &self.definitions
    }

    pub fn definition(&self, id: &str) -> Option<&ChannelDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&ChannelGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Check structural consistency of the table.
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_batch(&self.groups, &self.definitions)
    }
}

/// Reject duplicate ids and channels pointing at groups outside the batch.
pub fn validate_batch(
    groups: &[ChannelGroup],
    definitions: &[ChannelDefinition],
) -> Result<(), CatalogError> {
    let mut group_ids = HashSet::new();
    for group in groups {
        if !group_ids.insert(group.id.as_str()) {
            return Err(CatalogError::DuplicateGroup(group.id.clone()));
        }
    }

    let mut channel_ids = HashSet::new();
    for definition in definitions {
        if !channel_ids.insert(definition.id.as_str()) {
            return Err(CatalogError::DuplicateChannel(definition.id.clone()));
        }
        if let Some(ref group_id) = definition.group_id {
            if !group_ids.contains(group_id.as_str()) {
                return Err(CatalogError::DanglingGroup {
                    channel: definition.id.clone(),
                    group: group_id.clone(),
                });
            }
        }
    }
    Ok(())
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_groups() -> Vec<ChannelGroup> {
    vec![
        ChannelGroup::new(GROUP_CORE, "Dating Features"),
        ChannelGroup::new(GROUP_ENGAGEMENT, "Engagement & Updates"),
    ]
}

fn standard_definitions() -> Vec<ChannelDefinition> {
    vec![
        ChannelDefinition::new(
            "messages",
            "Chat Messages",
            "New messages from your matches",
            Urgency::High,
        )
        .in_group(GROUP_CORE)
        .visual(VisualSignal::on(Color::PRIMARY))
        .haptic(HapticSignal::pattern(&[0, 250, 250, 250]))
        .audio(AudioSignal::Sound {
            sound: SoundRef::DefaultNotification,
            usage: AudioUsage::NotificationCommunicationInstant,
            content: AudioContent::Sonification,
        })
        .lock_screen(LockScreenVisibility::Private),
        ChannelDefinition::new(
            "matches_likes",
            "Matches & Likes",
            "New matches, likes, and super likes",
            Urgency::High,
        )
        .in_group(GROUP_CORE)
        .visual(VisualSignal::on(Color::ACCENT))
        .haptic(HapticSignal::pattern(&[0, 100, 100, 100, 100, 100]))
        .lock_screen(LockScreenVisibility::Public),
        ChannelDefinition::new(
            "social_activity",
            "Social Activity",
            "Profile views, interests, and social updates",
            Urgency::Default,
        )
        .in_group(GROUP_ENGAGEMENT)
        .visual(VisualSignal::on(Color::SUCCESS))
        .haptic(HapticSignal::pattern(&[0, 200]))
        .lock_screen(LockScreenVisibility::Private),
        ChannelDefinition::new(
            "app_updates",
            "App Updates & Tips",
            "Daily recommendations, reminders, and helpful tips",
            Urgency::Default,
        )
        .in_group(GROUP_ENGAGEMENT)
        .visual(VisualSignal::off())
        .haptic(HapticSignal::off())
        .audio(AudioSignal::Silent)
        .lock_screen(LockScreenVisibility::Public),
        ChannelDefinition::new(
            "promotions",
            "Promotions & Offers",
            "Special offers, premium features, and events",
            Urgency::Low,
        )
        .in_group(GROUP_ENGAGEMENT)
        .visual(VisualSignal::off())
        .haptic(HapticSignal::off())
        .audio(AudioSignal::Silent)
        .badge(false)
        .lock_screen(LockScreenVisibility::Public),
        ChannelDefinition::new(
            "calls",
            "Calls",
            "Incoming video and voice calls",
            Urgency::High,
        )
        .in_group(GROUP_CORE)
        .visual(VisualSignal::on(Color::PRIMARY))
        .haptic(HapticSignal::pattern(&[0, 500, 200, 500, 200, 500]))
        .audio(AudioSignal::Sound {
            sound: SoundRef::DefaultRingtone,
            usage: AudioUsage::NotificationRingtone,
            content: AudioContent::Sonification,
        })
        .lock_screen(LockScreenVisibility::Public),
        // Fallback for anything without a dedicated channel.
        ChannelDefinition::new(
            "default_channel",
            "General",
            "General app notifications",
            Urgency::Default,
        )
        .visual(VisualSignal::on(Color::PRIMARY))
        .haptic(HapticSignal::os_default()),
    ]
}

/// Structural errors in a catalog. These are programming errors in the
/// built-in table and input errors for user-supplied catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    DuplicateGroup(String),
    DuplicateChannel(String),
    DanglingGroup { channel: String, group: String },
    Parse(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::DuplicateGroup(id) => write!(f, "Duplicate channel group id '{id}'"),
            CatalogError::DuplicateChannel(id) => write!(f, "Duplicate channel id '{id}'"),
            CatalogError::DanglingGroup { channel, group } => {
                write!(f, "Channel '{channel}' references unknown group '{group}'")
            }
            CatalogError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {}
