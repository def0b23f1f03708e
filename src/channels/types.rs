//! Value types describing notification channels and channel groups.
//!
//! These are pure declarations. Nothing here talks to the OS; the registrar
//! replays them against a [`NotificationPort`](super::registrar::NotificationPort).

use serde::{Deserialize, Serialize};
use std::fmt;

/// OS-level interruption level of a channel.
///
/// Most platforms refuse to change this after a channel has been created, so
/// raising or lowering the urgency of an existing channel requires a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Default,
    High,
}

/// How much of a notification is shown on the lock screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScreenVisibility {
    Private,
    Public,
    Secret,
}

/// A 24-bit RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

impl Color {
    /// Nookly primary blue.
    pub const PRIMARY: Color = Color(0x667eea);
    /// Nookly dark blue.
    pub const SECONDARY: Color = Color(0x234481);
    /// Hot pink used for matches and likes.
    pub const ACCENT: Color = Color(0xff1493);
    /// Green used for social activity.
    pub const SUCCESS: Color = Color(0x4caf50);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Parse a `#rrggbb` string.
    pub fn parse_hex(s: &str) -> Result<Self, String> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("color '{s}' must start with '#'"))?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("color '{s}' must be #rrggbb"));
        }
        u32::from_str_radix(hex, 16)
            .map(Color)
            .map_err(|e| format!("color '{s}': {e}"))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Notification light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualSignal {
    pub enabled: bool,
    pub color: Option<Color>,
}

impl VisualSignal {
    pub fn on(color: Color) -> Self {
        Self {
            enabled: true,
            color: Some(color),
        }
    }

    pub fn off() -> Self {
        Self {
            enabled: false,
            color: None,
        }
    }
}

/// Vibration cadence.
///
/// The pattern is an alternating off/on sequence of millisecond durations.
/// An empty pattern on an enabled signal means the OS default cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HapticSignal {
    pub enabled: bool,
    #[serde(default)]
    pub pattern: Vec<u64>,
}

impl HapticSignal {
    pub fn pattern(pattern: &[u64]) -> Self {
        Self {
            enabled: true,
            pattern: pattern.to_vec(),
        }
    }

    pub fn os_default() -> Self {
        Self {
            enabled: true,
            pattern: Vec::new(),
        }
    }

    pub fn off() -> Self {
        Self {
            enabled: false,
            pattern: Vec::new(),
        }
    }

    /// Total length of one cadence in milliseconds.
    pub fn cadence_ms(&self) -> u64 {
        self.pattern.iter().sum()
    }
}

/// Which system sound a channel plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundRef {
    DefaultNotification,
    DefaultRingtone,
    Custom(String),
}

/// Audio usage classification handed to the OS mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioUsage {
    Notification,
    NotificationCommunicationInstant,
    NotificationRingtone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioContent {
    Sonification,
    Speech,
    Music,
}

/// Sound played by a channel. `None` on the definition means OS default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AudioSignal {
    Sound {
        sound: SoundRef,
        usage: AudioUsage,
        content: AudioContent,
    },
    Silent,
}

/// A channel group. Purely organizational; no effect on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub id: String,
    pub display_name: String,
}

impl ChannelGroup {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Delivery attributes of one notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDefinition {
    pub id: String,
    pub display_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<VisualSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptic: Option<HapticSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSignal>,
    pub badge: bool,
    /// `None` leaves the OS default in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_screen: Option<LockScreenVisibility>,
}

impl ChannelDefinition {
    /// Start a definition with OS defaults for every optional attribute.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        urgency: Urgency,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
            group_id: None,
            urgency,
            visual: None,
            haptic: None,
            audio: None,
            badge: true,
            lock_screen: None,
        }
    }

    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn visual(mut self, visual: VisualSignal) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn haptic(mut self, haptic: HapticSignal) -> Self {
        self.haptic = Some(haptic);
        self
    }

    pub fn audio(mut self, audio: AudioSignal) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn badge(mut self, badge: bool) -> Self {
        self.badge = badge;
        self
    }

    pub fn lock_screen(mut self, visibility: LockScreenVisibility) -> Self {
        self.lock_screen = Some(visibility);
        self
    }

    /// Check the attributes the OS would otherwise reject or misinterpret.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_id(&self.id) {
            return Err(format!(
                "invalid channel id '{}' (expected [a-z0-9_]+)",
                self.id
            ));
        }
        if self.display_name.trim().is_empty() {
            return Err("display name is empty".to_string());
        }
        if let Some(ref haptic) = self.haptic {
            if haptic.enabled && !haptic.pattern.is_empty() && haptic.cadence_ms() == 0 {
                return Err("vibration pattern has no non-zero duration".to_string());
            }
        }
        if let Some(AudioSignal::Sound {
            sound: SoundRef::Custom(ref name),
            ..
        }) = self.audio
        {
            if name.trim().is_empty() {
                return Err("custom sound reference is empty".to_string());
            }
        }
        Ok(())
    }
}

/// Ids double as OS provisioning keys, so keep them to a portable alphabet.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_parsing() {
        assert_eq!(Color::parse_hex("#667eea"), Ok(Color::PRIMARY));
        assert_eq!(Color::parse_hex("#FF1493"), Ok(Color::ACCENT));
        assert_eq!(Color::rgb(0x4c, 0xaf, 0x50), Color::SUCCESS);
        assert!(Color::parse_hex("667eea").is_err());
        assert!(Color::parse_hex("#66e").is_err());
        assert!(Color::parse_hex("#zzzzzz").is_err());
        assert_eq!(Color::SECONDARY.to_string(), "#234481");
    }

    #[test]
    fn test_color_serializes_as_hex() {
        let json = serde_json::to_string(&Color::PRIMARY).unwrap();
        assert_eq!(json, "\"#667eea\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::PRIMARY);
        assert!(serde_json::from_str::<Color>("\"blue\"").is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_definitions() {
        let ok = ChannelDefinition::new("messages", "Chat Messages", "", Urgency::High);
        assert!(ok.validate().is_ok());

        let bad_id = ChannelDefinition::new("Chat Messages", "Chat", "", Urgency::High);
        assert!(bad_id.validate().is_err());

        let no_name = ChannelDefinition::new("chat", "  ", "", Urgency::High);
        assert!(no_name.validate().is_err());

        let silent_buzz = ChannelDefinition::new("buzz", "Buzz", "", Urgency::Default)
            .haptic(HapticSignal::pattern(&[0, 0, 0]));
        assert!(silent_buzz.validate().is_err());

        let os_buzz = ChannelDefinition::new("buzz", "Buzz", "", Urgency::Default)
            .haptic(HapticSignal::os_default());
        assert!(os_buzz.validate().is_ok());
    }

    #[test]
    fn test_haptic_cadence() {
        let calls = HapticSignal::pattern(&[0, 500, 200, 500, 200, 500]);
        assert_eq!(calls.cadence_ms(), 1900);
        assert_eq!(HapticSignal::off().cadence_ms(), 0);
    }
}
