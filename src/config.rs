use crate::core::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_COMMAND_PREFIX: &str = "!";
/// One minute of maximum data loss.
pub const DEFAULT_MAINTAIN_EVERY_SECS: u64 = 60;
/// Red.
pub const DEFAULT_NO_MESSAGE_COLOR: u32 = 0xE74C3C;
/// Blue.
pub const DEFAULT_WITH_MESSAGE_COLOR: u32 = 0x3498DB;
pub const DEFAULT_EMBED_TITLE: &str = "Last message from {name}";
pub const DEFAULT_DELETED_MESSAGE_RESPONSE: &str = "{name}'s last message was deleted.";
pub const DEFAULT_NO_MESSAGE_RESPONSE: &str = "No message has been seen that was sent by {name}.";
pub const DEFAULT_MENTION_RESPONSE: &str = "Hello, {name}!";

const MAX_COLOR: u32 = 0xFFFFFF;

/// Keys of [`CacheConfig`], as they appear in a flat pre-namespace file.
pub(crate) const CONFIG_KEYS: &[&str] = &[
    "command_prefix",
    "maintain_every",
    "no_message_color",
    "with_message_color",
    "embed_title",
    "deleted_message_response",
    "no_message_response",
    "mention_response",
];

/// Flat files named their own path; the path is now passed to `Tracker::open`.
pub(crate) const RETIRED_FILE_NAME_KEY: &str = "cache_file_name";

/// Service configuration, stored in the `config` namespace of the sink file.
///
/// Missing keys fall back to their own default; unknown keys are rejected.
/// Template strings are carried for the presentation layer and are not
/// interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Prefix for text commands
    pub command_prefix: String,

    /// Seconds between maintenance cycles; bounds data loss on a crash
    pub maintain_every: u64,

    /// Embed color when no live message is available (0xRRGGBB)
    pub no_message_color: u32,

    /// Embed color when a live message was found (0xRRGGBB)
    pub with_message_color: u32,

    /// Embed title template
    pub embed_title: String,

    /// Body used when the recorded message was deleted
    pub deleted_message_response: String,

    /// Body used when no message was ever seen
    pub no_message_response: String,

    /// Reply when the service is mentioned
    pub mention_response: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            maintain_every: DEFAULT_MAINTAIN_EVERY_SECS,
            no_message_color: DEFAULT_NO_MESSAGE_COLOR,
            with_message_color: DEFAULT_WITH_MESSAGE_COLOR,
            embed_title: DEFAULT_EMBED_TITLE.to_string(),
            deleted_message_response: DEFAULT_DELETED_MESSAGE_RESPONSE.to_string(),
            no_message_response: DEFAULT_NO_MESSAGE_RESPONSE.to_string(),
            mention_response: DEFAULT_MENTION_RESPONSE.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate the `config` namespace.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the maintenance interval in seconds
    pub fn maintain_every(mut self, secs: u64) -> Self {
        self.maintain_every = secs;
        self
    }

    /// Set the command prefix
    pub fn command_prefix(mut self, prefix: &str) -> Self {
        self.command_prefix = prefix.to_string();
        self
    }

    /// Set both embed colors
    pub fn colors(mut self, no_message: u32, with_message: u32) -> Self {
        self.no_message_color = no_message;
        self.with_message_color = with_message;
        self
    }

    pub fn maintain_interval(&self) -> Duration {
        Duration::from_secs(self.maintain_every)
    }

    pub fn validate(&self) -> Result<()> {
        if self.maintain_every == 0 {
            return Err(CacheError::InvalidConfig(
                "maintain_every must be at least 1 second".to_string(),
            ));
        }

        for (key, color) in [
            ("no_message_color", self.no_message_color),
            ("with_message_color", self.with_message_color),
        ] {
            if color > MAX_COLOR {
                return Err(CacheError::InvalidConfig(format!(
                    "{} {:#X} is not a 24-bit RGB color",
                    key, color
                )));
            }
        }

        for (key, text) in [
            ("command_prefix", &self.command_prefix),
            ("embed_title", &self.embed_title),
            ("deleted_message_response", &self.deleted_message_response),
            ("no_message_response", &self.no_message_response),
            ("mention_response", &self.mention_response),
        ] {
            if text.trim().is_empty() {
                return Err(CacheError::InvalidConfig(format!("{} must not be empty", key)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.maintain_interval(), Duration::from_secs(60));
        assert_eq!(config.no_message_color, 0xE74C3C);
        assert_eq!(config.with_message_color, 0x3498DB);
    }

    #[test]
    fn test_missing_keys_use_their_own_defaults() {
        let config = CacheConfig::from_value(json!({ "command_prefix": "?" })).unwrap();
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.maintain_every, DEFAULT_MAINTAIN_EVERY_SECS);
        assert_eq!(config.embed_title, DEFAULT_EMBED_TITLE);
        assert_eq!(config.mention_response, DEFAULT_MENTION_RESPONSE);
    }

    #[test]
    fn test_config_keys_cover_every_field() {
        let value = serde_json::to_value(CacheConfig::default()).unwrap();
        let mut fields: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        let mut keys: Vec<_> = CONFIG_KEYS.iter().map(|key| key.to_string()).collect();
        fields.sort();
        keys.sort();
        assert_eq!(fields, keys);
        assert!(!CONFIG_KEYS.contains(&RETIRED_FILE_NAME_KEY));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = CacheConfig::from_value(json!({ "maintain_evry": 30 })).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_value_rejected() {
        let err = CacheConfig::from_value(json!({ "maintain_every": "soon" })).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = CacheConfig::new().maintain_every(0).validate().unwrap_err();
        assert!(err.to_string().contains("maintain_every"));
    }

    #[test]
    fn test_color_out_of_range_rejected() {
        let config = CacheConfig::new().colors(0x1000000, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_template_rejected() {
        let mut config = CacheConfig::new();
        config.no_message_response = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
