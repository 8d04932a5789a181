use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MENTION_PREFIX: &str = "<@";
const MENTION_NICKNAME_MARKER: char = '!';
const MENTION_SUFFIX: char = '>';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates identity parsing failures.
pub enum IdentityParseError {
    #[error("identity cannot be empty")]
    Empty,
    #[error("invalid mention '{0}': expected <@id> or <@!id>")]
    InvalidMention(String),
    #[error("invalid snowflake '{0}': expected a positive decimal id")]
    InvalidSnowflake(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Opaque identity of a chat-platform user or bot.
pub struct Identity(String);

impl Identity {
    /// Builds an identity from a raw id, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentityParseError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityParseError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Parses a user reference in mention form (`<@id>`, `<@!id>`) or as a bare snowflake.
    pub fn parse_mention(raw: &str) -> Result<Self, IdentityParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentityParseError::Empty);
        }
        if raw.chars().all(|ch| ch.is_ascii_digit()) {
            parse_snowflake(raw)?;
            return Ok(Self(raw.to_string()));
        }

        let inner = raw
            .strip_prefix(MENTION_PREFIX)
            .and_then(|rest| rest.strip_suffix(MENTION_SUFFIX))
            .ok_or_else(|| IdentityParseError::InvalidMention(raw.to_string()))?;
        let inner = inner
            .strip_prefix(MENTION_NICKNAME_MARKER)
            .unwrap_or(inner);
        if !inner.chars().all(|ch| ch.is_ascii_digit()) || parse_snowflake(inner).is_err() {
            return Err(IdentityParseError::InvalidMention(raw.to_string()));
        }
        Ok(Self(inner.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Renders the identity as a user mention.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Identity {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Opaque channel identifier assigned by the provisioning service.
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentityParseError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityParseError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Renders the channel as a clickable channel mention.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ChannelId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Parses a non-zero decimal snowflake id.
pub fn parse_snowflake(raw: &str) -> Result<u64, IdentityParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IdentityParseError::Empty);
    }
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(IdentityParseError::InvalidSnowflake(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_snowflake, ChannelId, Identity, IdentityParseError};

    #[test]
    fn unit_identity_new_trims_and_rejects_empty() {
        let identity = Identity::new("  alice ").expect("identity");
        assert_eq!(identity.as_str(), "alice");
        assert_eq!(Identity::new("   "), Err(IdentityParseError::Empty));
    }

    #[test]
    fn unit_parse_mention_accepts_plain_and_nickname_forms() {
        assert_eq!(
            Identity::parse_mention("<@1234>").expect("plain").as_str(),
            "1234"
        );
        assert_eq!(
            Identity::parse_mention("<@!1234>").expect("nickname").as_str(),
            "1234"
        );
        assert_eq!(
            Identity::parse_mention("1234").expect("bare").as_str(),
            "1234"
        );
    }

    #[test]
    fn regression_parse_mention_rejects_role_and_channel_mentions() {
        let error = Identity::parse_mention("<@&99>").expect_err("role mention");
        assert!(error.to_string().contains("invalid mention"));
        let error = Identity::parse_mention("<#99>").expect_err("channel mention");
        assert!(matches!(error, IdentityParseError::InvalidMention(_)));
        let error = Identity::parse_mention("dave").expect_err("plain name");
        assert!(matches!(error, IdentityParseError::InvalidMention(_)));
        assert!(Identity::parse_mention("<@+99>").is_err());
        assert!(Identity::parse_mention("<@ 99>").is_err());
    }

    #[test]
    fn functional_mentions_render_platform_markup() {
        assert_eq!(Identity::from(7_u64).mention(), "<@7>");
        assert_eq!(ChannelId::from(8_u64).mention(), "<#8>");
    }

    #[test]
    fn unit_parse_snowflake_rejects_zero_and_garbage() {
        assert_eq!(parse_snowflake("42"), Ok(42));
        assert!(parse_snowflake("0").is_err());
        assert!(parse_snowflake("abc").is_err());
        assert_eq!(parse_snowflake(""), Err(IdentityParseError::Empty));
    }
}
