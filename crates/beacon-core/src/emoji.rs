//! Emoji references for custom status entries.
//!
//! Accepted shorthand forms:
//! - `name:id` - a custom emoji
//! - `<:name:id>` / `<a:name:id>` - the chat mention form, optionally animated
//! - anything else - a bare (usually unicode) emoji name

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A structured emoji reference as the gateway expects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmojiRef {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    animated: bool,
}

impl EmojiRef {
    /// A bare emoji with no snowflake id.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            animated: false,
        }
    }

    /// A custom emoji with an id.
    pub fn custom(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Some(id.into()),
            animated: false,
        }
    }

    /// Parse shorthand, treating anything unparseable as a bare name.
    pub fn from_shorthand(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| Self::bare(s.trim()))
    }

    /// Emoji name, or the unicode emoji itself.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snowflake id for custom emoji.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether a custom emoji is animated.
    pub fn is_animated(&self) -> bool {
        self.animated
    }
}

impl fmt::Display for EmojiRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) if self.animated => write!(f, "<a:{}:{}>", self.name, id),
            Some(id) => write!(f, "{}:{}", self.name, id),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for EmojiRef {
    type Err = EmojiParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmojiParseError::Empty);
        }

        let (body, mention) = match s.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
            Some(inner) => (inner, true),
            None => (s, false),
        };
        let (animated, body) = match body.strip_prefix("a:") {
            Some(rest) if mention => (true, rest),
            _ => (false, body.strip_prefix(':').filter(|_| mention).unwrap_or(body)),
        };

        let Some((name, id)) = body.split_once(':') else {
            if mention {
                return Err(EmojiParseError::MissingId(s.to_string()));
            }
            return Ok(Self::bare(body));
        };

        if name.is_empty() {
            return Err(EmojiParseError::EmptyName);
        }
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EmojiParseError::InvalidId(id.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            id: Some(id.to_string()),
            animated,
        })
    }
}

/// Error parsing emoji shorthand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmojiParseError {
    #[error("emoji shorthand is empty")]
    Empty,
    #[error("emoji name cannot be empty")]
    EmptyName,
    #[error("emoji id must be numeric, got: {0}")]
    InvalidId(String),
    #[error("emoji mention is missing an id: {0}")]
    MissingId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_custom() {
        let e: EmojiRef = "blobwave:123456789".parse().unwrap();
        assert_eq!(e.name(), "blobwave");
        assert_eq!(e.id(), Some("123456789"));
        assert!(!e.is_animated());
    }

    #[test]
    fn parse_bare_unicode() {
        let e: EmojiRef = "🔥".parse().unwrap();
        assert_eq!(e.name(), "🔥");
        assert_eq!(e.id(), None);
    }

    #[test]
    fn parse_mention_forms() {
        let e: EmojiRef = "<a:party:42>".parse().unwrap();
        assert_eq!(e.name(), "party");
        assert_eq!(e.id(), Some("42"));
        assert!(e.is_animated());

        let e: EmojiRef = "<:party:42>".parse().unwrap();
        assert!(!e.is_animated());
        assert_eq!(e.id(), Some("42"));
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert_eq!(
            "wave:abc".parse::<EmojiRef>(),
            Err(EmojiParseError::InvalidId("abc".into()))
        );
        assert_eq!(EmojiRef::from_shorthand("wave:abc"), EmojiRef::bare("wave:abc"));
    }

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_value(EmojiRef::bare("🔥")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "🔥" }));

        let json = serde_json::to_value(EmojiRef::custom("wave", "7")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "wave", "id": "7" }));
    }
}
