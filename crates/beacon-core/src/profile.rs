//! Account profile snapshots and mutations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum bio length accepted by the profile endpoint, in characters.
pub const BIO_MAX_CHARS: usize = 190;

/// Account identity and profile as reported by Ready or a profile endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub accent_color: Option<u32>,
    #[serde(default)]
    pub pronouns: Option<String>,
}

impl AccountProfile {
    /// Display name if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

/// A partial profile update. Unset fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<String>,
}

impl ProfilePatch {
    /// Set the display name.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    /// Set the bio, truncated to [`BIO_MAX_CHARS`].
    pub fn bio(mut self, bio: impl Into<String>) -> Self {
        let bio: String = bio.into();
        self.bio = Some(bio.chars().take(BIO_MAX_CHARS).collect());
        self
    }

    /// Set the accent color (24-bit RGB).
    pub fn accent_color(mut self, color: u32) -> Self {
        self.accent_color = Some(color & 0xFF_FFFF);
        self
    }

    /// Set the pronouns.
    pub fn pronouns(mut self, pronouns: impl Into<String>) -> Self {
        self.pronouns = Some(pronouns.into());
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.global_name.is_none()
            && self.bio.is_none()
            && self.accent_color.is_none()
            && self.pronouns.is_none()
    }

    /// Re-apply the bio cap to a patch built field by field.
    pub fn capped(mut self) -> Self {
        if let Some(bio) = self.bio.take() {
            self = self.bio(bio);
        }
        self
    }
}

/// HypeSquad house, the account affiliation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypeSquadHouse {
    Bravery,
    Brilliance,
    Balance,
}

impl HypeSquadHouse {
    /// Numeric id used by the affiliation endpoint.
    pub fn id(&self) -> u8 {
        match self {
            HypeSquadHouse::Bravery => 1,
            HypeSquadHouse::Brilliance => 2,
            HypeSquadHouse::Balance => 3,
        }
    }

    /// House for an affiliation id.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(HypeSquadHouse::Bravery),
            2 => Some(HypeSquadHouse::Brilliance),
            3 => Some(HypeSquadHouse::Balance),
            _ => None,
        }
    }
}

impl fmt::Display for HypeSquadHouse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HypeSquadHouse::Bravery => "bravery",
            HypeSquadHouse::Brilliance => "brilliance",
            HypeSquadHouse::Balance => "balance",
        })
    }
}

impl FromStr for HypeSquadHouse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(house) = s.parse().ok().and_then(Self::from_id) {
            return Ok(house);
        }
        match s.as_str() {
            "bravery" => Ok(HypeSquadHouse::Bravery),
            "brilliance" => Ok(HypeSquadHouse::Brilliance),
            "balance" => Ok(HypeSquadHouse::Balance),
            other => Err(format!("unknown house: {other}")),
        }
    }
}
