//! Presence payload builder.
//!
//! Pure functions from a [`SessionConfig`] to the presence structure carried
//! by Identify and Presence-Update frames. Nothing here mutates configuration.

use crate::emoji::EmojiRef;
use crate::session::{PresenceStatus, RotationConfig, SessionConfig, SessionKind, StaticPresence};
use serde::{Deserialize, Serialize};

/// Name the gateway expects on custom status activities.
pub const CUSTOM_STATUS_NAME: &str = "Custom Status";

/// Text used when a rotating session has nothing to rotate through.
pub const ROTATION_FALLBACK_TEXT: &str = "Active";

const CUSTOM_STATUS_TYPE: u8 = 4;

/// One activity entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<EmojiRef>,
}

impl Activity {
    /// A custom status entry. Empty text is omitted.
    pub fn custom_status(text: impl Into<String>, emoji: Option<EmojiRef>) -> Self {
        let text = text.into();
        Self {
            kind: CUSTOM_STATUS_TYPE,
            name: CUSTOM_STATUS_NAME.to_string(),
            state: (!text.is_empty()).then_some(text),
            details: None,
            application_id: None,
            emoji,
        }
    }

    /// Whether this is a custom status entry.
    pub fn is_custom_status(&self) -> bool {
        self.kind == CUSTOM_STATUS_TYPE
    }
}

/// The presence structure (`d` of op 3, `presence` of Identify).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub since: u64,
    pub activities: Vec<Activity>,
    pub status: PresenceStatus,
    pub afk: bool,
}

impl Presence {
    /// Presence that is not AFK and has no idle timestamp.
    pub fn new(status: PresenceStatus, activities: Vec<Activity>) -> Self {
        Self {
            since: 0,
            activities,
            status,
            afk: false,
        }
    }

    /// Presence for `config` with the rotation cursor at `cursor`.
    ///
    /// The cursor is ignored for static sessions.
    pub fn for_session(config: &SessionConfig, cursor: usize) -> Self {
        let activities = match &config.kind {
            SessionKind::Static(s) => static_activities(s),
            SessionKind::Rotating(r) => vec![rotating_activity(r, cursor)],
        };
        Self::new(config.status, activities)
    }
}

fn static_activities(config: &StaticPresence) -> Vec<Activity> {
    let mut activities = Vec::with_capacity(2);

    let emoji = config.emoji_ref();
    if !config.status_text.is_empty() || emoji.is_some() {
        activities.push(Activity::custom_status(config.status_text.clone(), emoji));
    }

    if config.rich_presence {
        if let Some(rich) = config.activity.as_ref().filter(|a| !a.name.is_empty()) {
            activities.push(Activity {
                kind: rich.kind,
                name: rich.name.clone(),
                state: rich.state.clone(),
                details: rich.details.clone(),
                application_id: rich.application_id.clone(),
                emoji: None,
            });
        }
    }

    activities
}

fn rotating_activity(config: &RotationConfig, cursor: usize) -> Activity {
    let text = match config.statuses.len() {
        0 => ROTATION_FALLBACK_TEXT,
        len => config.statuses[cursor % len].as_str(),
    };
    Activity::custom_status(text, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{RichActivity, Token};

    fn static_config(presence: StaticPresence) -> SessionConfig {
        SessionConfig::new("main", Token::new("t"), SessionKind::Static(presence))
            .with_status(PresenceStatus::Idle)
    }

    fn rotating_config(statuses: &[&str]) -> SessionConfig {
        SessionConfig::new(
            "alt",
            Token::new("t"),
            SessionKind::Rotating(RotationConfig::new(
                statuses.iter().map(|s| s.to_string()).collect(),
                60,
            )),
        )
    }

    #[test]
    fn static_text_and_emoji() {
        let presence = Presence::for_session(
            &static_config(StaticPresence {
                status_text: "around".into(),
                emoji: Some("wave:99".into()),
                ..Default::default()
            }),
            0,
        );

        assert_eq!(presence.status, PresenceStatus::Idle);
        assert_eq!(presence.activities.len(), 1);
        let custom = &presence.activities[0];
        assert!(custom.is_custom_status());
        assert_eq!(custom.state.as_deref(), Some("around"));
        assert_eq!(custom.emoji, Some(EmojiRef::custom("wave", "99")));
    }

    #[test]
    fn emoji_only_still_emits_custom_status() {
        let presence = Presence::for_session(
            &static_config(StaticPresence {
                emoji: Some("🔥".into()),
                ..Default::default()
            }),
            0,
        );
        assert_eq!(presence.activities.len(), 1);
        assert_eq!(presence.activities[0].state, None);
        assert_eq!(presence.activities[0].emoji, Some(EmojiRef::bare("🔥")));
    }

    #[test]
    fn rich_activity_requires_flag_and_name() {
        let activity = RichActivity {
            name: "Factorio".into(),
            kind: 0,
            details: Some("Building".into()),
            state: Some("Belts".into()),
            application_id: Some("1234".into()),
        };

        let disabled = static_config(StaticPresence {
            activity: Some(activity.clone()),
            ..Default::default()
        });
        assert!(Presence::for_session(&disabled, 0).activities.is_empty());

        let enabled = static_config(StaticPresence {
            status_text: "hi".into(),
            rich_presence: true,
            activity: Some(activity),
            ..Default::default()
        });
        let presence = Presence::for_session(&enabled, 0);
        assert_eq!(presence.activities.len(), 2);
        let rich = &presence.activities[1];
        assert_eq!(rich.kind, 0);
        assert_eq!(rich.name, "Factorio");
        assert_eq!(rich.details.as_deref(), Some("Building"));
        assert_eq!(rich.application_id.as_deref(), Some("1234"));

        let unnamed = static_config(StaticPresence {
            rich_presence: true,
            activity: Some(RichActivity::default()),
            ..Default::default()
        });
        assert!(Presence::for_session(&unnamed, 0).activities.is_empty());
    }

    #[test]
    fn rotating_uses_cursor_entry() {
        let config = rotating_config(&["A", "B", "C"]);
        for (cursor, expected) in [(0, "A"), (1, "B"), (2, "C")] {
            let presence = Presence::for_session(&config, cursor);
            assert_eq!(presence.activities.len(), 1);
            assert_eq!(presence.activities[0].state.as_deref(), Some(expected));
            assert!(presence.activities[0].is_custom_status());
        }
    }

    #[test]
    fn rotating_empty_list_falls_back() {
        let presence = Presence::for_session(&rotating_config(&[]), 3);
        assert_eq!(
            presence.activities[0].state.as_deref(),
            Some(ROTATION_FALLBACK_TEXT)
        );
    }

    #[test]
    fn wire_shape() {
        let presence = Presence::new(
            PresenceStatus::Dnd,
            vec![Activity::custom_status("busy", None)],
        );
        assert_eq!(
            serde_json::to_value(&presence).unwrap(),
            serde_json::json!({
                "since": 0,
                "activities": [{ "type": 4, "name": "Custom Status", "state": "busy" }],
                "status": "dnd",
                "afk": false,
            })
        );
    }
}
