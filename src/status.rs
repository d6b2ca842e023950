use chrono::{DateTime, Utc};

use crate::spotify::response::CurrentlyPlayingType;
use crate::spotify::CurrentlyPlaying;

/// Shown while nothing is playing
pub static IDLE_STATUS: &str = "Not listening to anything";
/// Joins artist names in the playing status
pub static ARTIST_SEPARATOR: &str = ", ";

/// What the profile status should say
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Idle,
    Playing {
        title: String,
        artists: Vec<String>,
        /// When the track is expected to end
        ends_at: Option<DateTime<Utc>>,
    },
}

/// A write to the profile status. A `None` message clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn clear() -> Self {
        Self {
            message: None,
            expires_at: None,
        }
    }
}

impl Status {
    /// Derive the status from a playback poll, `None` meaning spotify had no content
    pub fn from_playback(playback: Option<&CurrentlyPlaying>, now: DateTime<Utc>) -> Self {
        let Some(playback) = playback else {
            return Status::Idle;
        };

        // Ads are never mirrored, even when spotify sends an item for them
        if playback.currently_playing_type == CurrentlyPlayingType::Advertisement {
            return Status::Idle;
        }

        match &playback.item {
            Some(item) if playback.playing => Status::Playing {
                title: item.name.clone(),
                artists: item.artists.iter().map(|a| a.name.clone()).collect(),
                ends_at: playback
                    .remaining()
                    .and_then(|remaining| now.checked_add_signed(remaining)),
            },
            _ => Status::Idle,
        }
    }

    /// The status text, also used to decide whether anything changed
    pub fn display(&self, prefix: &str) -> String {
        match self {
            Status::Idle => IDLE_STATUS.to_string(),
            Status::Playing { title, artists, .. } if artists.is_empty() => {
                format!("{prefix}Listening to {title}")
            }
            Status::Playing { title, artists, .. } => {
                format!("{prefix}Listening to {title} by {}", artists.join(ARTIST_SEPARATOR))
            }
        }
    }

    pub fn update(&self, prefix: &str, clear_when_idle: bool) -> StatusUpdate {
        match self {
            Status::Idle if clear_when_idle => StatusUpdate::clear(),
            Status::Idle => StatusUpdate {
                message: Some(self.display(prefix)),
                expires_at: None,
            },
            Status::Playing { ends_at, .. } => StatusUpdate {
                message: Some(self.display(prefix)),
                expires_at: *ends_at,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    fn playback(value: serde_json::Value) -> CurrentlyPlaying {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_content_is_idle() {
        assert_eq!(Status::from_playback(None, now()), Status::Idle);
        assert_eq!(Status::Idle.display("🎵 "), IDLE_STATUS);
    }

    #[test]
    fn paused_is_idle() {
        let paused = playback(json!({
            "is_playing": false,
            "progress_ms": 1000,
            "item": {"name": "Song A", "duration_ms": 2000, "artists": [{"name": "Artist X"}]}
        }));
        assert_eq!(Status::from_playback(Some(&paused), now()), Status::Idle);
    }

    #[test]
    fn playing_without_item_is_idle() {
        let ad = playback(json!({"is_playing": true, "currently_playing_type": "ad", "item": null}));
        assert_eq!(Status::from_playback(Some(&ad), now()), Status::Idle);
    }

    #[test]
    fn advertisement_with_item_is_idle() {
        let ad = playback(json!({
            "is_playing": true,
            "currently_playing_type": "ad",
            "item": {"name": "Spotify", "duration_ms": 30000, "artists": []}
        }));
        assert_eq!(Status::from_playback(Some(&ad), now()), Status::Idle);
    }

    #[test]
    fn playing_track() {
        let playing = playback(json!({
            "is_playing": true,
            "progress_ms": 30000,
            "item": {
                "name": "Song A",
                "duration_ms": 90000,
                "artists": [{"name": "Artist X"}, {"name": "Artist Y"}, {"name": "Artist Z"}]
            }
        }));

        let status = Status::from_playback(Some(&playing), now());
        assert_eq!(
            status,
            Status::Playing {
                title: "Song A".into(),
                artists: vec!["Artist X".into(), "Artist Y".into(), "Artist Z".into()],
                ends_at: Some(now() + Duration::seconds(60)),
            }
        );
        assert_eq!(status.display(""), "Listening to Song A by Artist X, Artist Y, Artist Z");
        assert_eq!(status.display("🎵 "), "🎵 Listening to Song A by Artist X, Artist Y, Artist Z");
    }

    #[test]
    fn huge_duration_has_no_end() {
        let playing = playback(json!({
            "is_playing": true,
            "progress_ms": 0,
            "item": {"name": "Song A", "duration_ms": 9_000_000_000_000_000_000_i64, "artists": [{"name": "Artist X"}]}
        }));

        match Status::from_playback(Some(&playing), now()) {
            Status::Playing { title, ends_at, .. } => {
                assert_eq!(title, "Song A");
                assert_eq!(ends_at, None);
            }
            other => panic!("expected playing, got {other:?}"),
        }
    }

    #[test]
    fn playing_without_artists() {
        let status = Status::Playing {
            title: "Episode 12".into(),
            artists: Vec::new(),
            ends_at: None,
        };
        assert_eq!(status.display(""), "Listening to Episode 12");
    }

    #[test]
    fn idle_update_writes_or_clears() {
        assert_eq!(
            Status::Idle.update("", false),
            StatusUpdate {
                message: Some(IDLE_STATUS.to_string()),
                expires_at: None
            }
        );
        assert_eq!(Status::Idle.update("", true), StatusUpdate::clear());
    }

    #[test]
    fn playing_update_expires_with_track() {
        let ends_at = now() + Duration::seconds(42);
        let status = Status::Playing {
            title: "Song A".into(),
            artists: vec!["Artist X".into()],
            ends_at: Some(ends_at),
        };
        let update = status.update("", true);
        assert_eq!(update.message.as_deref(), Some("Listening to Song A by Artist X"));
        assert_eq!(update.expires_at, Some(ends_at));
    }
}
