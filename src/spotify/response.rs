use chrono::Duration;
use serde::Deserialize;

fn ms_to_duration_optional<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ms: Option<i64> = Deserialize::deserialize(deserializer)?;
    Ok(ms.and_then(Duration::try_milliseconds))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CurrentlyPlayingType {
    Track,
    Episode,
    #[serde(rename = "ad")]
    Advertisement,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimplifiedArtist {
    pub name: String,
}

/// The playing item. Only tracks carry artists, episodes and ads are reported
/// with whatever name spotify sends.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(
        rename = "duration_ms",
        default,
        deserialize_with = "ms_to_duration_optional"
    )]
    pub duration: Option<Duration>,
}

/// Body of `GET /me/player/currently-playing`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CurrentlyPlaying {
    #[serde(rename = "is_playing", default)]
    pub playing: bool,
    #[serde(
        rename = "progress_ms",
        default,
        deserialize_with = "ms_to_duration_optional"
    )]
    pub progress: Option<Duration>,
    #[serde(default)]
    pub currently_playing_type: CurrentlyPlayingType,
    pub item: Option<Item>,
}

impl CurrentlyPlaying {
    /// Time left until the item finishes, if spotify reported enough to know
    pub fn remaining(&self) -> Option<Duration> {
        let duration = self.item.as_ref()?.duration?;
        let progress = self.progress.unwrap_or_else(Duration::zero);
        Some(duration.checked_sub(&progress)?.max(Duration::zero()))
    }
}
