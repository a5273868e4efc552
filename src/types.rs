use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnimeStatus {
    Announced,
    Upcoming,
    Ongoing,
    Completed,
}

impl AnimeStatus {
    pub fn label(self) -> &'static str {
        match self {
            AnimeStatus::Announced => "Announced",
            AnimeStatus::Upcoming => "Upcoming",
            AnimeStatus::Ongoing => "Ongoing",
            AnimeStatus::Completed => "Completed",
        }
    }

    /// Unreleased titles cannot be rated or reviewed.
    pub fn accepts_ratings(self) -> bool {
        !matches!(self, AnimeStatus::Announced | AnimeStatus::Upcoming)
    }
}

/// A user's watch-list classification for one anime.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    #[default]
    None,
    Planned,
    Watching,
    Completed,
    Paused,
    Dropped,
}

impl WatchStatus {
    pub const ALL: [WatchStatus; 6] = [
        WatchStatus::None,
        WatchStatus::Planned,
        WatchStatus::Watching,
        WatchStatus::Completed,
        WatchStatus::Paused,
        WatchStatus::Dropped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WatchStatus::None => "none",
            WatchStatus::Planned => "planned",
            WatchStatus::Watching => "watching",
            WatchStatus::Completed => "completed",
            WatchStatus::Paused => "paused",
            WatchStatus::Dropped => "dropped",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WatchStatus::None => "Not in list",
            WatchStatus::Planned => "Planned",
            WatchStatus::Watching => "Watching",
            WatchStatus::Completed => "Completed",
            WatchStatus::Paused => "Paused",
            WatchStatus::Dropped => "Dropped",
        }
    }
}

/// Status and favorite are independent axes; neither is derived from the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStatus {
    pub status: WatchStatus,
    pub favorite: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimeRecord {
    pub id: i64,
    pub title: String,
    pub alt_title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub episodes_current: Option<u32>,
    pub episodes_total: Option<u32>,
    pub status: AnimeStatus,
    pub age_rating: Option<String>,
    pub studio: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<u32>,
    pub season: Option<String>,
    pub cover: Option<String>,
    pub banner: Option<String>,
    pub opened: bool,
    pub alias: Option<String>,
}

impl AnimeRecord {
    pub fn episode_label(&self) -> String {
        match (self.episodes_current, self.episodes_total) {
            (Some(current), Some(total)) if current < total => format!("{current} / {total}"),
            (_, Some(total)) => total.to_string(),
            (Some(current), None) => format!("{current} / ?"),
            (None, None) => String::from("?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessibility {
    pub accessible: bool,
    pub blocked_note: Option<String>,
}

impl Accessibility {
    pub fn open() -> Self {
        Self {
            accessible: true,
            blocked_note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub url: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub roles: Vec<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub username: String,
    pub real_username: String,
    pub nickname: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
    pub dislikes: u32,
    pub is_liked: bool,
    pub is_disliked: bool,
    pub roles: Vec<String>,
    pub verified: bool,
    pub avatar: Option<String>,
    pub replies: Vec<Reply>,
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: i64,
    pub parent_id: i64,
    pub username: String,
    pub real_username: String,
    pub nickname: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
    pub dislikes: u32,
    pub is_liked: bool,
    pub is_disliked: bool,
    pub roles: Vec<String>,
    pub verified: bool,
    pub avatar: Option<String>,
    pub is_pending: bool,
}

impl Comment {
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }
}

impl Reply {
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }
}

/// Id and timestamp the server assigns to a newly created comment or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: i64,
    pub username: String,
    pub real_username: String,
    pub nickname: Option<String>,
    pub rating: u8,
    pub content: Option<String>,
    pub is_own: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewList {
    pub reviews: Vec<Review>,
    pub my_rating: Option<u8>,
    pub my_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FranchiseItem {
    pub id: i64,
    pub title: String,
    pub kind: Option<String>,
    pub alt_title: Option<String>,
    pub year: Option<u32>,
    pub status: Option<AnimeStatus>,
    pub position: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Voice-track catalog.
    #[serde(rename = "a")]
    A,
    /// Single-track catalog addressed by an external alias.
    #[serde(rename = "b")]
    B,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::A => "a",
            Provider::B => "b",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Provider::A => "provider-a",
            Provider::B => "provider-b",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::A => "Provider A",
            Provider::B => "Provider B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTrack {
    pub id: i64,
    pub name: String,
    pub episode_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEpisode {
    pub id: i64,
    pub number: u32,
    pub title: Option<String>,
    pub max_quality: Option<String>,
    pub thumbnail: Option<String>,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEpisode {
    pub id: String,
    pub name: Option<String>,
    pub ordinal: u32,
    pub duration_seconds: u32,
    pub preview: Option<String>,
    /// Stream URL by quality label ("480", "720", "1080").
    pub streams: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub alias: String,
    pub episodes: Vec<ReleaseEpisode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseProgress {
    pub ordinal: u32,
    pub watched_seconds: u32,
}

/// Watch progress for one episode. `ratio` is always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeProgress {
    pub watched_seconds: u32,
    pub ratio: f32,
}

impl EpisodeProgress {
    pub fn new(watched_seconds: u32, duration_seconds: u32) -> Self {
        let ratio = if duration_seconds == 0 {
            0.0
        } else {
            (watched_seconds as f32 / duration_seconds as f32).clamp(0.0, 1.0)
        };
        Self {
            watched_seconds,
            ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    Screenshots,
    Details,
    Reviews,
    Comments,
    Episodes,
    Related,
    Similar,
}

impl Tab {
    pub const ALL: [Tab; 7] = [
        Tab::Screenshots,
        Tab::Details,
        Tab::Reviews,
        Tab::Comments,
        Tab::Episodes,
        Tab::Related,
        Tab::Similar,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Screenshots => "screenshots",
            Tab::Details => "details",
            Tab::Reviews => "reviews",
            Tab::Comments => "comments",
            Tab::Episodes => "episodes",
            Tab::Related => "related",
            Tab::Similar => "similar",
        }
    }

    pub fn is_default(self) -> bool {
        self == Tab::default()
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tab '{s}'"))
    }
}
