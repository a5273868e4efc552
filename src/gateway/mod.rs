use crate::error::ApiError;
use crate::types::{
    Accessibility, AnimeRecord, Comment, CreatedEntry, FranchiseItem, Release, ReleaseProgress,
    ReviewList, Screenshot, UserProfile, VoiceEpisode, VoiceTrack, WatchStatus,
};

pub mod http;

/// A comment or a reply, as addressed by the mutation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRef {
    Comment(i64),
    Reply(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

/// Anime metadata, community and collection endpoints.
pub trait AnimeGateway {
    async fn anime(&self, anime_id: i64) -> Result<AnimeRecord, ApiError>;
    async fn accessibility(&self, anime_id: i64) -> Result<Accessibility, ApiError>;
    async fn average_rating(&self, anime_id: i64) -> Result<Option<f32>, ApiError>;
    async fn review_count(&self, anime_id: i64) -> Result<u32, ApiError>;
    async fn reviews(&self, anime_id: i64, token: Option<&str>) -> Result<ReviewList, ApiError>;
    async fn rate(
        &self,
        token: &str,
        anime_id: i64,
        score: u8,
        comment: Option<&str>,
    ) -> Result<(), ApiError>;
    async fn delete_rating(&self, token: &str, anime_id: i64) -> Result<(), ApiError>;
    async fn screenshots(&self, anime_id: i64) -> Result<Vec<Screenshot>, ApiError>;

    async fn collection_status(&self, token: &str, anime_id: i64)
    -> Result<WatchStatus, ApiError>;
    async fn set_collection_status(
        &self,
        token: &str,
        anime_id: i64,
        status: WatchStatus,
    ) -> Result<(), ApiError>;
    async fn remove_collection_status(&self, token: &str, anime_id: i64) -> Result<(), ApiError>;
    async fn favorites(&self, token: &str) -> Result<Vec<i64>, ApiError>;
    async fn add_favorite(&self, token: &str, anime_id: i64) -> Result<(), ApiError>;
    async fn remove_favorite(&self, token: &str, anime_id: i64) -> Result<(), ApiError>;
    async fn profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    async fn comments(&self, anime_id: i64, token: Option<&str>) -> Result<Vec<Comment>, ApiError>;
    async fn post_comment(
        &self,
        token: &str,
        anime_id: i64,
        text: &str,
    ) -> Result<CreatedEntry, ApiError>;
    async fn post_reply(
        &self,
        token: &str,
        comment_id: i64,
        text: &str,
    ) -> Result<CreatedEntry, ApiError>;
    async fn react(&self, token: &str, target: EntryRef, kind: ReactionKind)
    -> Result<(), ApiError>;
    async fn edit_entry(&self, token: &str, target: EntryRef, text: &str) -> Result<(), ApiError>;
    async fn delete_entry(
        &self,
        token: &str,
        target: EntryRef,
        captcha: &str,
    ) -> Result<(), ApiError>;
}

/// Episode providers and the franchise chain.
pub trait EpisodeGateway {
    async fn franchise_chain(&self, anime_id: i64) -> Result<Vec<FranchiseItem>, ApiError>;
    async fn voice_tracks(&self, anime_id: i64) -> Result<Vec<VoiceTrack>, ApiError>;
    async fn voice_episodes(&self, voice_id: i64) -> Result<Vec<VoiceEpisode>, ApiError>;
    /// `Ok(None)` when the title has no release on Provider B.
    async fn release(&self, anime_id: i64) -> Result<Option<Release>, ApiError>;
    async fn release_progress(
        &self,
        token: &str,
        anime_id: i64,
    ) -> Result<Vec<ReleaseProgress>, ApiError>;
}
