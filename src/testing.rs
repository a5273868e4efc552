//! In-memory gateway and notifier for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::gateway::{AnimeGateway, EntryRef, EpisodeGateway, ReactionKind};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::types::{
    Accessibility, AnimeRecord, AnimeStatus, Comment, CreatedEntry, FranchiseItem, Release,
    ReleaseEpisode, ReleaseProgress, Reply, ReviewList, Screenshot, UserProfile, VoiceEpisode,
    VoiceTrack, WatchStatus,
};

#[derive(Debug, Default)]
struct FakeState {
    anime: HashMap<i64, AnimeRecord>,
    accessibility: HashMap<i64, Accessibility>,
    average: HashMap<i64, f32>,
    review_count: u32,
    reviews: ReviewList,
    screenshots: Vec<Screenshot>,
    statuses: HashMap<i64, WatchStatus>,
    favorites: Vec<i64>,
    profile: Option<UserProfile>,
    comments: Vec<Comment>,
    next_id: i64,
    franchise: Vec<FranchiseItem>,
    voices: HashMap<i64, Vec<VoiceTrack>>,
    voice_episodes: HashMap<i64, Vec<VoiceEpisode>>,
    releases: HashMap<i64, Release>,
    release_progress: HashMap<i64, Vec<ReleaseProgress>>,
    failures: HashMap<&'static str, (u16, String)>,
    delays: HashMap<&'static str, usize>,
    calls: Vec<&'static str>,
    last_delete_captcha: Option<String>,
}

/// Scriptable gateway. Clones share state so a test can keep a handle after
/// moving one into the store. Every call yields once before answering, so a
/// second call joined with the first observes its in-flight state.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn anime_record(id: i64, title: &str, status: AnimeStatus) -> AnimeRecord {
        AnimeRecord {
            id,
            title: title.to_string(),
            alt_title: None,
            description: None,
            kind: Some("TV".into()),
            episodes_current: Some(12),
            episodes_total: Some(12),
            status,
            age_rating: None,
            studio: None,
            genres: vec!["Fantasy".into()],
            year: Some(2023),
            season: None,
            cover: Some(format!("https://img.example/{id}.jpg")),
            banner: None,
            opened: true,
            alias: Some(format!("alias-{id}")),
        }
    }

    pub fn comment(id: i64, author: &str) -> Comment {
        Comment {
            id,
            username: author.to_string(),
            real_username: author.to_string(),
            nickname: None,
            text: format!("comment {id}"),
            created_at: Utc::now(),
            likes: 0,
            dislikes: 0,
            is_liked: false,
            is_disliked: false,
            roles: Vec::new(),
            verified: false,
            avatar: None,
            replies: Vec::new(),
            is_pending: false,
        }
    }

    pub fn reply(id: i64, parent_id: i64, author: &str) -> Reply {
        Reply {
            id,
            parent_id,
            username: author.to_string(),
            real_username: author.to_string(),
            nickname: None,
            text: format!("reply {id}"),
            created_at: Utc::now(),
            likes: 0,
            dislikes: 0,
            is_liked: false,
            is_disliked: false,
            roles: Vec::new(),
            verified: false,
            avatar: None,
            is_pending: false,
        }
    }

    pub fn voice(id: i64, name: &str, episode_count: u32) -> VoiceTrack {
        VoiceTrack {
            id,
            name: name.to_string(),
            episode_count,
        }
    }

    pub fn voice_episode(id: i64, number: u32, duration_seconds: u32) -> VoiceEpisode {
        VoiceEpisode {
            id,
            number,
            title: Some(format!("Episode {number}")),
            max_quality: Some("1080".into()),
            thumbnail: None,
            duration_seconds,
        }
    }

    /// `episodes` are `(ordinal, duration_seconds)` pairs.
    pub fn release(alias: &str, episodes: &[(u32, u32)]) -> Release {
        Release {
            alias: alias.to_string(),
            episodes: episodes
                .iter()
                .map(|&(ordinal, duration_seconds)| ReleaseEpisode {
                    id: format!("{alias}-{ordinal}"),
                    name: None,
                    ordinal,
                    duration_seconds,
                    preview: None,
                    streams: BTreeMap::new(),
                })
                .collect(),
        }
    }

    pub fn set_anime(&self, anime: AnimeRecord) {
        self.state.lock().anime.insert(anime.id, anime);
    }

    pub fn set_accessibility(&self, anime_id: i64, accessibility: Accessibility) {
        self.state
            .lock()
            .accessibility
            .insert(anime_id, accessibility);
    }

    pub fn set_average(&self, anime_id: i64, average: f32) {
        self.state.lock().average.insert(anime_id, average);
    }

    pub fn set_review_count(&self, count: u32) {
        self.state.lock().review_count = count;
    }

    pub fn set_reviews(&self, reviews: ReviewList) {
        self.state.lock().reviews = reviews;
    }

    pub fn set_screenshots(&self, screenshots: Vec<Screenshot>) {
        self.state.lock().screenshots = screenshots;
    }

    pub fn set_status(&self, anime_id: i64, status: WatchStatus) {
        self.state.lock().statuses.insert(anime_id, status);
    }

    pub fn status(&self, anime_id: i64) -> WatchStatus {
        self.state
            .lock()
            .statuses
            .get(&anime_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_favorites(&self, ids: Vec<i64>) {
        self.state.lock().favorites = ids;
    }

    pub fn favorites_now(&self) -> Vec<i64> {
        self.state.lock().favorites.clone()
    }

    pub fn set_profile(&self, profile: UserProfile) {
        self.state.lock().profile = Some(profile);
    }

    pub fn set_comments(&self, comments: Vec<Comment>) {
        self.state.lock().comments = comments;
    }

    pub fn set_franchise(&self, chain: Vec<FranchiseItem>) {
        self.state.lock().franchise = chain;
    }

    pub fn set_voices(&self, anime_id: i64, voices: Vec<VoiceTrack>) {
        self.state.lock().voices.insert(anime_id, voices);
    }

    pub fn set_voice_episodes(&self, voice_id: i64, episodes: Vec<VoiceEpisode>) {
        self.state.lock().voice_episodes.insert(voice_id, episodes);
    }

    pub fn set_release(&self, anime_id: i64, release: Release) {
        self.state.lock().releases.insert(anime_id, release);
    }

    pub fn set_release_progress(&self, anime_id: i64, progress: Vec<ReleaseProgress>) {
        self.state.lock().release_progress.insert(anime_id, progress);
    }

    /// Makes every later call to `method` fail with `status`.
    pub fn fail(&self, method: &'static str, status: u16) {
        self.fail_with(method, status, "");
    }

    pub fn fail_with(&self, method: &'static str, status: u16, message: &str) {
        self.state
            .lock()
            .failures
            .insert(method, (status, message.to_string()));
    }

    /// Makes `method` yield `extra` more times before answering, so a call
    /// started alongside it finishes first.
    pub fn slow(&self, method: &'static str, extra: usize) {
        self.state.lock().delays.insert(method, extra);
    }

    pub fn recover(&self, method: &'static str) {
        self.state.lock().failures.remove(method);
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|name| **name == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn last_delete_captcha(&self) -> Option<String> {
        self.state.lock().last_delete_captcha.clone()
    }

    async fn enter(&self, method: &'static str) -> Result<(), ApiError> {
        let extra = {
            let mut state = self.state.lock();
            state.calls.push(method);
            state.delays.get(method).copied().unwrap_or(0)
        };
        for _ in 0..=extra {
            tokio::task::yield_now().await;
        }
        let failure = self.state.lock().failures.get(method).cloned();
        match failure {
            Some((status, message)) => Err(ApiError::Status { status, message }),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    fn created(&self) -> CreatedEntry {
        let mut state = self.state.lock();
        state.next_id += 1;
        CreatedEntry {
            id: 1000 + state.next_id,
            created_at: Utc::now(),
        }
    }
}

impl AnimeGateway for FakeGateway {
    async fn anime(&self, anime_id: i64) -> Result<AnimeRecord, ApiError> {
        self.enter("anime").await?;
        self.state
            .lock()
            .anime
            .get(&anime_id)
            .cloned()
            .ok_or_else(|| Self::not_found("anime"))
    }

    async fn accessibility(&self, anime_id: i64) -> Result<Accessibility, ApiError> {
        self.enter("accessibility").await?;
        Ok(self
            .state
            .lock()
            .accessibility
            .get(&anime_id)
            .cloned()
            .unwrap_or_else(Accessibility::open))
    }

    async fn average_rating(&self, anime_id: i64) -> Result<Option<f32>, ApiError> {
        self.enter("average_rating").await?;
        Ok(self.state.lock().average.get(&anime_id).copied())
    }

    async fn review_count(&self, _anime_id: i64) -> Result<u32, ApiError> {
        self.enter("review_count").await?;
        Ok(self.state.lock().review_count)
    }

    async fn reviews(&self, _anime_id: i64, _token: Option<&str>) -> Result<ReviewList, ApiError> {
        self.enter("reviews").await?;
        Ok(self.state.lock().reviews.clone())
    }

    async fn rate(
        &self,
        _token: &str,
        _anime_id: i64,
        _score: u8,
        _comment: Option<&str>,
    ) -> Result<(), ApiError> {
        self.enter("rate").await
    }

    async fn delete_rating(&self, _token: &str, _anime_id: i64) -> Result<(), ApiError> {
        self.enter("delete_rating").await
    }

    async fn screenshots(&self, _anime_id: i64) -> Result<Vec<Screenshot>, ApiError> {
        self.enter("screenshots").await?;
        Ok(self.state.lock().screenshots.clone())
    }

    async fn collection_status(&self, _token: &str, anime_id: i64) -> Result<WatchStatus, ApiError> {
        self.enter("collection_status").await?;
        Ok(self.status(anime_id))
    }

    async fn set_collection_status(
        &self,
        _token: &str,
        anime_id: i64,
        status: WatchStatus,
    ) -> Result<(), ApiError> {
        self.enter("set_collection_status").await?;
        self.set_status(anime_id, status);
        Ok(())
    }

    async fn remove_collection_status(&self, _token: &str, anime_id: i64) -> Result<(), ApiError> {
        self.enter("remove_collection_status").await?;
        self.state.lock().statuses.remove(&anime_id);
        Ok(())
    }

    async fn favorites(&self, _token: &str) -> Result<Vec<i64>, ApiError> {
        self.enter("favorites").await?;
        Ok(self.favorites_now())
    }

    async fn add_favorite(&self, _token: &str, anime_id: i64) -> Result<(), ApiError> {
        self.enter("add_favorite").await?;
        self.state.lock().favorites.push(anime_id);
        Ok(())
    }

    async fn remove_favorite(&self, _token: &str, anime_id: i64) -> Result<(), ApiError> {
        self.enter("remove_favorite").await?;
        self.state.lock().favorites.retain(|id| *id != anime_id);
        Ok(())
    }

    async fn profile(&self, _token: &str) -> Result<UserProfile, ApiError> {
        self.enter("profile").await?;
        self.state
            .lock()
            .profile
            .clone()
            .ok_or_else(|| Self::not_found("profile"))
    }

    async fn comments(&self, _anime_id: i64, _token: Option<&str>) -> Result<Vec<Comment>, ApiError> {
        self.enter("comments").await?;
        Ok(self.state.lock().comments.clone())
    }

    async fn post_comment(
        &self,
        _token: &str,
        _anime_id: i64,
        _text: &str,
    ) -> Result<CreatedEntry, ApiError> {
        self.enter("post_comment").await?;
        Ok(self.created())
    }

    async fn post_reply(
        &self,
        _token: &str,
        _comment_id: i64,
        _text: &str,
    ) -> Result<CreatedEntry, ApiError> {
        self.enter("post_reply").await?;
        Ok(self.created())
    }

    async fn react(
        &self,
        _token: &str,
        _target: EntryRef,
        _kind: ReactionKind,
    ) -> Result<(), ApiError> {
        self.enter("react").await
    }

    async fn edit_entry(&self, _token: &str, _target: EntryRef, _text: &str) -> Result<(), ApiError> {
        self.enter("edit_entry").await
    }

    async fn delete_entry(
        &self,
        _token: &str,
        _target: EntryRef,
        captcha: &str,
    ) -> Result<(), ApiError> {
        self.state.lock().last_delete_captcha = Some(captcha.to_string());
        self.enter("delete_entry").await
    }
}

impl EpisodeGateway for FakeGateway {
    async fn franchise_chain(&self, _anime_id: i64) -> Result<Vec<FranchiseItem>, ApiError> {
        self.enter("franchise_chain").await?;
        Ok(self.state.lock().franchise.clone())
    }

    async fn voice_tracks(&self, anime_id: i64) -> Result<Vec<VoiceTrack>, ApiError> {
        self.enter("voice_tracks").await?;
        Ok(self
            .state
            .lock()
            .voices
            .get(&anime_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn voice_episodes(&self, voice_id: i64) -> Result<Vec<VoiceEpisode>, ApiError> {
        self.enter("voice_episodes").await?;
        Ok(self
            .state
            .lock()
            .voice_episodes
            .get(&voice_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn release(&self, anime_id: i64) -> Result<Option<Release>, ApiError> {
        self.enter("release").await?;
        Ok(self.state.lock().releases.get(&anime_id).cloned())
    }

    async fn release_progress(
        &self,
        _token: &str,
        anime_id: i64,
    ) -> Result<Vec<ReleaseProgress>, ApiError> {
        self.enter("release_progress").await?;
        Ok(self
            .state
            .lock()
            .release_progress
            .get(&anime_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Notifier that keeps everything it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.seen.lock().last().cloned()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.seen.lock().iter().filter(|n| n.kind == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}
