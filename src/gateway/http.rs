use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use super::{AnimeGateway, EntryRef, EpisodeGateway, ReactionKind};
use crate::config::Settings;
use crate::error::ApiError;
use crate::types::{
    Accessibility, AnimeRecord, AnimeStatus, Comment, CreatedEntry, FranchiseItem, Release,
    ReleaseEpisode, ReleaseProgress, Reply, Review, ReviewList, Screenshot, UserProfile,
    VoiceEpisode, VoiceTrack, WatchStatus,
};

/// REST client for the site API and both episode providers.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    api_base: String,
}

impl HttpGateway {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            client,
            api_base: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.api_base, path)
        };
        let mut req = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Check the HTTP response for errors, pulling the server's message out of the body.
    async fn check_response(resp: Response) -> Result<Response, ApiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status, "API error");
        Err(ApiError::Status {
            status,
            message: extract_message(&body),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        tracing::debug!(path, "GET");
        let resp = self.request(Method::GET, path, token).send().await?;
        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::Parse(format!("{path}: {e}")))
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await?;
        Self::check_response(resp).await
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), ApiError> {
        self.send(req).await.map(|_| ())
    }

    async fn send_created(&self, req: RequestBuilder) -> Result<CreatedEntry, ApiError> {
        let created: CreatedWire = self
            .send(req)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(CreatedEntry {
            id: created.id,
            created_at: created.created_at.unwrap_or_else(Utc::now),
        })
    }
}

impl AnimeGateway for HttpGateway {
    async fn anime(&self, anime_id: i64) -> Result<AnimeRecord, ApiError> {
        let wire: AnimeWire = self.get_json(&format!("/anime/{anime_id}"), None).await?;
        Ok(wire.into_record())
    }

    async fn accessibility(&self, anime_id: i64) -> Result<Accessibility, ApiError> {
        let wire: AccessibilityWire = self
            .get_json(&format!("/anime/{anime_id}/accessibility"), None)
            .await?;
        Ok(Accessibility {
            accessible: wire.accessible,
            blocked_note: wire.blocked_note.filter(|n| !n.trim().is_empty()),
        })
    }

    async fn average_rating(&self, anime_id: i64) -> Result<Option<f32>, ApiError> {
        let wire: RatingSummaryWire = self
            .get_json(&format!("/anime/{anime_id}/rating-summary"), None)
            .await?;
        Ok(wire.average.filter(|avg| *avg > 0.0))
    }

    async fn review_count(&self, anime_id: i64) -> Result<u32, ApiError> {
        let wire: CountWire = self
            .get_json(&format!("/anime/{anime_id}/reviews/count"), None)
            .await?;
        Ok(wire.count)
    }

    async fn reviews(&self, anime_id: i64, token: Option<&str>) -> Result<ReviewList, ApiError> {
        let wire: ReviewListWire = self
            .get_json(&format!("/anime/{anime_id}/ratings"), token)
            .await?;
        Ok(wire.into_list())
    }

    async fn rate(
        &self,
        token: &str,
        anime_id: i64,
        score: u8,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "score": score, "comment": comment });
        let req = self
            .request(Method::POST, &format!("/anime/{anime_id}/rate"), Some(token))
            .json(&body);
        self.send_empty(req).await
    }

    async fn delete_rating(&self, token: &str, anime_id: i64) -> Result<(), ApiError> {
        let req = self.request(
            Method::DELETE,
            &format!("/anime/{anime_id}/rating"),
            Some(token),
        );
        self.send_empty(req).await
    }

    async fn screenshots(&self, anime_id: i64) -> Result<Vec<Screenshot>, ApiError> {
        let wire: Vec<ScreenshotWire> = self
            .get_json(&format!("/anime/{anime_id}/screenshots"), None)
            .await?;
        Ok(wire
            .into_iter()
            .map(|s| Screenshot {
                url: s.url,
                thumbnail: s.thumbnail,
            })
            .collect())
    }

    async fn collection_status(
        &self,
        token: &str,
        anime_id: i64,
    ) -> Result<WatchStatus, ApiError> {
        let wire: CollectionWire = self
            .get_json(&format!("/collection/{anime_id}"), Some(token))
            .await?;
        Ok(wire.status.unwrap_or_default())
    }

    async fn set_collection_status(
        &self,
        token: &str,
        anime_id: i64,
        status: WatchStatus,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "animeId": anime_id, "status": status.as_str() });
        let req = self
            .request(Method::POST, "/collection", Some(token))
            .json(&body);
        self.send_empty(req).await
    }

    async fn remove_collection_status(&self, token: &str, anime_id: i64) -> Result<(), ApiError> {
        let req = self.request(
            Method::DELETE,
            &format!("/collection/{anime_id}"),
            Some(token),
        );
        self.send_empty(req).await
    }

    async fn favorites(&self, token: &str) -> Result<Vec<i64>, ApiError> {
        let wire: Vec<FavoriteWire> = self.get_json("/collection/favorites", Some(token)).await?;
        Ok(wire.into_iter().map(|f| f.anime_id).collect())
    }

    async fn add_favorite(&self, token: &str, anime_id: i64) -> Result<(), ApiError> {
        let body = serde_json::json!({ "animeId": anime_id });
        let req = self
            .request(Method::POST, "/collection/favorites", Some(token))
            .json(&body);
        self.send_empty(req).await
    }

    async fn remove_favorite(&self, token: &str, anime_id: i64) -> Result<(), ApiError> {
        let req = self.request(
            Method::DELETE,
            &format!("/collection/favorites/{anime_id}"),
            Some(token),
        );
        self.send_empty(req).await
    }

    async fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let wire: ProfileWire = self.get_json("/users/me", Some(token)).await?;
        Ok(UserProfile {
            username: wire.username,
            nickname: wire.nickname,
            avatar: wire.avatar,
            roles: wire.roles.into_roles(),
            verified: wire.verified,
        })
    }

    async fn comments(&self, anime_id: i64, token: Option<&str>) -> Result<Vec<Comment>, ApiError> {
        let wire: Vec<CommentWire> = self
            .get_json(&format!("/comments/{anime_id}"), token)
            .await?;
        Ok(wire.into_iter().map(CommentWire::into_comment).collect())
    }

    async fn post_comment(
        &self,
        token: &str,
        anime_id: i64,
        text: &str,
    ) -> Result<CreatedEntry, ApiError> {
        let body = serde_json::json!({ "text": text, "animeId": anime_id });
        let req = self
            .request(Method::POST, "/comments", Some(token))
            .json(&body);
        self.send_created(req).await
    }

    async fn post_reply(
        &self,
        token: &str,
        comment_id: i64,
        text: &str,
    ) -> Result<CreatedEntry, ApiError> {
        let body = serde_json::json!({ "parentCommentId": comment_id, "text": text });
        let req = self
            .request(Method::POST, "/replies", Some(token))
            .json(&body);
        self.send_created(req).await
    }

    async fn react(
        &self,
        token: &str,
        target: EntryRef,
        kind: ReactionKind,
    ) -> Result<(), ApiError> {
        let path = format!("{}/{}", entry_path(target), kind.as_str());
        let req = self.request(Method::PUT, &path, Some(token));
        self.send_empty(req).await
    }

    async fn edit_entry(&self, token: &str, target: EntryRef, text: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "text": text });
        let req = self
            .request(Method::PUT, &entry_path(target), Some(token))
            .json(&body);
        self.send_empty(req).await
    }

    async fn delete_entry(
        &self,
        token: &str,
        target: EntryRef,
        captcha: &str,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "captchaToken": captcha });
        let req = self
            .request(Method::DELETE, &entry_path(target), Some(token))
            .json(&body);
        self.send_empty(req).await
    }
}

impl EpisodeGateway for HttpGateway {
    async fn franchise_chain(&self, anime_id: i64) -> Result<Vec<FranchiseItem>, ApiError> {
        let wire: Vec<FranchiseWire> = self
            .get_json(&format!("/franchise-chain/{anime_id}"), None)
            .await?;
        Ok(into_chain(wire))
    }

    async fn voice_tracks(&self, anime_id: i64) -> Result<Vec<VoiceTrack>, ApiError> {
        let wire: Vec<VoiceWire> = self
            .get_json(&format!("/providerA/anime/{anime_id}/voices"), None)
            .await?;
        Ok(wire
            .into_iter()
            .map(|v| VoiceTrack {
                id: v.id,
                name: v.name,
                episode_count: v.episodes_count,
            })
            .collect())
    }

    async fn voice_episodes(&self, voice_id: i64) -> Result<Vec<VoiceEpisode>, ApiError> {
        let wire: Vec<VoiceEpisodeWire> = self
            .get_json(&format!("/providerA/voices/{voice_id}/episodes"), None)
            .await?;
        let mut episodes: Vec<VoiceEpisode> = wire
            .into_iter()
            .map(|e| VoiceEpisode {
                id: e.id,
                number: e.number,
                title: e.title,
                max_quality: e.max_quality,
                thumbnail: e.thumbnail,
                duration_seconds: e.duration,
            })
            .collect();
        episodes.sort_by_key(|e| e.number);
        Ok(episodes)
    }

    async fn release(&self, anime_id: i64) -> Result<Option<Release>, ApiError> {
        let pointer: ReleasePointerWire = match self
            .get_json(&format!("/providerB/episodes/{anime_id}"), None)
            .await
        {
            Ok(pointer) => pointer,
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let (Some(api_url), Some(alias)) = (pointer.api_url, pointer.alias) else {
            return Ok(None);
        };
        if alias.trim().is_empty() {
            return Ok(None);
        }
        let release: ReleaseWire = self.get_json(&api_url, None).await?;
        Ok(Some(release.into_release(alias)))
    }

    async fn release_progress(
        &self,
        token: &str,
        anime_id: i64,
    ) -> Result<Vec<ReleaseProgress>, ApiError> {
        let wire: Vec<ReleaseProgressWire> = self
            .get_json(&format!("/providerB/progress/{anime_id}"), Some(token))
            .await?;
        Ok(wire
            .into_iter()
            .map(|p| ReleaseProgress {
                ordinal: p.ordinal,
                watched_seconds: p.watched_seconds,
            })
            .collect())
    }
}

// --- Helper Functions ---

fn entry_path(target: EntryRef) -> String {
    match target {
        EntryRef::Comment(id) => format!("/comments/{id}"),
        EntryRef::Reply(id) => format!("/replies/{id}"),
    }
}

fn extract_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message.or(parsed.error).unwrap_or_default(),
        Err(_) => body.trim().to_string(),
    }
}

fn split_genres(raw: Option<String>) -> Vec<String> {
    raw.map(|joined| {
        joined
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn into_chain(wire: Vec<FranchiseWire>) -> Vec<FranchiseItem> {
    let mut chain: Vec<FranchiseItem> = wire
        .into_iter()
        .map(|f| FranchiseItem {
            id: f.id,
            title: f.title,
            kind: f.kind,
            alt_title: f.alt_title,
            year: f.year,
            status: f.status,
            position: f.position,
        })
        .collect();
    // stable: equal positions keep server order
    chain.sort_by_key(|item| item.position);
    chain
}

// --- Wire Structs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnimeWire {
    id: i64,
    title: String,
    #[serde(default)]
    alt_title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    current_episodes: Option<u32>,
    #[serde(default)]
    total_episodes: Option<u32>,
    status: AnimeStatus,
    #[serde(default)]
    age_rating: Option<String>,
    #[serde(default)]
    studio: Option<String>,
    #[serde(default)]
    genres: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    season: Option<String>,
    #[serde(default)]
    cover_image: Option<String>,
    #[serde(default)]
    banner_image: Option<String>,
    #[serde(default)]
    opened: bool,
    #[serde(default)]
    provider_alias: Option<String>,
}

impl AnimeWire {
    fn into_record(self) -> AnimeRecord {
        AnimeRecord {
            id: self.id,
            title: self.title,
            alt_title: self.alt_title,
            description: self.description,
            kind: self.kind,
            episodes_current: self.current_episodes,
            episodes_total: self.total_episodes,
            status: self.status,
            age_rating: self.age_rating,
            studio: self.studio,
            genres: split_genres(self.genres),
            year: self.year,
            season: self.season,
            cover: self.cover_image,
            banner: self.banner_image,
            opened: self.opened,
            alias: self.provider_alias.filter(|a| !a.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibilityWire {
    accessible: bool,
    #[serde(default)]
    blocked_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatingSummaryWire {
    #[serde(default)]
    average: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CountWire {
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
struct ScreenshotWire {
    url: String,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionWire {
    #[serde(default)]
    status: Option<WatchStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteWire {
    anime_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedWire {
    id: i64,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Roles arrive either comma-joined or as a list depending on the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RolesWire {
    Joined(String),
    List(Vec<String>),
}

impl Default for RolesWire {
    fn default() -> Self {
        RolesWire::List(Vec::new())
    }
}

impl RolesWire {
    fn into_roles(self) -> Vec<String> {
        let raw = match self {
            RolesWire::Joined(joined) => joined,
            RolesWire::List(list) => list.join(","),
        };
        raw.split(',')
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileWire {
    username: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    roles: RolesWire,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentWire {
    id: i64,
    user_username: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    likes: u32,
    #[serde(default)]
    dislikes: u32,
    #[serde(default)]
    is_liked: bool,
    #[serde(default)]
    is_disliked: bool,
    #[serde(default)]
    roles: RolesWire,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    replies: Vec<ReplyWire>,
}

impl CommentWire {
    fn into_comment(self) -> Comment {
        let id = self.id;
        Comment {
            id,
            username: self.username.unwrap_or_else(|| self.user_username.clone()),
            real_username: self.user_username,
            nickname: self.nickname,
            text: self.text,
            created_at: self.created_at,
            likes: self.likes,
            dislikes: self.dislikes,
            is_liked: self.is_liked,
            // a like wins if the server reports both
            is_disliked: self.is_disliked && !self.is_liked,
            roles: self.roles.into_roles(),
            verified: self.verified,
            avatar: self.avatar,
            replies: self
                .replies
                .into_iter()
                .map(|r| r.into_reply(id))
                .collect(),
            is_pending: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyWire {
    id: i64,
    user_username: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    likes: u32,
    #[serde(default)]
    dislikes: u32,
    #[serde(default)]
    is_liked: bool,
    #[serde(default)]
    is_disliked: bool,
    #[serde(default)]
    roles: RolesWire,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    avatar: Option<String>,
}

impl ReplyWire {
    fn into_reply(self, parent_id: i64) -> Reply {
        Reply {
            id: self.id,
            parent_id,
            username: self.username.unwrap_or_else(|| self.user_username.clone()),
            real_username: self.user_username,
            nickname: self.nickname,
            text: self.text,
            created_at: self.created_at,
            likes: self.likes,
            dislikes: self.dislikes,
            is_liked: self.is_liked,
            is_disliked: self.is_disliked && !self.is_liked,
            roles: self.roles.into_roles(),
            verified: self.verified,
            avatar: self.avatar,
            is_pending: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewListWire {
    #[serde(default)]
    user_ratings: Vec<ReviewWire>,
    #[serde(default)]
    my_rating: Option<u8>,
    #[serde(default)]
    my_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewWire {
    id: i64,
    user_username: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    score: u8,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    is_own: bool,
}

impl ReviewListWire {
    fn into_list(self) -> ReviewList {
        ReviewList {
            reviews: self
                .user_ratings
                .into_iter()
                .map(|r| Review {
                    id: r.id,
                    username: r.username.unwrap_or_else(|| r.user_username.clone()),
                    real_username: r.user_username,
                    nickname: r.nickname,
                    rating: r.score.clamp(1, 5),
                    content: r.comment.filter(|c| !c.trim().is_empty()),
                    is_own: r.is_own,
                })
                .collect(),
            my_rating: self.my_rating.filter(|r| (1..=5).contains(r)),
            my_comment: self.my_comment.filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FranchiseWire {
    id: i64,
    title: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    alt_title: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    status: Option<AnimeStatus>,
    #[serde(default)]
    position: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceWire {
    id: i64,
    name: String,
    #[serde(default)]
    episodes_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceEpisodeWire {
    id: i64,
    number: u32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    max_quality: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleasePointerWire {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    alias: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseWire {
    #[serde(default)]
    episodes: Vec<ReleaseEpisodeWire>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEpisodeWire {
    id: String,
    #[serde(default)]
    name: Option<String>,
    ordinal: u32,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    hls_480: Option<String>,
    #[serde(default)]
    hls_720: Option<String>,
    #[serde(default)]
    hls_1080: Option<String>,
}

impl ReleaseWire {
    fn into_release(self, alias: String) -> Release {
        let mut episodes: Vec<ReleaseEpisode> = self
            .episodes
            .into_iter()
            .map(|e| {
                let streams: BTreeMap<String, String> = [
                    ("480", e.hls_480),
                    ("720", e.hls_720),
                    ("1080", e.hls_1080),
                ]
                .into_iter()
                .filter_map(|(quality, url)| url.map(|u| (quality.to_string(), u)))
                .collect();
                ReleaseEpisode {
                    id: e.id,
                    name: e.name,
                    ordinal: e.ordinal,
                    duration_seconds: e.duration,
                    preview: e.preview,
                    streams,
                }
            })
            .collect();
        episodes.sort_by_key(|e| e.ordinal);
        Release { alias, episodes }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseProgressWire {
    ordinal: u32,
    #[serde(default)]
    watched_seconds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anime_genres_are_split() {
        let wire: AnimeWire = serde_json::from_str(
            r#"{"id": 42, "title": "Frieren", "status": "ongoing",
                "genres": "Adventure, Drama,,Fantasy ", "opened": true,
                "providerAlias": "  "}"#,
        )
        .unwrap();
        let record = wire.into_record();
        assert_eq!(record.genres, vec!["Adventure", "Drama", "Fantasy"]);
        assert_eq!(record.status, AnimeStatus::Ongoing);
        assert!(record.opened);
        assert_eq!(record.alias, None);
    }

    #[test]
    fn comment_maps_login_name_and_roles() {
        let wire: CommentWire = serde_json::from_str(
            r#"{"id": 9, "userUsername": "Alice", "username": "CoolAlice99",
                "text": "hi", "createdAt": "2026-01-02T03:04:05Z",
                "likes": 3, "isLiked": true, "isDisliked": true,
                "roles": "Admin, premium",
                "replies": [{"id": 90, "userUsername": "bob", "text": "yo",
                             "createdAt": "2026-01-02T04:00:00Z",
                             "roles": ["moderator", "verified"]}]}"#,
        )
        .unwrap();
        let comment = wire.into_comment();
        assert_eq!(comment.real_username, "Alice");
        assert_eq!(comment.username, "CoolAlice99");
        assert_eq!(comment.roles, vec!["admin", "premium"]);
        assert!(comment.is_liked && !comment.is_disliked);
        let reply = &comment.replies[0];
        assert_eq!(reply.parent_id, 9);
        assert_eq!(reply.username, "bob");
        assert_eq!(reply.roles, vec!["moderator", "verified"]);
    }

    #[test]
    fn franchise_chain_is_sorted_stably() {
        let wire: Vec<FranchiseWire> = serde_json::from_str(
            r#"[{"id": 3, "title": "Movie", "position": 2},
                {"id": 1, "title": "S1", "position": 0},
                {"id": 4, "title": "OVA", "position": 2},
                {"id": 2, "title": "S2", "position": 1}]"#,
        )
        .unwrap();
        let ids: Vec<i64> = into_chain(wire).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn release_collects_available_streams() {
        let wire: ReleaseWire = serde_json::from_str(
            r#"{"episodes": [
                {"id": "b", "ordinal": 2, "duration": 1400, "hls_720": "https://cdn/2/720.m3u8"},
                {"id": "a", "ordinal": 1, "duration": 1420,
                 "hls_480": "https://cdn/1/480.m3u8", "hls_1080": "https://cdn/1/1080.m3u8"}]}"#,
        )
        .unwrap();
        let release = wire.into_release("frieren".into());
        assert_eq!(release.episodes[0].ordinal, 1);
        assert_eq!(
            release.episodes[0].streams.keys().collect::<Vec<_>>(),
            vec!["1080", "480"]
        );
        assert_eq!(release.episodes[1].streams.len(), 1);
    }

    #[test]
    fn error_body_message_is_extracted() {
        assert_eq!(extract_message(r#"{"message": "too fast"}"#), "too fast");
        assert_eq!(extract_message(r#"{"error": "nope"}"#), "nope");
        assert_eq!(extract_message("plain failure\n"), "plain failure");
    }

    #[test]
    fn reviews_drop_empty_content() {
        let wire: ReviewListWire = serde_json::from_str(
            r#"{"userRatings": [{"id": 1, "userUsername": "alice", "score": 5, "comment": " "}],
                "myRating": 4}"#,
        )
        .unwrap();
        let list = wire.into_list();
        assert_eq!(list.reviews[0].content, None);
        assert_eq!(list.reviews[0].username, "alice");
        assert_eq!(list.my_rating, Some(4));
    }
}
