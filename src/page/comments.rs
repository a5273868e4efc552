use chrono::Utc;

use super::{AnimePage, PageState};
use crate::comments::{is_owner, reply_prefix};
use crate::error::{ApiError, PageError};
use crate::gateway::{AnimeGateway, EntryRef, ReactionKind};
use crate::notify::{Notification, Notifier};
use crate::storage::ClientStorage;
use crate::types::{Comment, Reply};

/// Author fields stamped on optimistic entries.
struct Author {
    username: String,
    nickname: Option<String>,
    avatar: Option<String>,
    roles: Vec<String>,
    verified: bool,
}

impl Author {
    fn current(state: &PageState, session_username: Option<String>) -> Self {
        match &state.profile {
            Some(profile) => Self {
                username: profile.username.clone(),
                nickname: profile.nickname.clone(),
                avatar: profile.avatar.clone(),
                roles: profile.roles.clone(),
                verified: profile.verified,
            },
            None => Self {
                username: session_username.unwrap_or_default(),
                nickname: None,
                avatar: None,
                roles: Vec::new(),
                verified: false,
            },
        }
    }
}

fn failure_message(err: &ApiError, fallback: &str) -> String {
    err.server_message()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

impl<G, S, N> AnimePage<G, S, N>
where
    G: AnimeGateway,
    S: ClientStorage,
    N: Notifier,
{
    /// Posts a top-level comment. It is shown at the head of the list right
    /// away and removed again if the server rejects it.
    pub async fn submit_comment(&self, text: &str) -> Result<i64, PageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PageError::EmptyText);
        }
        let token = self.require_token()?;
        let session = self.storage.session_username();

        let (generation, anime_id, temp_id) = {
            let mut s = self.state.lock();
            let anime_id = s.anime_id.ok_or(PageError::NotLoaded)?;
            let author = Author::current(&s, session);
            let temp_id = s.comments.temporary_id(Utc::now().timestamp_millis());
            s.comments.insert_pending_comment(Comment {
                id: temp_id,
                username: author.username.clone(),
                real_username: author.username,
                nickname: author.nickname,
                text: text.to_string(),
                created_at: Utc::now(),
                likes: 0,
                dislikes: 0,
                is_liked: false,
                is_disliked: false,
                roles: author.roles,
                verified: author.verified,
                avatar: author.avatar,
                replies: Vec::new(),
                is_pending: true,
            });
            (s.generation, anime_id, temp_id)
        };

        match self.gateway.post_comment(&token, anime_id, text).await {
            Ok(created) => {
                tracing::debug!(anime_id, comment_id = created.id, "comment posted");
                self.apply(generation, |s| {
                    s.comments.commit_comment(temp_id, &created);
                });
                Ok(created.id)
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "comment rejected");
                self.apply(generation, |s| s.comments.discard_comment(temp_id));
                Err(err.into())
            }
        }
    }

    /// Posts a reply under `comment_id`, optimistically like [`Self::submit_comment`].
    pub async fn submit_reply(&self, comment_id: i64, text: &str) -> Result<i64, PageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PageError::EmptyText);
        }
        let token = self.require_token()?;
        let session = self.storage.session_username();

        let (generation, temp_id) = {
            let mut s = self.state.lock();
            if s.comments.comment(comment_id).is_none() {
                return Err(PageError::UnknownEntry);
            }
            let author = Author::current(&s, session);
            let temp_id = s.comments.temporary_id(Utc::now().timestamp_millis());
            s.comments.insert_pending_reply(Reply {
                id: temp_id,
                parent_id: comment_id,
                username: author.username.clone(),
                real_username: author.username,
                nickname: author.nickname,
                text: text.to_string(),
                created_at: Utc::now(),
                likes: 0,
                dislikes: 0,
                is_liked: false,
                is_disliked: false,
                roles: author.roles,
                verified: author.verified,
                avatar: author.avatar,
                is_pending: true,
            });
            (s.generation, temp_id)
        };

        match self.gateway.post_reply(&token, comment_id, text).await {
            Ok(created) => {
                self.apply(generation, |s| {
                    s.comments.commit_reply(temp_id, &created);
                });
                Ok(created.id)
            }
            Err(err) => {
                tracing::warn!(comment_id, error = %err, "reply rejected");
                self.apply(generation, |s| s.comments.discard_reply(temp_id));
                Err(err.into())
            }
        }
    }

    /// Compose-box text for answering the given reply.
    pub fn reply_prefix(&self, reply_id: i64) -> Option<String> {
        self.state.lock().comments.reply(reply_id).map(reply_prefix)
    }

    pub async fn like(&self, target: EntryRef) -> Result<(), PageError> {
        self.react(target, ReactionKind::Like).await
    }

    pub async fn dislike(&self, target: EntryRef) -> Result<(), PageError> {
        self.react(target, ReactionKind::Dislike).await
    }

    /// Toggles a reaction. Presses on an entry whose previous toggle is still
    /// running are ignored.
    pub async fn react(&self, target: EntryRef, kind: ReactionKind) -> Result<(), PageError> {
        let token = self.require_token()?;
        let (generation, before) = {
            let mut s = self.state.lock();
            if s.comments.author(target).is_none() {
                return Err(PageError::UnknownEntry);
            }
            if s.comments.is_pending(target) {
                return Err(PageError::InFlight);
            }
            match s.comments.begin_reaction(target, kind) {
                Some(before) => (s.generation, before),
                None => {
                    tracing::debug!(?target, "reaction already in flight");
                    return Ok(());
                }
            }
        };

        match self.gateway.react(&token, target, kind).await {
            Ok(()) => {
                self.apply(generation, |s| s.comments.finish_reaction(target, None));
                self.notifier
                    .notify(Notification::success(before.outcome_message(kind)));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(?target, kind = kind.as_str(), error = %err, "reaction failed");
                self.apply(generation, |s| {
                    s.comments.finish_reaction(target, Some(before))
                });
                self.notifier.notify(Notification::error(failure_message(
                    &err,
                    "Could not save your reaction",
                )));
                Err(err.into())
            }
        }
    }

    /// Replaces the text of the user's own comment or reply once the server accepts it.
    pub async fn edit(&self, target: EntryRef, text: &str) -> Result<(), PageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PageError::EmptyText);
        }
        let token = self.require_token()?;
        let generation = self.owned_entry(target)?;

        match self.gateway.edit_entry(&token, target, text).await {
            Ok(()) => {
                self.apply(generation, |s| {
                    s.comments.set_text(target, text);
                });
                self.notifier.notify(Notification::success("Comment updated"));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(?target, error = %err, "edit failed");
                self.notifier.notify(Notification::error(failure_message(
                    &err,
                    "Could not update the comment",
                )));
                Err(err.into())
            }
        }
    }

    /// Checks that `target` exists and belongs to the signed-in user.
    fn owned_entry(&self, target: EntryRef) -> Result<u64, PageError> {
        let session = self.storage.session_username();
        let s = self.state.lock();
        let author = s.comments.author(target).ok_or(PageError::UnknownEntry)?;
        if !is_owner(author, session.as_deref()) {
            return Err(PageError::NotOwner);
        }
        Ok(s.generation)
    }

    pub fn open_delete(&self, target: EntryRef) -> Result<(), PageError> {
        self.owned_entry(target)?;
        self.state.lock().delete.open(target)?;
        Ok(())
    }

    /// Stores the token produced by the human-verification widget.
    pub fn verify_delete(&self, captcha_token: &str) -> Result<(), PageError> {
        self.state.lock().delete.verify(captcha_token)?;
        Ok(())
    }

    pub fn cancel_delete(&self) -> Result<(), PageError> {
        self.state.lock().delete.close()?;
        Ok(())
    }

    pub async fn confirm_delete(&self) -> Result<(), PageError> {
        let token = self.require_token()?;
        let (generation, target, captcha) = {
            let mut s = self.state.lock();
            let (target, captcha) = s.delete.begin()?;
            (s.generation, target, captcha)
        };

        let result = self.gateway.delete_entry(&token, target, &captcha).await;
        let deleted = result.is_ok();
        self.apply(generation, |s| {
            if deleted {
                s.comments.remove(target);
            }
            s.delete.finish(deleted);
        });

        match result {
            Ok(()) => {
                tracing::info!(?target, "entry deleted");
                self.notifier.notify(Notification::success("Comment deleted"));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(?target, error = %err, "delete failed");
                self.notifier.notify(Notification::error(failure_message(
                    &err,
                    "Could not delete the comment",
                )));
                Err(err.into())
            }
        }
    }
}
