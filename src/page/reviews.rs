use super::{AnimePage, BulkLoad, LoadSlot};
use crate::comments::is_owner;
use crate::error::PageError;
use crate::gateway::AnimeGateway;
use crate::notify::{Notification, Notifier};
use crate::storage::ClientStorage;
use crate::types::{Review, Tab};

impl<G, S, N> AnimePage<G, S, N>
where
    G: AnimeGateway,
    S: ClientStorage,
    N: Notifier,
{
    pub async fn load_reviews(&self) {
        let Some((generation, anime_id)) = self.begin_load(BulkLoad::Reviews) else {
            return;
        };
        let token = self.storage.auth_token();
        let session = self.storage.session_username();
        let result = self.gateway.reviews(anime_id, token.as_deref()).await;
        self.apply(generation, |s| match result {
            Ok(mut list) => {
                for review in &mut list.reviews {
                    review.is_own |= is_owner(&review.real_username, session.as_deref());
                }
                s.reviews = list;
                s.reviews_slot = LoadSlot::Loaded;
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "failed to load reviews");
                s.reviews_slot = LoadSlot::Idle;
            }
        });
    }

    /// Rates the anime 1..=5 with an optional text review.
    pub async fn submit_review(&self, rating: u8, content: Option<&str>) -> Result<(), PageError> {
        if !(1..=5).contains(&rating) {
            return Err(PageError::InvalidRating(rating));
        }
        let token = self.require_token()?;
        let (generation, anime_id) = self.begin_review_change()?;
        let content = content.map(str::trim).filter(|c| !c.is_empty());

        let result = self.gateway.rate(&token, anime_id, rating, content).await;
        let saved = result.is_ok();
        let session = self.storage.session_username();
        self.apply(generation, |s| {
            s.review_saving = false;
            if !saved {
                return;
            }
            s.reviews.my_rating = Some(rating);
            s.reviews.my_comment = content.map(str::to_string);
            match s.reviews.reviews.iter_mut().find(|r| r.is_own) {
                Some(own) => {
                    own.rating = rating;
                    own.content = content.map(str::to_string);
                }
                None => {
                    let (username, nickname) = match &s.profile {
                        Some(profile) => (profile.username.clone(), profile.nickname.clone()),
                        None => (session.clone().unwrap_or_default(), None),
                    };
                    s.reviews.reviews.insert(
                        0,
                        Review {
                            id: 0,
                            real_username: username.clone(),
                            username,
                            nickname,
                            rating,
                            content: content.map(str::to_string),
                            is_own: true,
                        },
                    );
                }
            }
        });

        match result {
            Ok(()) => {
                tracing::info!(anime_id, rating, "review saved");
                self.notifier.notify(Notification::success("Review saved"));
                self.after_review_change(generation, anime_id).await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "review rejected");
                self.notifier
                    .notify(Notification::error("Could not save your review"));
                Err(err.into())
            }
        }
    }

    pub async fn delete_review(&self) -> Result<(), PageError> {
        let token = self.require_token()?;
        let (generation, anime_id) = self.begin_review_change()?;

        let result = self.gateway.delete_rating(&token, anime_id).await;
        let deleted = result.is_ok();
        self.apply(generation, |s| {
            s.review_saving = false;
            if deleted {
                s.reviews.reviews.retain(|r| !r.is_own);
                s.reviews.my_rating = None;
                s.reviews.my_comment = None;
            }
        });

        match result {
            Ok(()) => {
                tracing::info!(anime_id, "review deleted");
                self.notifier.notify(Notification::success("Review deleted"));
                self.after_review_change(generation, anime_id).await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "review delete failed");
                self.notifier
                    .notify(Notification::error("Could not delete your review"));
                Err(err.into())
            }
        }
    }

    fn begin_review_change(&self) -> Result<(u64, i64), PageError> {
        let mut s = self.state.lock();
        let anime_id = s.anime_id.ok_or(PageError::NotLoaded)?;
        if !s.reviews_enabled() {
            return Err(PageError::TabUnavailable(Tab::Reviews));
        }
        if s.review_saving {
            return Err(PageError::InFlight);
        }
        s.review_saving = true;
        Ok((s.generation, anime_id))
    }

    async fn after_review_change(&self, generation: u64, anime_id: i64) {
        tokio::join!(
            self.refresh_review_count(generation, anime_id),
            self.refresh_average(generation, anime_id, true),
        );
    }

    pub fn is_review_saving(&self) -> bool {
        self.state.lock().review_saving
    }
}
