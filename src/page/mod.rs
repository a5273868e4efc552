//! State of one anime detail page.
//!
//! [`AnimePage`] owns everything the page shows apart from the episode
//! catalog. State sits behind a mutex that is only held for synchronous
//! sections, so front-ends may run several operations at once; in-flight
//! guards decide which of them actually reach the network.

use parking_lot::Mutex;

use crate::comments::{CommentTree, is_owner};
use crate::delete_confirm::{DeleteConfirmation, DeleteState};
use crate::error::{LoadError, PageError};
use crate::gateway::{AnimeGateway, EntryRef};
use crate::links::{PageLocation, WatchContext};
use crate::notify::{Notification, Notifier};
use crate::source_flow::SourceFlow;
use crate::storage::ClientStorage;
use crate::types::{
    Accessibility, AnimeRecord, CollectionStatus, Comment, ReviewList, Screenshot, Tab,
    UserProfile, WatchStatus,
};

mod comments;
mod reviews;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(LoadError),
}

/// Progress of one lazily loaded collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadSlot {
    #[default]
    Idle,
    InFlight,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkLoad {
    Screenshots,
    Reviews,
    Comments,
}

/// Status and favorite of a sibling season, shown instead of the page's own
/// while that season is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonOverride {
    pub season_id: i64,
    pub title: String,
    pub collection: CollectionStatus,
}

#[derive(Debug)]
struct PageState {
    generation: u64,
    anime_id: Option<i64>,
    load: LoadState,
    anime: Option<AnimeRecord>,
    accessibility: Accessibility,
    location: PageLocation,
    active_tab: Tab,
    screenshots: Vec<Screenshot>,
    screenshots_slot: LoadSlot,
    reviews: ReviewList,
    reviews_slot: LoadSlot,
    review_saving: bool,
    comments: CommentTree,
    comments_slot: LoadSlot,
    average_rating: Option<f32>,
    review_count: u32,
    collection: CollectionStatus,
    season_override: Option<SeasonOverride>,
    season_epoch: u64,
    profile: Option<UserProfile>,
    status_menu_open: bool,
    status_saving: bool,
    source_modal_open: bool,
    delete: DeleteConfirmation,
}

impl PageState {
    fn new(location: PageLocation) -> Self {
        let active_tab = location.tab();
        Self {
            generation: 0,
            anime_id: None,
            load: LoadState::Idle,
            anime: None,
            accessibility: Accessibility::open(),
            location,
            active_tab,
            screenshots: Vec::new(),
            screenshots_slot: LoadSlot::Idle,
            reviews: ReviewList::default(),
            reviews_slot: LoadSlot::Idle,
            review_saving: false,
            comments: CommentTree::default(),
            comments_slot: LoadSlot::Idle,
            average_rating: None,
            review_count: 0,
            collection: CollectionStatus::default(),
            season_override: None,
            season_epoch: 0,
            profile: None,
            status_menu_open: false,
            status_saving: false,
            source_modal_open: false,
            delete: DeleteConfirmation::default(),
        }
    }

    /// Drops everything tied to the previous anime and returns the new generation.
    fn reset(&mut self, anime_id: i64) -> u64 {
        let location = self.location.clone();
        let generation = self.generation + 1;
        *self = PageState::new(location);
        self.generation = generation;
        self.anime_id = Some(anime_id);
        self.load = LoadState::Loading;
        generation
    }

    fn reviews_enabled(&self) -> bool {
        self.anime
            .as_ref()
            .is_none_or(|anime| anime.status.accepts_ratings())
    }

    fn slot_mut(&mut self, kind: BulkLoad) -> &mut LoadSlot {
        match kind {
            BulkLoad::Screenshots => &mut self.screenshots_slot,
            BulkLoad::Reviews => &mut self.reviews_slot,
            BulkLoad::Comments => &mut self.comments_slot,
        }
    }

    /// Anime id collection mutations go to: the selected season, else the page's own.
    fn collection_target(&self) -> Option<i64> {
        match &self.season_override {
            Some(season) => Some(season.season_id),
            None => self.anime_id,
        }
    }

    fn collection_for_mut(&mut self, anime_id: i64) -> Option<&mut CollectionStatus> {
        if let Some(season) = &mut self.season_override {
            if season.season_id == anime_id {
                return Some(&mut season.collection);
            }
        }
        if self.anime_id == Some(anime_id) {
            return Some(&mut self.collection);
        }
        None
    }

    fn collection_title(&self, anime_id: i64) -> String {
        match &self.season_override {
            Some(season) if season.season_id == anime_id => season.title.clone(),
            _ => self
                .anime
                .as_ref()
                .map(|a| a.title.clone())
                .unwrap_or_default(),
        }
    }
}

pub struct AnimePage<G, S, N> {
    gateway: G,
    storage: S,
    notifier: N,
    state: Mutex<PageState>,
}

impl<G, S, N> AnimePage<G, S, N>
where
    G: AnimeGateway,
    S: ClientStorage,
    N: Notifier,
{
    pub fn new(gateway: G, storage: S, notifier: N, location: PageLocation) -> Self {
        Self {
            gateway,
            storage,
            notifier,
            state: Mutex::new(PageState::new(location)),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Loads `anime_id` from scratch. Responses still arriving for an earlier
    /// call are discarded.
    pub async fn initialize(&self, anime_id: i64) -> Result<(), LoadError> {
        let generation = self.state.lock().reset(anime_id);
        tracing::debug!(anime_id, generation, "loading anime");

        let (anime, accessibility) = tokio::join!(
            self.gateway.anime(anime_id),
            self.gateway.accessibility(anime_id)
        );
        let anime = match anime {
            Ok(anime) => anime,
            Err(err) => {
                let load_error = LoadError::from(&err);
                tracing::warn!(anime_id, error = %err, "failed to load anime");
                self.apply(generation, |s| s.load = LoadState::Failed(load_error));
                return Err(load_error);
            }
        };
        let accessibility = accessibility.unwrap_or_else(|err| {
            tracing::warn!(anime_id, error = %err, "accessibility check failed");
            Accessibility::open()
        });
        let accepts_ratings = anime.status.accepts_ratings();

        let mut initial_tab = Tab::default();
        let applied = self.apply(generation, |s| {
            s.anime = Some(anime);
            s.accessibility = accessibility;
            s.load = LoadState::Ready;
            if !s.reviews_enabled() && s.active_tab == Tab::Reviews {
                s.active_tab = Tab::default();
                s.location.set_tab(Tab::default());
            }
            initial_tab = s.active_tab;
        });
        if !applied {
            return Ok(());
        }

        let token = self.storage.auth_token();
        tokio::join!(
            self.refresh_review_count(generation, anime_id),
            self.refresh_average(generation, anime_id, accepts_ratings),
            self.load_comments(),
            self.load_personal(generation, anime_id, token.as_deref()),
            self.load_for_tab(initial_tab),
        );
        Ok(())
    }

    /// Runs `f` only if no newer `initialize` happened since `generation`.
    fn apply(&self, generation: u64, f: impl FnOnce(&mut PageState)) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(generation, "discarding stale response");
            return false;
        }
        f(&mut state);
        true
    }

    fn require_token(&self) -> Result<String, PageError> {
        match self.storage.auth_token() {
            Some(token) => Ok(token),
            None => {
                self.notifier.notify(Notification::auth_prompt());
                Err(PageError::AuthRequired)
            }
        }
    }

    async fn refresh_review_count(&self, generation: u64, anime_id: i64) {
        match self.gateway.review_count(anime_id).await {
            Ok(count) => {
                self.apply(generation, |s| s.review_count = count);
            }
            Err(err) => tracing::warn!(anime_id, error = %err, "review count unavailable"),
        }
    }

    async fn refresh_average(&self, generation: u64, anime_id: i64, accepts_ratings: bool) {
        if !accepts_ratings {
            return;
        }
        match self.gateway.average_rating(anime_id).await {
            Ok(average) => {
                self.apply(generation, |s| s.average_rating = average);
            }
            Err(err) => tracing::warn!(anime_id, error = %err, "average rating unavailable"),
        }
    }

    async fn load_personal(&self, generation: u64, anime_id: i64, token: Option<&str>) {
        let Some(token) = token else {
            return;
        };
        let (status, favorites, profile) = tokio::join!(
            self.gateway.collection_status(token, anime_id),
            self.gateway.favorites(token),
            self.gateway.profile(token)
        );
        self.apply(generation, |s| {
            match status {
                Ok(status) => s.collection.status = status,
                Err(err) => tracing::warn!(anime_id, error = %err, "collection status unavailable"),
            }
            match favorites {
                Ok(ids) => s.collection.favorite = ids.contains(&anime_id),
                Err(err) => tracing::warn!(error = %err, "favorites unavailable"),
            }
            match profile {
                Ok(profile) => s.profile = Some(profile),
                Err(err) => tracing::warn!(error = %err, "profile unavailable"),
            }
        });
    }

    /// Switches tabs, mirrors the choice into the URL and lazily loads the tab's data.
    pub async fn set_active_tab(&self, tab: Tab) -> Result<(), PageError> {
        {
            let mut s = self.state.lock();
            if tab == Tab::Reviews && !s.reviews_enabled() {
                return Err(PageError::TabUnavailable(tab));
            }
            s.active_tab = tab;
            s.location.set_tab(tab);
        }
        self.load_for_tab(tab).await;
        Ok(())
    }

    async fn load_for_tab(&self, tab: Tab) {
        match tab {
            Tab::Screenshots => self.load_screenshots().await,
            Tab::Reviews => self.load_reviews().await,
            Tab::Comments => self.load_comments().await,
            _ => {}
        }
    }

    /// Claims the load slot; `None` when already loaded or loading.
    fn begin_load(&self, kind: BulkLoad) -> Option<(u64, i64)> {
        let mut s = self.state.lock();
        let anime_id = s.anime_id?;
        let generation = s.generation;
        let slot = s.slot_mut(kind);
        if *slot != LoadSlot::Idle {
            return None;
        }
        *slot = LoadSlot::InFlight;
        Some((generation, anime_id))
    }

    pub async fn load_screenshots(&self) {
        let Some((generation, anime_id)) = self.begin_load(BulkLoad::Screenshots) else {
            return;
        };
        let result = self.gateway.screenshots(anime_id).await;
        self.apply(generation, |s| match result {
            Ok(screenshots) => {
                s.screenshots = screenshots;
                s.screenshots_slot = LoadSlot::Loaded;
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "failed to load screenshots");
                s.screenshots_slot = LoadSlot::Idle;
            }
        });
    }

    pub async fn load_comments(&self) {
        let Some((generation, anime_id)) = self.begin_load(BulkLoad::Comments) else {
            return;
        };
        let token = self.storage.auth_token();
        let result = self.gateway.comments(anime_id, token.as_deref()).await;
        self.apply(generation, |s| match result {
            Ok(comments) => {
                tracing::debug!(anime_id, count = comments.len(), "comments loaded");
                s.comments.replace_all(comments);
                s.comments_slot = LoadSlot::Loaded;
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "failed to load comments");
                s.comments_slot = LoadSlot::Idle;
            }
        });
    }

    pub async fn toggle_favorite(&self) -> Result<bool, PageError> {
        let token = self.require_token()?;
        let (generation, target_id, title, favorite) = {
            let mut s = self.state.lock();
            let target_id = s.collection_target().ok_or(PageError::NotLoaded)?;
            let title = s.collection_title(target_id);
            let generation = s.generation;
            let collection = s
                .collection_for_mut(target_id)
                .ok_or(PageError::NotLoaded)?;
            collection.favorite = !collection.favorite;
            (generation, target_id, title, collection.favorite)
        };

        let result = if favorite {
            self.gateway.add_favorite(&token, target_id).await
        } else {
            self.gateway.remove_favorite(&token, target_id).await
        };

        match result {
            Ok(()) => {
                tracing::info!(anime_id = target_id, favorite, "favorite updated");
                let message = if favorite {
                    format!("\"{title}\" added to favorites")
                } else {
                    format!("\"{title}\" removed from favorites")
                };
                self.notifier.notify(Notification::success(message));
                Ok(favorite)
            }
            Err(err) => {
                tracing::warn!(anime_id = target_id, error = %err, "favorite update failed");
                self.apply(generation, |s| {
                    if let Some(collection) = s.collection_for_mut(target_id) {
                        collection.favorite = !favorite;
                    }
                });
                self.notifier
                    .notify(Notification::error("Could not update favorites"));
                Err(err.into())
            }
        }
    }

    /// Saves the watch status. Nothing is applied locally until the server accepts it.
    pub async fn select_status(&self, value: WatchStatus) -> Result<(), PageError> {
        self.state.lock().status_menu_open = false;
        let token = self.require_token()?;
        let (generation, target_id) = {
            let mut s = self.state.lock();
            if s.status_saving {
                return Err(PageError::InFlight);
            }
            let target_id = s.collection_target().ok_or(PageError::NotLoaded)?;
            s.status_saving = true;
            (s.generation, target_id)
        };

        let result = if value == WatchStatus::None {
            self.gateway
                .remove_collection_status(&token, target_id)
                .await
        } else {
            self.gateway
                .set_collection_status(&token, target_id, value)
                .await
        };

        let saved = result.is_ok();
        self.apply(generation, |s| {
            s.status_saving = false;
            if saved {
                if let Some(collection) = s.collection_for_mut(target_id) {
                    collection.status = value;
                }
            }
        });

        match result {
            Ok(()) => {
                tracing::info!(anime_id = target_id, status = value.as_str(), "status saved");
                let message = if value == WatchStatus::None {
                    String::from("Removed from your list")
                } else {
                    format!("Status set to {}", value.label())
                };
                self.notifier.notify(Notification::success(message));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(anime_id = target_id, error = %err, "status update failed");
                let message = err
                    .server_message()
                    .map(|m| format!("Could not update status: {m}"))
                    .unwrap_or_else(|| String::from("Could not update status"));
                self.notifier.notify(Notification::error(message));
                Err(err.into())
            }
        }
    }

    pub fn open_status_menu(&self) {
        self.state.lock().status_menu_open = true;
    }

    pub fn close_status_menu(&self) {
        self.state.lock().status_menu_open = false;
    }

    /// Shows the status/favorite of a sibling season instead of the page's own.
    /// Selecting the page's own id clears the override.
    pub async fn select_season(&self, season_id: i64, title: &str) -> Result<(), PageError> {
        let (generation, epoch) = {
            let mut s = self.state.lock();
            let own_id = s.anime_id.ok_or(PageError::NotLoaded)?;
            s.season_epoch += 1;
            if season_id == own_id {
                s.season_override = None;
                return Ok(());
            }
            (s.generation, s.season_epoch)
        };

        let mut collection = CollectionStatus::default();
        if let Some(token) = self.storage.auth_token() {
            let (status, favorites) = tokio::join!(
                self.gateway.collection_status(&token, season_id),
                self.gateway.favorites(&token)
            );
            match status {
                Ok(status) => collection.status = status,
                Err(err) => tracing::warn!(season_id, error = %err, "season status unavailable"),
            }
            match favorites {
                Ok(ids) => collection.favorite = ids.contains(&season_id),
                Err(err) => tracing::warn!(season_id, error = %err, "favorites unavailable"),
            }
        }

        self.apply(generation, |s| {
            // A later selection owns the override now.
            if s.season_epoch != epoch {
                tracing::debug!(season_id, "discarding superseded season selection");
                return;
            }
            s.season_override = Some(SeasonOverride {
                season_id,
                title: title.to_string(),
                collection,
            });
        });
        Ok(())
    }

    /// Opens source selection when the title can be watched here.
    pub fn request_watch(&self) -> Option<SourceFlow> {
        let mut s = self.state.lock();
        let anime = s.anime.as_ref()?;
        if !anime.opened || !s.accessibility.accessible {
            return None;
        }
        let flow = SourceFlow::new(WatchContext::from(anime));
        s.source_modal_open = true;
        Some(flow)
    }

    pub fn close_source_flow(&self) {
        self.state.lock().source_modal_open = false;
    }

    pub fn load_state(&self) -> LoadState {
        self.state.lock().load
    }

    pub fn anime(&self) -> Option<AnimeRecord> {
        self.state.lock().anime.clone()
    }

    pub fn accessibility(&self) -> Accessibility {
        self.state.lock().accessibility.clone()
    }

    pub fn location(&self) -> PageLocation {
        self.state.lock().location.clone()
    }

    pub fn active_tab(&self) -> Tab {
        self.state.lock().active_tab
    }

    pub fn available_tabs(&self) -> Vec<Tab> {
        let s = self.state.lock();
        Tab::ALL
            .into_iter()
            .filter(|tab| *tab != Tab::Reviews || s.reviews_enabled())
            .collect()
    }

    pub fn screenshots(&self) -> Vec<Screenshot> {
        self.state.lock().screenshots.clone()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.state.lock().comments.comments().to_vec()
    }

    pub fn comment_count(&self) -> usize {
        self.state.lock().comments.total_count()
    }

    pub fn reviews(&self) -> ReviewList {
        self.state.lock().reviews.clone()
    }

    pub fn review_count(&self) -> u32 {
        self.state.lock().review_count
    }

    pub fn average_rating(&self) -> Option<f32> {
        self.state.lock().average_rating
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.lock().profile.clone()
    }

    /// The page's own status and favorite, ignoring any season override.
    pub fn collection(&self) -> CollectionStatus {
        self.state.lock().collection
    }

    pub fn season_override(&self) -> Option<SeasonOverride> {
        self.state.lock().season_override.clone()
    }

    pub fn effective_collection(&self) -> CollectionStatus {
        let s = self.state.lock();
        s.season_override
            .as_ref()
            .map(|season| season.collection)
            .unwrap_or(s.collection)
    }

    pub fn is_status_menu_open(&self) -> bool {
        self.state.lock().status_menu_open
    }

    pub fn is_status_saving(&self) -> bool {
        self.state.lock().status_saving
    }

    pub fn is_source_flow_open(&self) -> bool {
        self.state.lock().source_modal_open
    }

    pub fn delete_state(&self) -> DeleteState {
        self.state.lock().delete.state().clone()
    }

    /// Whether the signed-in user wrote the given comment or reply.
    pub fn can_modify(&self, target: EntryRef) -> bool {
        let session = self.storage.session_username();
        let s = self.state.lock();
        s.comments
            .author(target)
            .is_some_and(|author| is_owner(author, session.as_deref()))
    }
}
