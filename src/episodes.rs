//! Episode lists from both providers, their progress overlays, and the
//! season switcher with its restore cache.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use url::Url;

use crate::gateway::EpisodeGateway;
use crate::links::{LinkBuilder, WatchContext};
use crate::progress::{ProgressCache, ProgressKey};
use crate::storage::ClientStorage;
use crate::types::{
    EpisodeProgress, FranchiseItem, Provider, ReleaseEpisode, VoiceEpisode, VoiceTrack,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct ProviderAState {
    available: bool,
    voices: Vec<VoiceTrack>,
    selected_voice: Option<VoiceTrack>,
    episodes: Vec<VoiceEpisode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ProviderBState {
    available: bool,
    alias: Option<String>,
    episodes: Vec<ReleaseEpisode>,
    /// Server-side watched seconds by ordinal.
    watched: HashMap<u32, u32>,
}

/// Provider state of the page's own season, kept while a sibling is shown.
#[derive(Debug, Clone)]
struct SeasonSnapshot {
    provider_a: ProviderAState,
    provider_b: ProviderBState,
}

#[derive(Debug, Default)]
struct CatalogState {
    own_id: Option<i64>,
    season_id: Option<i64>,
    generation: u64,
    load_epoch: u64,
    /// The own season's providers are filled in and safe to snapshot.
    own_loaded: bool,
    provider_a: ProviderAState,
    provider_b: ProviderBState,
    source: Option<Provider>,
    restore: Option<SeasonSnapshot>,
    franchise: Vec<FranchiseItem>,
    voice_changing: bool,
}

impl CatalogState {
    fn available(&self, provider: Provider) -> bool {
        match provider {
            Provider::A => self.provider_a.available,
            Provider::B => self.provider_b.available,
        }
    }

    /// User choice if still valid, else Provider B, else Provider A.
    fn active_provider(&self) -> Option<Provider> {
        self.source
            .filter(|p| self.available(*p))
            .or_else(|| self.available(Provider::B).then_some(Provider::B))
            .or_else(|| self.available(Provider::A).then_some(Provider::A))
    }
}

/// One episode of whichever provider is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeEntry<'a> {
    ProviderA(&'a VoiceEpisode),
    ProviderB(&'a ReleaseEpisode),
}

impl EpisodeEntry<'_> {
    /// Episode number for Provider A, ordinal for Provider B.
    pub fn number(&self) -> u32 {
        match self {
            EpisodeEntry::ProviderA(ep) => ep.number,
            EpisodeEntry::ProviderB(ep) => ep.ordinal,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            EpisodeEntry::ProviderA(ep) => ep.title.as_deref(),
            EpisodeEntry::ProviderB(ep) => ep.name.as_deref(),
        }
    }

    pub fn duration_seconds(&self) -> u32 {
        match self {
            EpisodeEntry::ProviderA(ep) => ep.duration_seconds,
            EpisodeEntry::ProviderB(ep) => ep.duration_seconds,
        }
    }

    pub fn thumbnail(&self) -> Option<&str> {
        match self {
            EpisodeEntry::ProviderA(ep) => ep.thumbnail.as_deref(),
            EpisodeEntry::ProviderB(ep) => ep.preview.as_deref(),
        }
    }
}

/// The episode list of one provider for the displayed season, with its
/// progress overlay keyed by episode number or ordinal.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeSource {
    ProviderA {
        anime_id: i64,
        voices: Vec<VoiceTrack>,
        voice: VoiceTrack,
        episodes: Vec<VoiceEpisode>,
        progress: BTreeMap<u32, EpisodeProgress>,
    },
    ProviderB {
        anime_id: i64,
        alias: String,
        episodes: Vec<ReleaseEpisode>,
        progress: BTreeMap<u32, EpisodeProgress>,
    },
}

impl EpisodeSource {
    pub fn provider(&self) -> Provider {
        match self {
            EpisodeSource::ProviderA { .. } => Provider::A,
            EpisodeSource::ProviderB { .. } => Provider::B,
        }
    }

    pub fn anime_id(&self) -> i64 {
        match self {
            EpisodeSource::ProviderA { anime_id, .. } | EpisodeSource::ProviderB { anime_id, .. } => {
                *anime_id
            }
        }
    }

    pub fn entries(&self) -> Vec<EpisodeEntry<'_>> {
        match self {
            EpisodeSource::ProviderA { episodes, .. } => {
                episodes.iter().map(EpisodeEntry::ProviderA).collect()
            }
            EpisodeSource::ProviderB { episodes, .. } => {
                episodes.iter().map(EpisodeEntry::ProviderB).collect()
            }
        }
    }

    pub fn progress_for(&self, entry: &EpisodeEntry<'_>) -> Option<EpisodeProgress> {
        let progress = match self {
            EpisodeSource::ProviderA { progress, .. } | EpisodeSource::ProviderB { progress, .. } => {
                progress
            }
        };
        progress.get(&entry.number()).copied()
    }

    /// Watch URL for an entry of this source; `None` for an entry of the other provider.
    pub fn deep_link_for(
        &self,
        entry: &EpisodeEntry<'_>,
        links: &LinkBuilder,
        ctx: &WatchContext,
    ) -> Option<Url> {
        match (self, entry) {
            (EpisodeSource::ProviderA { anime_id, voice, .. }, EpisodeEntry::ProviderA(ep)) => {
                Some(links.voice_episode(ctx, *anime_id, voice.id, ep.id, ep.number))
            }
            (EpisodeSource::ProviderB { anime_id, alias, .. }, EpisodeEntry::ProviderB(ep)) => {
                Some(links.release_episode(ctx, *anime_id, alias, Some(ep.ordinal)))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeView {
    /// Neither provider has episodes; the front-end offers the legacy player
    /// through the page's watch action instead.
    Empty,
    Single(EpisodeSource),
    /// Both providers are available and the user may toggle between them.
    Switchable(EpisodeSource),
}

pub struct EpisodeCatalog<G, S> {
    gateway: G,
    storage: S,
    progress: ProgressCache,
    state: Mutex<CatalogState>,
}

impl<G, S> EpisodeCatalog<G, S>
where
    G: EpisodeGateway,
    S: ClientStorage,
{
    pub fn new(gateway: G, storage: S, progress: ProgressCache) -> Self {
        Self {
            gateway,
            storage,
            progress,
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Loads both providers and the franchise chain for the page's own anime.
    pub async fn load(&self, own_id: i64) {
        let (generation, load_epoch) = {
            let mut s = self.state.lock();
            let generation = s.generation + 1;
            let load_epoch = s.load_epoch + 1;
            *s = CatalogState {
                own_id: Some(own_id),
                season_id: Some(own_id),
                generation,
                load_epoch,
                ..CatalogState::default()
            };
            (generation, load_epoch)
        };

        let (provider_a, provider_b, franchise) = tokio::join!(
            self.fetch_provider_a(own_id),
            self.fetch_provider_b(own_id),
            self.gateway.franchise_chain(own_id)
        );
        let franchise = franchise.unwrap_or_else(|err| {
            tracing::warn!(anime_id = own_id, error = %err, "franchise chain unavailable");
            Vec::new()
        });

        let mut s = self.state.lock();
        if s.load_epoch != load_epoch {
            tracing::debug!(anime_id = own_id, "discarding stale episode load");
            return;
        }
        s.franchise = franchise;
        if s.generation == generation {
            s.provider_a = provider_a;
            s.provider_b = provider_b;
            s.own_loaded = true;
        } else if s.restore.is_none() {
            // The season changed mid-load; keep the own season for the way back.
            s.restore = Some(SeasonSnapshot {
                provider_a,
                provider_b,
            });
        }
    }

    async fn fetch_provider_a(&self, anime_id: i64) -> ProviderAState {
        let voices = match self.gateway.voice_tracks(anime_id).await {
            Ok(voices) => voices,
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "provider A unavailable");
                return ProviderAState::default();
            }
        };
        let Some(first) = voices.first().cloned() else {
            tracing::debug!(anime_id, "provider A has no voice tracks");
            return ProviderAState::default();
        };
        match self.gateway.voice_episodes(first.id).await {
            Ok(mut episodes) => {
                episodes.sort_by_key(|e| e.number);
                ProviderAState {
                    available: !episodes.is_empty(),
                    voices,
                    selected_voice: Some(first),
                    episodes,
                }
            }
            Err(err) => {
                tracing::warn!(anime_id, voice_id = first.id, error = %err, "provider A episodes unavailable");
                ProviderAState::default()
            }
        }
    }

    async fn fetch_provider_b(&self, anime_id: i64) -> ProviderBState {
        let release = match self.gateway.release(anime_id).await {
            Ok(Some(release)) if !release.episodes.is_empty() => release,
            Ok(_) => {
                tracing::debug!(anime_id, "provider B has no release");
                return ProviderBState::default();
            }
            Err(err) => {
                tracing::warn!(anime_id, error = %err, "provider B unavailable");
                return ProviderBState::default();
            }
        };

        let mut watched = HashMap::new();
        if let Some(token) = self.storage.auth_token() {
            match self.gateway.release_progress(&token, anime_id).await {
                Ok(entries) => {
                    watched.extend(entries.into_iter().map(|p| (p.ordinal, p.watched_seconds)));
                }
                Err(err) => tracing::warn!(anime_id, error = %err, "provider B progress unavailable"),
            }
        }

        let mut episodes = release.episodes;
        episodes.sort_by_key(|e| e.ordinal);
        ProviderBState {
            available: true,
            alias: Some(release.alias),
            episodes,
            watched,
        }
    }

    /// Shows a sibling season. Returning to the page's own season restores it
    /// from the cache without touching the network.
    pub async fn switch_season(&self, season_id: i64) {
        let generation = {
            let mut s = self.state.lock();
            let Some(own_id) = s.own_id else {
                return;
            };
            if s.season_id == Some(season_id) {
                return;
            }
            if s.restore.is_none() && s.own_loaded && s.season_id == Some(own_id) {
                s.restore = Some(SeasonSnapshot {
                    provider_a: s.provider_a.clone(),
                    provider_b: s.provider_b.clone(),
                });
            }
            s.generation += 1;
            s.season_id = Some(season_id);
            s.source = None;
            s.voice_changing = false;

            if season_id == own_id {
                if let Some(snapshot) = s.restore.clone() {
                    tracing::debug!(anime_id = own_id, "restored own season from cache");
                    s.provider_a = snapshot.provider_a;
                    s.provider_b = snapshot.provider_b;
                    return;
                }
            }
            s.provider_a = ProviderAState::default();
            s.provider_b = ProviderBState::default();
            s.generation
        };

        let (provider_a, provider_b) = tokio::join!(
            self.fetch_provider_a(season_id),
            self.fetch_provider_b(season_id)
        );

        let mut s = self.state.lock();
        if s.generation != generation {
            tracing::debug!(season_id, "discarding stale season load");
            return;
        }
        s.provider_a = provider_a;
        s.provider_b = provider_b;
        if s.own_id == Some(season_id) {
            s.own_loaded = true;
        }
    }

    /// Switches the Provider A voice track. Ignored while another switch is
    /// running or when `voice_id` is already selected.
    pub async fn select_voice(&self, voice_id: i64) -> bool {
        let (generation, voice) = {
            let mut s = self.state.lock();
            if s.voice_changing {
                return false;
            }
            if s.provider_a.selected_voice.as_ref().map(|v| v.id) == Some(voice_id) {
                return false;
            }
            let Some(voice) = s.provider_a.voices.iter().find(|v| v.id == voice_id).cloned() else {
                return false;
            };
            s.voice_changing = true;
            (s.generation, voice)
        };

        let result = self.gateway.voice_episodes(voice_id).await;

        let mut s = self.state.lock();
        if s.generation != generation {
            return false;
        }
        s.voice_changing = false;
        match result {
            Ok(mut episodes) => {
                episodes.sort_by_key(|e| e.number);
                tracing::debug!(voice_id, count = episodes.len(), "voice track switched");
                s.provider_a.selected_voice = Some(voice);
                s.provider_a.episodes = episodes;
                true
            }
            Err(err) => {
                tracing::warn!(voice_id, error = %err, "voice track episodes unavailable");
                false
            }
        }
    }

    /// Chooses which provider to show when both are available.
    pub fn set_source(&self, provider: Provider) -> bool {
        let mut s = self.state.lock();
        if !s.available(provider) {
            return false;
        }
        s.source = Some(provider);
        true
    }

    pub fn view(&self) -> EpisodeView {
        let s = self.state.lock();
        let (Some(anime_id), Some(provider)) = (s.season_id, s.active_provider()) else {
            return EpisodeView::Empty;
        };
        let Some(source) = self.source_for(&s, anime_id, provider) else {
            return EpisodeView::Empty;
        };
        if s.provider_a.available && s.provider_b.available {
            EpisodeView::Switchable(source)
        } else {
            EpisodeView::Single(source)
        }
    }

    fn source_for(&self, s: &CatalogState, anime_id: i64, provider: Provider) -> Option<EpisodeSource> {
        match provider {
            Provider::A => {
                let a = &s.provider_a;
                let voice = a.selected_voice.clone()?;
                let progress = a
                    .episodes
                    .iter()
                    .filter_map(|ep| {
                        let entry = self.progress.lookup(ProgressKey {
                            anime_id,
                            provider: Provider::A,
                            voice: Some(&voice.name),
                            episode: ep.number,
                        })?;
                        Some((
                            ep.number,
                            EpisodeProgress::new(entry.watched_seconds, ep.duration_seconds),
                        ))
                    })
                    .collect();
                Some(EpisodeSource::ProviderA {
                    anime_id,
                    voices: a.voices.clone(),
                    voice,
                    episodes: a.episodes.clone(),
                    progress,
                })
            }
            Provider::B => {
                let b = &s.provider_b;
                let progress = b
                    .episodes
                    .iter()
                    .filter_map(|ep| {
                        let watched = b.watched.get(&ep.ordinal)?;
                        Some((ep.ordinal, EpisodeProgress::new(*watched, ep.duration_seconds)))
                    })
                    .collect();
                Some(EpisodeSource::ProviderB {
                    anime_id,
                    alias: b.alias.clone()?,
                    episodes: b.episodes.clone(),
                    progress,
                })
            }
        }
    }

    pub fn franchise(&self) -> Vec<FranchiseItem> {
        self.state.lock().franchise.clone()
    }

    /// Anime id whose episodes are currently shown.
    pub fn season_id(&self) -> Option<i64> {
        self.state.lock().season_id
    }

    pub fn is_voice_changing(&self) -> bool {
        self.state.lock().voice_changing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEntry;
    use crate::storage::MemoryStorage;
    use crate::testing::FakeGateway;
    use crate::types::ReleaseProgress;
    use chrono::Utc;

    fn catalog(gateway: &FakeGateway, progress: ProgressCache) -> EpisodeCatalog<FakeGateway, MemoryStorage> {
        EpisodeCatalog::new(gateway.clone(), MemoryStorage::signed_in("alice", "tok"), progress)
    }

    fn seed_both(gateway: &FakeGateway, anime_id: i64) {
        gateway.set_voices(anime_id, vec![FakeGateway::voice(anime_id * 10, "Studio Band", 2)]);
        gateway.set_voice_episodes(
            anime_id * 10,
            vec![FakeGateway::voice_episode(2, 2, 1200), FakeGateway::voice_episode(1, 1, 1200)],
        );
        gateway.set_release(anime_id, FakeGateway::release("season-alias", &[(1, 1400), (2, 1400)]));
    }

    #[tokio::test]
    async fn both_providers_default_to_provider_b() {
        let gateway = FakeGateway::default();
        seed_both(&gateway, 5);
        let catalog = catalog(&gateway, ProgressCache::default());

        catalog.load(5).await;

        let EpisodeView::Switchable(source) = catalog.view() else {
            panic!("expected a switchable view");
        };
        assert_eq!(source.provider(), Provider::B);

        assert!(catalog.set_source(Provider::A));
        let EpisodeView::Switchable(source) = catalog.view() else {
            panic!("expected a switchable view");
        };
        let numbers: Vec<u32> = source.entries().iter().map(|e| e.number()).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn no_providers_yield_empty_view() {
        let gateway = FakeGateway::default();
        gateway.fail("voice_tracks", 500);
        let catalog = catalog(&gateway, ProgressCache::default());

        catalog.load(5).await;

        assert_eq!(catalog.view(), EpisodeView::Empty);
        assert!(!catalog.set_source(Provider::A));
    }

    #[tokio::test]
    async fn empty_catalogs_on_both_providers_yield_empty_view() {
        let gateway = FakeGateway::default();
        gateway.set_voices(5, Vec::new());
        gateway.set_release(5, FakeGateway::release("empty", &[]));
        let catalog = catalog(&gateway, ProgressCache::default());

        catalog.load(5).await;

        assert_eq!(gateway.call_count("voice_tracks"), 1);
        assert_eq!(gateway.call_count("release"), 1);
        assert_eq!(catalog.view(), EpisodeView::Empty);
        assert!(!catalog.set_source(Provider::B));
    }

    #[tokio::test]
    async fn single_provider_has_no_toggle() {
        let gateway = FakeGateway::default();
        gateway.set_release(5, FakeGateway::release("only-b", &[(1, 1400)]));
        let catalog = catalog(&gateway, ProgressCache::default());

        catalog.load(5).await;

        assert!(matches!(catalog.view(), EpisodeView::Single(ref s) if s.provider() == Provider::B));
    }

    #[tokio::test]
    async fn season_round_trip_restores_from_cache() {
        let gateway = FakeGateway::default();
        seed_both(&gateway, 5);
        seed_both(&gateway, 6);
        let catalog = catalog(&gateway, ProgressCache::default());

        catalog.load(5).await;
        let original = catalog.view();
        catalog.switch_season(6).await;
        assert_eq!(catalog.season_id(), Some(6));
        assert_eq!(gateway.call_count("voice_tracks"), 2);

        catalog.switch_season(5).await;
        assert_eq!(gateway.call_count("voice_tracks"), 2);
        assert_eq!(gateway.call_count("release"), 2);
        assert_eq!(catalog.view(), original);
    }

    #[tokio::test]
    async fn season_switch_during_load_keeps_own_season() {
        let gateway = FakeGateway::default();
        seed_both(&gateway, 5);
        seed_both(&gateway, 6);
        gateway.slow("release", 4);
        let catalog = catalog(&gateway, ProgressCache::default());

        tokio::join!(catalog.load(5), async {
            tokio::task::yield_now().await;
            assert!(matches!(catalog.view(), EpisodeView::Empty));
            catalog.switch_season(6).await;
        });
        assert_eq!(catalog.season_id(), Some(6));

        catalog.switch_season(5).await;
        let EpisodeView::Switchable(source) = catalog.view() else {
            panic!("expected the own season to be restored");
        };
        assert_eq!(source.provider(), Provider::B);
        assert_eq!(source.anime_id(), 5);
        assert_eq!(source.entries().len(), 2);
    }

    #[tokio::test]
    async fn overlay_follows_displayed_season_and_voice() {
        let gateway = FakeGateway::default();
        seed_both(&gateway, 5);
        let progress = ProgressCache {
            entries: vec![ProgressEntry {
                anime_id: 5,
                provider: Provider::A,
                voice: Some("studio band".into()),
                episode: 1,
                watched_seconds: 1500,
                updated_at: Utc::now(),
            }],
        };
        let catalog = catalog(&gateway, progress);

        catalog.load(5).await;
        catalog.set_source(Provider::A);
        let EpisodeView::Switchable(source) = catalog.view() else {
            panic!("expected a switchable view");
        };
        let entries = source.entries();
        let first = source.progress_for(&entries[0]).unwrap();
        assert_eq!(first.ratio, 1.0);
        assert!(source.progress_for(&entries[1]).is_none());
    }

    #[tokio::test]
    async fn provider_b_progress_comes_from_server() {
        let gateway = FakeGateway::default();
        gateway.set_release(5, FakeGateway::release("alias", &[(1, 1000), (2, 1000)]));
        gateway.set_release_progress(5, vec![ReleaseProgress { ordinal: 2, watched_seconds: 250 }]);
        let catalog = catalog(&gateway, ProgressCache::default());

        catalog.load(5).await;
        let EpisodeView::Single(source) = catalog.view() else {
            panic!("expected a single view");
        };
        let entries = source.entries();
        assert_eq!(source.progress_for(&entries[1]).map(|p| p.ratio), Some(0.25));
    }

    #[tokio::test]
    async fn voice_switch_ignores_reentry_and_same_track() {
        let gateway = FakeGateway::default();
        gateway.set_voices(5, vec![FakeGateway::voice(1, "One", 1), FakeGateway::voice(2, "Two", 1)]);
        gateway.set_voice_episodes(1, vec![FakeGateway::voice_episode(10, 1, 1200)]);
        gateway.set_voice_episodes(2, vec![FakeGateway::voice_episode(20, 1, 1200)]);
        let catalog = catalog(&gateway, ProgressCache::default());
        catalog.load(5).await;

        assert!(!catalog.select_voice(1).await);
        let (first, (busy, second)) = tokio::join!(catalog.select_voice(2), async {
            (catalog.is_voice_changing(), catalog.select_voice(2).await)
        });
        assert!(first);
        assert!(busy);
        assert!(!second);
        assert!(!catalog.is_voice_changing());
        assert_eq!(gateway.call_count("voice_episodes"), 2);

        let EpisodeView::Single(EpisodeSource::ProviderA { voice, episodes, .. }) = catalog.view() else {
            panic!("expected provider A");
        };
        assert_eq!(voice.id, 2);
        assert_eq!(episodes[0].id, 20);
    }

    #[tokio::test]
    async fn deep_links_carry_displayed_season() {
        let gateway = FakeGateway::default();
        seed_both(&gateway, 5);
        seed_both(&gateway, 6);
        let catalog = catalog(&gateway, ProgressCache::default());
        catalog.load(5).await;
        catalog.switch_season(6).await;

        let EpisodeView::Switchable(source) = catalog.view() else {
            panic!("expected a switchable view");
        };
        let links = LinkBuilder::new(Url::parse("https://site.example").unwrap());
        let ctx = WatchContext {
            anime_id: 5,
            title: "Show".into(),
            cover: None,
            alias: None,
        };
        let entries = source.entries();
        let url = source.deep_link_for(&entries[0], &links, &ctx).unwrap();
        assert_eq!(url.path(), "/watch/provider-b/6");
        assert!(url.query().unwrap().contains("ordinal=1"));
    }
}
