//! Three-level source picker: source, then voice track, then episode.

use url::Url;

use crate::error::ApiError;
use crate::gateway::EpisodeGateway;
use crate::links::{LinkBuilder, WatchContext};
use crate::storage::ClientStorage;
use crate::types::{VoiceEpisode, VoiceTrack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceView {
    Source,
    Voices,
    Episodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOption {
    /// Opens the Provider B player for the title's alias.
    ProviderB,
    /// External player; shows a one-time warning first.
    Legacy,
    /// Listed but never selectable.
    Placeholder,
    /// Continues into voice track and episode selection.
    ProviderA,
}

impl SourceOption {
    pub const ALL: [SourceOption; 4] = [
        SourceOption::ProviderB,
        SourceOption::Legacy,
        SourceOption::Placeholder,
        SourceOption::ProviderA,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SourceOption::ProviderB => "Provider B",
            SourceOption::Legacy => "External player",
            SourceOption::Placeholder => "Coming soon",
            SourceOption::ProviderA => "Provider A",
        }
    }
}

/// What the caller should do after a choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    Stay,
    /// Show the external-player warning, then call `accept_warning` or `dismiss_warning`.
    WarningRequired,
    Navigate(Url),
}

#[derive(Debug)]
pub struct SourceFlow {
    context: WatchContext,
    view: SourceView,
    voices: Vec<VoiceTrack>,
    selected_voice: Option<VoiceTrack>,
    episodes: Vec<VoiceEpisode>,
    warning_pending: bool,
    closed: bool,
}

impl SourceFlow {
    pub fn new(context: WatchContext) -> Self {
        Self {
            context,
            view: SourceView::Source,
            voices: Vec::new(),
            selected_voice: None,
            episodes: Vec::new(),
            warning_pending: false,
            closed: false,
        }
    }

    pub fn context(&self) -> &WatchContext {
        &self.context
    }

    pub fn view(&self) -> SourceView {
        self.view
    }

    pub fn voices(&self) -> &[VoiceTrack] {
        &self.voices
    }

    pub fn selected_voice(&self) -> Option<&VoiceTrack> {
        self.selected_voice.as_ref()
    }

    pub fn episodes(&self) -> &[VoiceEpisode] {
        &self.episodes
    }

    pub fn warning_pending(&self) -> bool {
        self.warning_pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn options(&self) -> &'static [SourceOption] {
        &SourceOption::ALL
    }

    pub fn is_enabled(&self, option: SourceOption) -> bool {
        match option {
            SourceOption::Placeholder => false,
            SourceOption::ProviderB => self.context.alias.is_some(),
            SourceOption::Legacy | SourceOption::ProviderA => true,
        }
    }

    pub async fn choose_source<G, S>(
        &mut self,
        option: SourceOption,
        gateway: &G,
        storage: &S,
        links: &LinkBuilder,
    ) -> Result<FlowStep, ApiError>
    where
        G: EpisodeGateway,
        S: ClientStorage,
    {
        if self.closed || self.view != SourceView::Source || !self.is_enabled(option) {
            return Ok(FlowStep::Stay);
        }
        match option {
            SourceOption::Placeholder => Ok(FlowStep::Stay),
            SourceOption::ProviderB => {
                let Some(alias) = self.context.alias.clone() else {
                    return Ok(FlowStep::Stay);
                };
                let url = links.release_episode(&self.context, self.context.anime_id, &alias, None);
                Ok(self.navigate(url))
            }
            SourceOption::Legacy => {
                if storage.external_warning_shown() {
                    Ok(self.navigate(links.legacy(&self.context)))
                } else {
                    self.warning_pending = true;
                    Ok(FlowStep::WarningRequired)
                }
            }
            SourceOption::ProviderA => {
                let voices = gateway.voice_tracks(self.context.anime_id).await?;
                tracing::debug!(count = voices.len(), "voice tracks loaded");
                self.voices = voices;
                self.view = SourceView::Voices;
                Ok(FlowStep::Stay)
            }
        }
    }

    /// Records that the warning was seen and continues to the external player.
    pub fn accept_warning<S: ClientStorage>(&mut self, storage: &S, links: &LinkBuilder) -> FlowStep {
        if !self.warning_pending {
            return FlowStep::Stay;
        }
        self.warning_pending = false;
        if let Err(err) = storage.mark_external_warning_shown() {
            tracing::warn!(error = %err, "could not persist warning flag");
        }
        self.navigate(links.legacy(&self.context))
    }

    pub fn dismiss_warning(&mut self) {
        self.warning_pending = false;
    }

    pub async fn choose_voice<G: EpisodeGateway>(
        &mut self,
        voice_id: i64,
        gateway: &G,
    ) -> Result<FlowStep, ApiError> {
        if self.closed || self.view != SourceView::Voices {
            return Ok(FlowStep::Stay);
        }
        let Some(voice) = self.voices.iter().find(|v| v.id == voice_id).cloned() else {
            return Ok(FlowStep::Stay);
        };
        let mut episodes = gateway.voice_episodes(voice_id).await?;
        episodes.sort_by_key(|e| e.number);
        self.episodes = episodes;
        self.selected_voice = Some(voice);
        self.view = SourceView::Episodes;
        Ok(FlowStep::Stay)
    }

    pub fn choose_episode(&mut self, episode_id: i64, links: &LinkBuilder) -> FlowStep {
        if self.closed || self.view != SourceView::Episodes {
            return FlowStep::Stay;
        }
        let (Some(voice), Some(episode)) = (
            self.selected_voice.as_ref(),
            self.episodes.iter().find(|e| e.id == episode_id),
        ) else {
            return FlowStep::Stay;
        };
        let url = links.voice_episode(
            &self.context,
            self.context.anime_id,
            voice.id,
            episode.id,
            episode.number,
        );
        self.navigate(url)
    }

    /// Steps one level up, dropping what was loaded for the level being left.
    /// Returns `false` at the top level.
    pub fn back(&mut self) -> bool {
        match self.view {
            SourceView::Source => false,
            SourceView::Voices => {
                self.voices.clear();
                self.view = SourceView::Source;
                true
            }
            SourceView::Episodes => {
                self.episodes.clear();
                self.selected_voice = None;
                self.view = SourceView::Voices;
                true
            }
        }
    }

    fn navigate(&mut self, url: Url) -> FlowStep {
        self.closed = true;
        FlowStep::Navigate(url)
    }
}
