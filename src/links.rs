use url::Url;

use crate::types::{AnimeRecord, Provider, Tab};

const TAB_PARAM: &str = "tab";

/// The page URL, with the active tab mirrored into its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn tab(&self) -> Tab {
        self.url
            .query_pairs()
            .find(|(key, _)| key == TAB_PARAM)
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or_default()
    }

    /// Rewrites the `tab` parameter in place. The default tab drops it.
    pub fn set_tab(&mut self, tab: Tab) {
        let retained: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != TAB_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if retained.is_empty() && tab.is_default() {
            self.url.set_query(None);
            return;
        }

        let mut pairs = self.url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(&retained);
        if !tab.is_default() {
            pairs.append_pair(TAB_PARAM, tab.as_str());
        }
    }
}

/// What a deep link needs to know about the title being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchContext {
    pub anime_id: i64,
    pub title: String,
    pub cover: Option<String>,
    pub alias: Option<String>,
}

impl From<&AnimeRecord> for WatchContext {
    fn from(anime: &AnimeRecord) -> Self {
        Self {
            anime_id: anime.id,
            title: anime.title.clone(),
            cover: anime.cover.clone(),
            alias: anime.alias.clone(),
        }
    }
}

/// Builds `/watch/...` deep links on the site.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: Url,
}

impl LinkBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn anime_page(&self, anime_id: i64) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("/anime/{anime_id}"));
        url.set_query(None);
        url
    }

    pub fn voice_episode(
        &self,
        ctx: &WatchContext,
        anime_id: i64,
        voice_id: i64,
        episode_id: i64,
        number: u32,
    ) -> Url {
        self.watch(
            Provider::A.slug(),
            anime_id,
            ctx,
            &[
                ("voice", voice_id.to_string()),
                ("episode", episode_id.to_string()),
                ("number", number.to_string()),
            ],
        )
    }

    pub fn release_episode(
        &self,
        ctx: &WatchContext,
        anime_id: i64,
        alias: &str,
        ordinal: Option<u32>,
    ) -> Url {
        let mut params = vec![("alias", alias.to_string())];
        if let Some(ordinal) = ordinal {
            params.push(("ordinal", ordinal.to_string()));
        }
        self.watch(Provider::B.slug(), anime_id, ctx, &params)
    }

    pub fn legacy(&self, ctx: &WatchContext) -> Url {
        self.watch("legacy", ctx.anime_id, ctx, &[])
    }

    fn watch(
        &self,
        segment: &str,
        anime_id: i64,
        ctx: &WatchContext,
        extra: &[(&str, String)],
    ) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("/watch/{segment}/{anime_id}"));
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in extra {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("title", &ctx.title);
            if let Some(cover) = &ctx.cover {
                pairs.append_pair("cover", cover);
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(raw: &str) -> PageLocation {
        PageLocation::new(Url::parse(raw).unwrap())
    }

    fn ctx() -> WatchContext {
        WatchContext {
            anime_id: 42,
            title: "Frieren & Friends".into(),
            cover: Some("https://img.example/42.jpg".into()),
            alias: Some("frieren".into()),
        }
    }

    #[test]
    fn non_default_tab_is_written_to_query() {
        let mut loc = location("https://site.example/anime/42");
        loc.set_tab(Tab::Reviews);
        assert_eq!(loc.url().as_str(), "https://site.example/anime/42?tab=reviews");
        assert_eq!(loc.tab(), Tab::Reviews);
    }

    #[test]
    fn default_tab_removes_param() {
        let mut loc = location("https://site.example/anime/42?tab=comments");
        loc.set_tab(Tab::Screenshots);
        assert_eq!(loc.url().as_str(), "https://site.example/anime/42");
        assert_eq!(loc.url().query(), None);
    }

    #[test]
    fn other_params_survive_tab_changes() {
        let mut loc = location("https://site.example/anime/42?ref=home&tab=details");
        loc.set_tab(Tab::Screenshots);
        assert_eq!(loc.url().as_str(), "https://site.example/anime/42?ref=home");
        loc.set_tab(Tab::Episodes);
        assert_eq!(
            loc.url().as_str(),
            "https://site.example/anime/42?ref=home&tab=episodes"
        );
    }

    #[test]
    fn deep_links_encode_title_and_cover() {
        let links = LinkBuilder::new(Url::parse("https://site.example").unwrap());
        let url = links.voice_episode(&ctx(), 42, 7, 1001, 3);
        assert_eq!(url.path(), "/watch/provider-a/42");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("voice".into(), "7".into())));
        assert!(pairs.contains(&("episode".into(), "1001".into())));
        assert!(pairs.contains(&("title".into(), "Frieren & Friends".into())));
        assert!(url.as_str().contains("title=Frieren+%26+Friends"));
    }

    #[test]
    fn release_link_carries_alias() {
        let links = LinkBuilder::new(Url::parse("https://site.example").unwrap());
        let url = links.release_episode(&ctx(), 43, "frieren-2", Some(5));
        assert_eq!(url.path(), "/watch/provider-b/43");
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "alias").unwrap().1,
            "frieren-2"
        );
        assert_eq!(links.legacy(&ctx()).path(), "/watch/legacy/42");
    }
}
