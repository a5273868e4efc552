use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use tracing_subscriber::EnvFilter;
use url::Url;

use anipage::config::Settings;
use anipage::episodes::{EpisodeCatalog, EpisodeSource, EpisodeView};
use anipage::gateway::http::HttpGateway;
use anipage::links::{LinkBuilder, PageLocation, WatchContext};
use anipage::notify::TracingNotifier;
use anipage::page::AnimePage;
use anipage::progress::{ProgressCache, progress_path};
use anipage::source_flow::{FlowStep, SourceView};
use anipage::storage::FileStorage;
use anipage::types::Tab;

type Page = AnimePage<HttpGateway, FileStorage, TracingNotifier>;

#[derive(Debug, Parser)]
#[command(
    name = "anipage",
    about = "Open an anime page, list its episodes and pick where to watch.",
    version
)]
struct Cli {
    #[arg(value_name = "ANIME_ID", required_unless_present = "print_config")]
    anime_id: Option<i64>,

    /// Tab to open (screenshots, details, reviews, comments, episodes, related, similar).
    #[arg(long, value_name = "TAB")]
    tab: Option<Tab>,

    /// Show a sibling season from the franchise chain.
    #[arg(long, value_name = "ID")]
    season: Option<i64>,

    /// Choose a source and open the watch link in the browser.
    #[arg(long)]
    watch: bool,

    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("anipage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load configuration")?;

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }
    let Some(anime_id) = cli.anime_id else {
        bail!("No anime id provided. Use `anipage <ANIME_ID>`.");
    };

    let storage_dir = settings.storage_dir()?;
    let gateway = HttpGateway::new(&settings).context("failed to build HTTP client")?;
    let site = Url::parse(&settings.site_base_url)
        .with_context(|| format!("invalid site_base_url '{}'", settings.site_base_url))?;
    let links = LinkBuilder::new(site);

    let page = AnimePage::new(
        gateway.clone(),
        FileStorage::in_dir(&storage_dir),
        TracingNotifier,
        PageLocation::new(links.anime_page(anime_id)),
    );
    if let Err(err) = page.initialize(anime_id).await {
        bail!("Could not open anime {anime_id}: {err}");
    }
    if let Some(tab) = cli.tab {
        page.set_active_tab(tab).await?;
    }
    print_summary(&page);

    let progress = ProgressCache::load(&progress_path(&storage_dir)).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable progress cache");
        ProgressCache::default()
    });
    let catalog = EpisodeCatalog::new(gateway.clone(), FileStorage::in_dir(&storage_dir), progress);
    catalog.load(anime_id).await;

    if let Some(season) = cli.season {
        let title = catalog
            .franchise()
            .into_iter()
            .find(|item| item.id == season)
            .map(|item| item.title)
            .unwrap_or_else(|| format!("#{season}"));
        catalog.switch_season(season).await;
        page.select_season(season, &title).await?;
        let collection = page.effective_collection();
        println!(
            "Season: {title} [{}{}]",
            collection.status.label(),
            if collection.favorite { ", favorite" } else { "" }
        );
    }

    let ctx = page
        .anime()
        .map(|anime| WatchContext::from(&anime))
        .context("anime disappeared after loading")?;
    print_episodes(&catalog.view(), &links, &ctx);

    if cli.watch {
        watch(&page, &gateway, &links).await?;
    }
    Ok(())
}

fn print_summary(page: &Page) {
    let Some(anime) = page.anime() else {
        return;
    };
    println!("{}", anime.title);
    if let Some(alt) = &anime.alt_title {
        println!("  {alt}");
    }
    println!(
        "  {} | {} episodes | {}",
        anime.status.label(),
        anime.episode_label(),
        anime.genres.join(", ")
    );
    match page.average_rating() {
        Some(avg) => println!("  Rating {avg:.1} from {} reviews", page.review_count()),
        None => println!("  {} reviews", page.review_count()),
    }
    let collection = page.collection();
    println!(
        "  In your list: {}{}",
        collection.status.label(),
        if collection.favorite { " (favorite)" } else { "" }
    );
    println!("  Comments: {}", page.comment_count());
    let accessibility = page.accessibility();
    if !accessibility.accessible {
        println!(
            "  Not available: {}",
            accessibility.blocked_note.as_deref().unwrap_or("blocked")
        );
    }
    println!("  Tab: {} ({})", page.active_tab(), page.location().url());
}

fn print_episodes(view: &EpisodeView, links: &LinkBuilder, ctx: &WatchContext) {
    let (source, switchable) = match view {
        EpisodeView::Empty => {
            println!("No episodes on either provider. Use --watch for the external player.");
            return;
        }
        EpisodeView::Single(source) => (source, false),
        EpisodeView::Switchable(source) => (source, true),
    };

    let provider = source.provider();
    if switchable {
        println!("\nEpisodes ({}, other provider also available):", provider.label());
    } else {
        println!("\nEpisodes ({}):", provider.label());
    }
    if let EpisodeSource::ProviderA { voice, .. } = source {
        println!("  Voice: {}", voice.name);
    }
    for entry in source.entries() {
        let progress = source
            .progress_for(&entry)
            .map(|p| format!(" [{:.0}%]", p.ratio * 100.0))
            .unwrap_or_default();
        let title = entry.title().unwrap_or("");
        println!("  {:>3}. {title}{progress}", entry.number());
        if let Some(url) = source.deep_link_for(&entry, links, ctx) {
            tracing::debug!(%url, "episode link");
        }
    }
}

async fn watch(page: &Page, gateway: &HttpGateway, links: &LinkBuilder) -> Result<()> {
    let Some(mut flow) = page.request_watch() else {
        println!("This title cannot be watched here.");
        return Ok(());
    };
    let storage = page.storage();
    let theme = theme();

    let url = loop {
        let step = match flow.view() {
            SourceView::Source => {
                let options = flow.options();
                let labels: Vec<String> = options
                    .iter()
                    .map(|option| {
                        if flow.is_enabled(*option) {
                            option.label().to_string()
                        } else {
                            format!("{} (unavailable)", option.label())
                        }
                    })
                    .collect();
                let selection = Select::with_theme(&theme)
                    .with_prompt("Select a source (Esc to cancel)")
                    .items(&labels)
                    .default(0)
                    .interact_opt()?;
                let Some(idx) = selection else {
                    break None;
                };
                flow.choose_source(options[idx], gateway, storage, links)
                    .await?
            }
            SourceView::Voices => {
                let labels: Vec<String> = flow
                    .voices()
                    .iter()
                    .map(|v| format!("{} [{} episodes]", v.name, v.episode_count))
                    .collect();
                if labels.is_empty() {
                    println!("No voice tracks available.");
                    flow.back();
                    continue;
                }
                let selection = Select::with_theme(&theme)
                    .with_prompt("Select a voice track (Esc to go back)")
                    .items(&labels)
                    .default(0)
                    .interact_opt()?;
                let Some(idx) = selection else {
                    flow.back();
                    continue;
                };
                let voice_id = flow.voices()[idx].id;
                flow.choose_voice(voice_id, gateway).await?
            }
            SourceView::Episodes => {
                let labels: Vec<String> = flow
                    .episodes()
                    .iter()
                    .map(|e| match &e.title {
                        Some(title) => format!("{}. {title}", e.number),
                        None => format!("Episode {}", e.number),
                    })
                    .collect();
                if labels.is_empty() {
                    println!("This voice track has no episodes.");
                    flow.back();
                    continue;
                }
                let selection = Select::with_theme(&theme)
                    .with_prompt("Select an episode (Esc to go back)")
                    .items(&labels)
                    .default(0)
                    .interact_opt()?;
                let Some(idx) = selection else {
                    flow.back();
                    continue;
                };
                let episode_id = flow.episodes()[idx].id;
                flow.choose_episode(episode_id, links)
            }
        };

        match step {
            FlowStep::Stay => {}
            FlowStep::Navigate(url) => break Some(url),
            FlowStep::WarningRequired => {
                let accepted = Confirm::with_theme(&theme)
                    .with_prompt("The external player is run by a third party. Continue?")
                    .default(false)
                    .interact()?;
                if !accepted {
                    flow.dismiss_warning();
                    continue;
                }
                if let FlowStep::Navigate(url) = flow.accept_warning(storage, links) {
                    break Some(url);
                }
            }
        }
    };
    page.close_source_flow();

    let Some(url) = url else {
        println!("Cancelled.");
        return Ok(());
    };
    println!("Opening {url}");
    open::that(url.as_str()).with_context(|| format!("failed to open {url}"))?;
    Ok(())
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}
