use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mediaplex::config::Configuration;
use mediaplex::models::{
    Filters, ImagePreferences, ItemKind, MediaItem, NegotiateRequest, PageRequest, ProtocolKind,
};
use mediaplex::{ticks, HttpClient, ImageResolver, Library, MediaAdapter, PlaybackSession};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identify the server at an address without credentials
    Probe {
        address: String,
        #[arg(short, long, value_enum, default_value = "jellyfin")]
        protocol: ProtocolArg,
    },
    /// List top-level libraries
    Libraries,
    /// Recently added items
    Latest {
        #[arg(long)]
        library: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Continue watching
    Resume {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Next episodes to watch
    NextUp {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Every favorite, fetched page by page
    Favorites {
        #[arg(long, default_value_t = 40)]
        page_size: u32,
    },
    Search {
        term: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Print one item and its resolved artwork
    Item { id: String },
    /// Negotiate a stream and optionally report playback for a while
    Play {
        id: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        audio: Option<i32>,
        /// -1 disables subtitles
        #[arg(long, allow_hyphen_values = true)]
        subtitle: Option<i32>,
        #[arg(long, default_value_t = 0)]
        report_seconds: u64,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ProtocolArg {
    Jellyfin,
    Plex,
}

impl From<ProtocolArg> for ProtocolKind {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Jellyfin => ProtocolKind::Jellyfin,
            ProtocolArg::Plex => ProtocolKind::Plex,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Probing needs no configuration file.
    let config = match &cli.command {
        Command::Probe { .. } => Configuration::default(),
        _ => Configuration::from_file(&cli.config)?,
    };

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level.as_str()).init();

    info!("Starting mediaplex v{}", env!("CARGO_PKG_VERSION"));

    let http = HttpClient::new()?;

    if let Command::Probe { address, protocol } = &cli.command {
        let server = MediaAdapter::probe(&http, (*protocol).into(), address).await?;
        println!(
            "{} {} ({}) id={}",
            server.protocol,
            server.name.as_deref().unwrap_or("?"),
            server.version.as_deref().unwrap_or("?"),
            server.id.as_deref().unwrap_or("?")
        );
        return Ok(());
    }

    let context = config.active_server()?;
    match &context {
        None => warn!("No server configured in {}", cli.config),
        Some(ctx) if ctx.user_id.is_none() => {
            warn!("Active server has no userId; playback will not negotiate")
        }
        Some(_) => {}
    }
    let adapter = MediaAdapter::connect(context, config.device_identity(), http);

    match cli.command {
        Command::Probe { .. } => {}
        Command::Libraries => print_items(&adapter.libraries().await?),
        Command::Latest { library, limit } => {
            let items = match library {
                Some(library) => adapter.latest_by_library(&library, limit).await?,
                None => adapter.latest(limit).await?,
            };
            print_items(&items);
        }
        Command::Resume { limit } => print_items(&adapter.resume(limit).await?),
        Command::NextUp { limit } => print_items(&adapter.next_up(limit).await?),
        Command::Favorites { page_size } => {
            let filters = Filters::kinds([
                ItemKind::Movie,
                ItemKind::Series,
                ItemKind::Episode,
                ItemKind::BoxSet,
                ItemKind::Season,
            ]);
            let items = mediaplex::pagination::collect_all(page_size, filters, |request| {
                let adapter = &adapter;
                async move { adapter.favorites_paged(&request).await }
            })
            .await?;
            print_items(&items);
        }
        Command::Search { term, limit } => {
            let page = adapter.search(&term, &PageRequest::new(0, limit)).await?;
            print_items(&page.items);
            println!("{} of {} results", page.items.len(), page.effective_total());
        }
        Command::Item { id } => {
            let Some(item) = adapter.get_item(&id).await? else {
                bail!("Item {} not found", id);
            };
            println!("{}", serde_json::to_string_pretty(&item)?);
            debug!("raw: {}", item.raw.to_json());
            let image = adapter.resolve_image(&item, &ImagePreferences::default());
            println!("image: {}", image.url.as_deref().unwrap_or("-"));
        }
        Command::Play {
            id,
            source,
            audio,
            subtitle,
            report_seconds,
        } => {
            let Some(item) = adapter.get_item(&id).await? else {
                bail!("Item {} not found", id);
            };
            if !item.kind.is_playable() {
                bail!("{} ({:?}) is not playable", item.display_name(), item.kind);
            }
            let progress_interval = config.progress_interval();
            let request = NegotiateRequest {
                start_ticks: item.resume_position_ticks().unwrap_or(0),
                media_source_id: source,
                audio_stream_index: audio,
                subtitle_stream_index: subtitle,
                max_bitrate: config.max_bitrate(),
                ..NegotiateRequest::new(item, None)
            };
            play(adapter, request, report_seconds, progress_interval).await?;
        }
    }

    Ok(())
}

async fn play(
    adapter: MediaAdapter,
    request: NegotiateRequest,
    report_seconds: u64,
    progress_interval: Duration,
) -> Result<()> {
    let session = PlaybackSession::new(Arc::new(adapter));

    let Some(stream) = session.negotiate(&request).await? else {
        bail!("Server is not ready to negotiate (set userId for the active server)");
    };
    println!("{} {}", stream.play_method.as_str(), stream.url);
    println!(
        "session: {}",
        stream.play_session_id.as_deref().unwrap_or("-")
    );

    if report_seconds == 0 {
        return Ok(());
    }

    session.start().await;
    let started = Instant::now();
    let deadline = Duration::from_secs(report_seconds);
    let mut ticker = interval(progress_interval);
    ticker.tick().await;

    let position = |elapsed: Duration| stream.start_position_ticks + ticks::from_duration(elapsed);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    break;
                }
                let outcome = session.progress(position(elapsed), false).await;
                debug!("Progress report: {:?}", outcome);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    let elapsed = started.elapsed().min(deadline);
    session.stop(Some(position(elapsed))).await;
    info!("Reported {}s of playback", elapsed.as_secs());
    Ok(())
}

fn print_items(items: &[MediaItem]) {
    for item in items {
        println!(
            "{}\t{:?}\t{}",
            item.id.as_deref().unwrap_or("-"),
            item.kind,
            item.display_name()
        );
    }
    info!("{} items", items.len());
}
