use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_grabber::cli::{Cli, Commands, TranscriptOutputArgs, VideoArgs};
use transcript_grabber::config::Config;
use transcript_grabber::observer::fallback::{ManifestLookup, PageLifecycle, StaticPageState};
use transcript_grabber::observer::{har, EventEmitter, ObservingClient, PageMessage};
use transcript_grabber::output::{self, render_artifact, Artifact};
use transcript_grabber::pipeline::{self, Pipeline};
use transcript_grabber::relay::{ExtractionStore, Relay};
use transcript_grabber::transcript::FetchedTranscript;
use transcript_grabber::{command, utils};

const PAGE_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so transcripts and commands can be piped from stdout
    let default_filter = if cli.verbose {
        "transcript_grabber=debug,tgrab=debug"
    } else {
        "transcript_grabber=info,tgrab=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Convert { input, output } => {
            let raw = fs_err::read_to_string(&input)?;
            let transcript = FetchedTranscript::parse(raw)?;

            let name = output.name.clone().unwrap_or_else(|| {
                let stem = input.file_stem().and_then(|s| s.to_str());
                utils::default_transcript_name(stem)
            });
            let format = output.format.unwrap_or(config.transcript.default_format);
            deliver(&render_artifact(&transcript, format, &name), &output, &config).await?;
        }
        Commands::Fetch { url, output } => {
            utils::validate_url(&url)?;

            let (tx, _rx) = broadcast::channel(PAGE_CHANNEL_CAPACITY);
            let pipeline = Pipeline::new(observing_client(&config, tx)?).with_progress(!cli.quiet);
            let transcript = pipeline.fetch_transcript(&url).await?;

            let name = output.name.clone().unwrap_or_else(|| utils::default_transcript_name(None));
            let format = output.format.unwrap_or(config.transcript.default_format);
            deliver(&render_artifact(&transcript, format, &name), &output, &config).await?;
        }
        Commands::Scan {
            capture,
            page_state,
            download,
            output,
            video,
        } => {
            let store = scan(&capture, page_state.as_deref(), &config).await?;
            report(&store, &video, &config).await;

            if download {
                let (tx, _rx) = broadcast::channel(PAGE_CHANNEL_CAPACITY);
                let pipeline = Pipeline::new(observing_client(&config, tx)?).with_progress(!cli.quiet);

                let name = output.name.clone().unwrap_or_else(|| {
                    utils::default_transcript_name(store.transcript().and_then(|t| t.display_name.as_deref()))
                });
                let format = output.format.unwrap_or(config.transcript.default_format);
                let artifact = pipeline.download_transcript(&store, format, &name).await?;
                deliver(&artifact, &output, &config).await?;
            }
        }
        Commands::Command { url, video } => {
            utils::validate_url(&url)?;

            let track = video.track.unwrap_or(config.video.default_track);
            let tool = video.tool.unwrap_or(config.video.default_tool);
            warn_if_tool_missing(tool).await;
            println!("{}", command::build_command(&url, &video.video_name, track, tool));
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written to: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

fn observing_client(config: &Config, tx: broadcast::Sender<PageMessage>) -> Result<ObservingClient> {
    let client = reqwest::Client::builder()
        .user_agent(config.network.user_agent.as_str())
        .build()?;
    Ok(ObservingClient::new(client, EventEmitter::new(tx)))
}

/// Replay a capture (and optionally the page-state lookup) into a fresh relay
async fn scan(
    capture: &std::path::Path,
    page_state: Option<&std::path::Path>,
    config: &Config,
) -> Result<ExtractionStore> {
    let exchanges = har::load_capture(capture)?;

    let (tx, rx) = broadcast::channel(PAGE_CHANNEL_CAPACITY);
    let relay = tokio::spawn(Relay::new().run(rx));
    let emitter = EventEmitter::new(tx);

    let lookup = match page_state {
        Some(path) => {
            let state = StaticPageState::load(path)?;
            let (lifecycle, signals) = PageLifecycle::channel();
            let lookup = ManifestLookup::new(config.lookup_delay());
            let lookup_emitter = emitter.clone();
            let handle = tokio::spawn(async move { lookup.run(&state, signals, &lookup_emitter).await });
            Some((lifecycle, handle))
        }
        None => None,
    };

    let events = har::replay(&exchanges, &emitter);
    tracing::info!("Replayed {} exchanges, {} events", exchanges.len(), events);

    if let Some((mut lifecycle, handle)) = lookup {
        lifecycle.file_info_loaded();
        lifecycle.page_loaded();
        if !handle.await? {
            tracing::debug!("Page state lookup found nothing");
        }
    }

    drop(emitter);
    Ok(relay.await?)
}

async fn report(store: &ExtractionStore, video: &VideoArgs, config: &Config) {
    match store.transcript() {
        Some(source) => {
            println!("Transcript: {}", source.temporary_download_url);
            if let Some(name) = &source.display_name {
                println!("  Name: {}", name);
            }
            if let Some(language) = &source.language_tag {
                println!("  Language: {}", language);
            }
        }
        None => println!("Transcript: not detected"),
    }

    let track = video.track.unwrap_or(config.video.default_track);
    let tool = video.tool.unwrap_or(config.video.default_tool);
    match pipeline::video_command(store, &video.video_name, track, tool) {
        Ok(cmd) => {
            if let Some(manifest) = store.manifest_url() {
                let host = utils::extract_domain(manifest).unwrap_or_default();
                println!("Manifest: {} ({})", manifest, host);
            }
            warn_if_tool_missing(tool).await;
            println!("Command: {}", cmd);
        }
        Err(_) => println!("Manifest: not detected"),
    }
}

async fn deliver(artifact: &Artifact, args: &TranscriptOutputArgs, config: &Config) -> Result<()> {
    if args.stdout {
        output::print_to_console(artifact)?;
        return Ok(());
    }

    let dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir());
    let path = output::save_to_dir(artifact, &dir).await?;
    println!(
        "Transcript saved to: {} ({})",
        path.display(),
        utils::format_file_size(artifact.bytes.len() as u64)
    );
    Ok(())
}

async fn warn_if_tool_missing(tool: command::ToolChoice) {
    if !utils::check_tool_available(tool).await {
        tracing::warn!("{} not found on PATH; install it to run the command", tool);
    }
}
