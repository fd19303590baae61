use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use folder_slideshow::config::{Configuration, ExtensionFilter, PlayMode, SurfaceSize};
use folder_slideshow::events::{Command, PlayerEvent};
use folder_slideshow::tasks::viewer;
use folder_slideshow::tree::TreeEntry;
use std::io::{self, BufRead};
use std::path::PathBuf;
use tokio::sync::{mpsc::Sender, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "folder-slideshow",
    version,
    about = "Play the images of a folder as a slideshow"
)]
struct Args {
    /// Path to YAML config
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Folder to play (overrides `folder`)
    #[arg(value_name = "FOLDER")]
    folder: Option<PathBuf>,
    /// Seconds between images; non-numeric or non-positive values fall back to 5
    #[arg(long, value_name = "SECONDS")]
    interval: Option<String>,
    /// Play in sorted path order instead of randomly
    #[arg(long)]
    ordered: bool,
    /// Only scan the top level of the folder
    #[arg(long = "no-recursive")]
    no_recursive: bool,
    /// Comma separated extensions, e.g. ".jpg,.png"
    #[arg(long, value_name = "LIST")]
    extensions: Option<String>,
    /// Surface size as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    size: Option<SurfaceSize>,
    /// Write every rendered frame of the main surface to this PNG file
    #[arg(long = "render-to", value_name = "FILE")]
    render_to: Option<PathBuf>,
    /// Deterministic RNG seed for random play
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn parse_size(text: &str) -> Result<SurfaceSize, String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let width = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok(SurfaceSize { width, height })
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info").add_directive("folder_slideshow=debug".parse()?),
        _ => EnvFilter::new("info").add_directive("folder_slideshow=trace".parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

impl Args {
    fn configuration(&self) -> Result<Configuration> {
        let mut cfg = match &self.config {
            Some(path) => Configuration::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => Configuration::default(),
        };
        if let Some(folder) = &self.folder {
            cfg.folder = Some(folder.clone());
        }
        if let Some(text) = &self.interval {
            let setting = folder_slideshow::config::coerce_interval(text);
            if let Some(notice) = setting.notice {
                tracing::info!("{notice}");
            }
            cfg.interval_seconds = setting.seconds;
        }
        if self.ordered {
            cfg.play_mode = PlayMode::Ordered;
        }
        if self.no_recursive {
            cfg.recursive = false;
        }
        if let Some(list) = &self.extensions {
            cfg.extensions = ExtensionFilter::parse(list);
        }
        if let Some(size) = self.size {
            cfg.surface = size;
        }
        if self.seed.is_some() {
            cfg.rng_seed = self.seed;
        }
        cfg.validated().context("invalid configuration values")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let cfg = args.configuration()?;
    tracing::debug!("configuration:\n{:#?}", cfg);

    let cancel = CancellationToken::new();
    let surface = cfg.surface;
    let autostart = cfg.folder.is_some();

    let folder_slideshow::Slideshow {
        commands,
        mut events,
        frames,
        mut tasks,
    } = folder_slideshow::spawn(cfg, cancel.clone());

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // Keyboard commands on a detached thread; EOF shuts down.
    {
        let commands = commands.clone();
        let cancel = cancel.clone();
        std::thread::spawn(move || read_commands(&commands, &cancel));
    }

    let mut viewers: JoinSet<Result<()>> = JoinSet::new();
    viewers.spawn({
        let cancel = cancel.clone();
        let render_to = args.render_to.clone();
        async move {
            viewer::run("main", frames, surface, render_to, cancel)
                .await
                .context("main surface failed")
        }
    });

    if autostart {
        let _ = commands.send(Command::Start).await;
    }

    let mut fullscreen: Option<CancellationToken> = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe = events.recv() => {
                let Some(event) = maybe else { break };
                match event {
                    // Already logged by the player.
                    PlayerEvent::Status(_) => {}
                    PlayerEvent::Running(running) => tracing::debug!(running, "playback state changed"),
                    PlayerEvent::DirectoryTree(None) => tracing::debug!("folder view hidden"),
                    PlayerEvent::DirectoryTree(Some(tree)) => {
                        for entry in tree.entries() {
                            match entry {
                                TreeEntry::Target(t) => tracing::info!(dir = %t.dir.display(), "folder: {}", t.label),
                                TreeEntry::Group { name, targets } => tracing::info!(subfolders = targets.len(), "folder: {name}"),
                            }
                        }
                    }
                    PlayerEvent::Fullscreen(Some(watcher)) => {
                        let token = cancel.child_token();
                        viewers.spawn({
                            let token = token.clone();
                            async move {
                                viewer::run("fullscreen", watcher, surface, None, token)
                                    .await
                                    .context("full-screen surface failed")
                            }
                        });
                        if let Some(old) = fullscreen.replace(token) {
                            old.cancel();
                        }
                    }
                    PlayerEvent::Fullscreen(None) => {
                        if let Some(token) = fullscreen.take() {
                            token.cancel();
                        }
                    }
                }
            }
        }
    }
    cancel.cancel();

    for set in [&mut tasks, &mut viewers] {
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("task error: {e:?}"),
                Err(e) => tracing::error!("join error: {e}"),
            }
        }
    }
    Ok(())
}

fn read_commands(commands: &Sender<Command>, cancel: &CancellationToken) {
    tracing::info!("keys: s start/pause, n next, p previous, c clear, f full-screen, d delete, i properties, q quit");
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!("stdin watcher failed: {err}");
                break;
            }
        };
        let command = match line.trim() {
            "" => continue,
            "s" => Command::StartPause,
            "n" => Command::Next,
            "p" => Command::Previous,
            "c" => Command::Clear,
            "f" => Command::ToggleFullscreen,
            "d" => Command::DeleteCurrent,
            "i" => {
                let (tx, rx) = oneshot::channel();
                if commands.blocking_send(Command::Properties(tx)).is_err() {
                    break;
                }
                match rx.blocking_recv() {
                    Ok(Ok(props)) => tracing::info!(
                        size_mib = %format!("{:.2}", props.size_mib),
                        modified = %props.modified,
                        "file: {}",
                        props.name
                    ),
                    Ok(Err(err)) => tracing::warn!("properties unavailable: {err}"),
                    Err(_) => break,
                }
                continue;
            }
            "q" => break,
            other => {
                tracing::warn!("unknown key {other:?}");
                continue;
            }
        };
        if commands.blocking_send(command).is_err() {
            break;
        }
    }
    tracing::info!("stdin closed; initiating shutdown");
    cancel.cancel();
}
