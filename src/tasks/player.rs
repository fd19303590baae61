use crate::config::{
    Configuration, DEFAULT_INTERVAL_SECONDS, ExtensionFilter, PlayMode, coerce_interval,
};
use crate::error::Error;
use crate::events::{
    Command, Direction, FileProperties, InventoryEvent, LoadPhoto, Origin, PhotoLoaded,
    PlaybackSnapshot, PlayerEvent, Severity, StatusReport,
};
use crate::frame::{Frame, FrameStore, FrameWatcher};
use crate::scan::{self, DirectoryIndex, ScanOptions, ScanResult};
use crate::sequencer::{Pick, Sequencer};
use crate::tasks::{files, loader};
use crate::tree::{self, DirectoryTree};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::select;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A running player: send [`Command`]s, read [`PlayerEvent`]s, and redraw
/// from `frames`.
pub struct Slideshow {
    pub commands: Sender<Command>,
    pub events: Receiver<PlayerEvent>,
    pub frames: FrameWatcher,
    pub tasks: JoinSet<Result<()>>,
}

impl Slideshow {
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn snapshot(&self) -> Option<PlaybackSnapshot> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.commands.send(Command::Snapshot(tx)).await.ok()?;
        rx.await.ok()
    }
}

/// Spawn the player and its decode worker on the current runtime.
pub fn spawn(cfg: Configuration, cancel: CancellationToken) -> Slideshow {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(32); // UI -> Player
    let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>(256); // Player -> UI
    let (load_tx, load_rx) = mpsc::channel::<LoadPhoto>(1); // Player -> Loader
    let (loaded_tx, loaded_rx) = mpsc::channel::<PhotoLoaded>(1); // Loader -> Player

    let main = FrameStore::new();
    let frames = main.watch();

    let mut tasks = JoinSet::new();
    tasks.spawn(loader::run(load_rx, loaded_tx, cancel.clone()));
    tasks.spawn(run(cfg, cmd_rx, event_tx, load_tx, loaded_rx, main, cancel));

    Slideshow {
        commands: cmd_tx,
        events: event_rx,
        frames,
        tasks,
    }
}

struct ScanOutcome {
    epoch: u64,
    result: Result<ScanResult, Error>,
}

struct Pending {
    request: LoadPhoto,
    /// Candidates that may still be tried if this one fails to decode.
    attempts_left: usize,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Next,
    Previous,
}

/// Foreground loop: the only place where the path collections and playback
/// state change.
///
/// Rules:
/// - At most one decode is in flight; manual picks made meanwhile are queued
///   (latest wins) and ticks are skipped.
/// - Every reset bumps the epoch; results from an older epoch are dropped.
/// - Results of automatic advances are dropped once paused.
/// - A file that fails to decode is pruned and the next candidate in the
///   same direction is tried, at most once per image in the collection.
#[instrument(skip_all)]
pub async fn run(
    cfg: Configuration,
    mut commands: Receiver<Command>,
    events: Sender<PlayerEvent>,
    to_loader: Sender<LoadPhoto>,
    mut loaded_rx: Receiver<PhotoLoaded>,
    main: FrameStore,
    cancel: CancellationToken,
) -> Result<()> {
    let (scan_tx, mut scan_rx) = mpsc::channel::<ScanOutcome>(4);
    let (inv_tx, mut inv_rx) = mpsc::channel::<InventoryEvent>(128);
    let mut player = Player::new(cfg, events, to_loader, scan_tx, inv_tx, main, cancel.clone());

    loop {
        select! {
            _ = cancel.cancelled() => break,

            maybe_cmd = commands.recv() => {
                match maybe_cmd {
                    Some(cmd) => player.handle(cmd).await,
                    None => {
                        debug!("command channel closed; stopping player");
                        break;
                    }
                }
            }

            Some(loaded) = loaded_rx.recv() => player.apply_loaded(loaded).await,

            Some(outcome) = scan_rx.recv() => player.apply_scan(outcome).await,

            Some(ev) = inv_rx.recv() => player.apply_inventory(ev),

            _ = next_tick(&mut player.ticker), if player.running => player.on_tick().await,
        }
    }

    player.stop_watcher();
    Ok(())
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

struct Player {
    folder: Option<PathBuf>,
    interval_seconds: u64,
    recursive: bool,
    extensions: ExtensionFilter,
    watch_removals: bool,

    seq: Sequencer,
    index: Option<DirectoryIndex>,
    running: bool,
    epoch: u64,
    ticker: Option<Interval>,
    scan_in_flight: Option<u64>,
    start_after_scan: bool,
    in_flight: Option<Pending>,
    queued: Option<Pending>,

    main: FrameStore,
    fullscreen: Option<FrameStore>,

    events: Sender<PlayerEvent>,
    to_loader: Sender<LoadPhoto>,
    scan_tx: Sender<ScanOutcome>,
    inv_tx: Sender<InventoryEvent>,
    watcher: Option<CancellationToken>,
    cancel: CancellationToken,
    dropped_events: u64,
}

impl Player {
    fn new(
        cfg: Configuration,
        events: Sender<PlayerEvent>,
        to_loader: Sender<LoadPhoto>,
        scan_tx: Sender<ScanOutcome>,
        inv_tx: Sender<InventoryEvent>,
        main: FrameStore,
        cancel: CancellationToken,
    ) -> Self {
        let interval_seconds = if cfg.interval_seconds == 0 {
            DEFAULT_INTERVAL_SECONDS
        } else {
            cfg.interval_seconds
        };
        Self {
            folder: cfg.folder,
            interval_seconds,
            recursive: cfg.recursive,
            extensions: cfg.extensions,
            watch_removals: cfg.watch_removals,
            seq: Sequencer::new(cfg.play_mode, cfg.rng_seed),
            index: None,
            running: false,
            epoch: 0,
            ticker: None,
            scan_in_flight: None,
            start_after_scan: false,
            in_flight: None,
            queued: None,
            main,
            fullscreen: None,
            events,
            to_loader,
            scan_tx,
            inv_tx,
            watcher: None,
            cancel,
            dropped_events: 0,
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::StartPause => {
                if self.running {
                    self.pause();
                } else {
                    self.start().await;
                }
            }
            Command::Start => self.start().await,
            Command::Pause => self.pause(),
            Command::Next => self.step(Step::Next).await,
            Command::Previous => self.step(Step::Previous).await,
            Command::At(index) => self.show_index(index).await,
            Command::JumpTo(dir) => match tree::jump_index(self.seq.as_slice(), &dir) {
                Some(index) => self.show_index(index).await,
                None => self.report(StatusReport::error(format!(
                    "no images under {}",
                    dir.display()
                ))),
            },
            Command::Clear => {
                self.reset_scan();
                self.folder = None;
                self.report(StatusReport::info(
                    "cleared; select a folder and press start",
                ));
            }
            Command::ToggleFullscreen => self.toggle_fullscreen(),
            Command::SelectFolder(path) => self.select_folder(path),
            Command::Drop(path) => self.drop_path(path).await,
            Command::SetInterval(text) => self.set_interval(&text),
            Command::SetPlayMode(mode) => {
                self.seq.set_mode(mode);
                self.reset_scan();
                self.report(StatusReport::info(format!(
                    "play mode set to {mode}; press start"
                )));
            }
            Command::SetRecursive(recursive) => {
                self.recursive = recursive;
                self.reset_scan();
                self.report(StatusReport::info(format!(
                    "subfolder scanning {}; press start",
                    if recursive { "on" } else { "off" }
                )));
            }
            Command::SetExtensions(text) => {
                let filter = ExtensionFilter::parse(&text);
                if filter.is_empty() {
                    self.report(StatusReport::error(format!(
                        "no file types in {text:?}; keeping {}",
                        self.extensions
                    )));
                } else {
                    self.extensions = filter;
                    self.reset_scan();
                    self.report(StatusReport::info(format!(
                        "file types set to {}; press start",
                        self.extensions
                    )));
                }
            }
            Command::DeleteCurrent => self.delete_current().await,
            Command::Properties(reply) => {
                let _ = reply.send(self.properties().await);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    // --- state machine -------------------------------------------------

    async fn start(&mut self) {
        if self.running {
            self.report(StatusReport::info(format!(
                "already playing, {} images",
                self.seq.len()
            )));
            return;
        }
        let Some(root) = self.folder.clone() else {
            self.report(StatusReport::error("select a folder first"));
            return;
        };
        if self.seq.is_empty() {
            self.start_after_scan = true;
            if self.scan_in_flight == Some(self.epoch) {
                self.report(StatusReport::info("still scanning for images..."));
            } else {
                self.launch_scan(root);
            }
            return;
        }
        self.start_playback().await;
    }

    async fn start_playback(&mut self) {
        self.running = true;
        self.arm_ticker();
        self.emit(PlayerEvent::Running(true));
        self.report(StatusReport::info(format!(
            "playing, {} images",
            self.seq.len()
        )));
        self.publish_tree();

        if !self.main.has_image() {
            let first = match self.seq.mode() {
                PlayMode::Ordered => self.seq.at(0),
                PlayMode::Random => self.seq.random(),
            };
            match first {
                Some(pick) => self.dispatch(pick, Origin::Tick, Direction::Forward).await,
                None => self.no_more_images(),
            }
        }
    }

    fn pause(&mut self) {
        if self.running {
            // Timer first, so nothing fires between the two.
            self.ticker = None;
            self.running = false;
            self.emit(PlayerEvent::Running(false));
            self.abandon_automatic_advance();
        }
        self.report(StatusReport::info(format!(
            "paused, {} images",
            self.seq.len()
        )));
    }

    /// Automatic advances still pending when playback stops will never be
    /// shown, so the position goes back to the image on screen.
    fn abandon_automatic_advance(&mut self) {
        let queued_tick = self
            .queued
            .take_if(|p| p.request.origin == Origin::Tick)
            .is_some();
        let tick_in_flight = self
            .in_flight
            .as_ref()
            .is_some_and(|p| p.request.origin == Origin::Tick);
        // A queued manual pick already owns the cursor.
        if (queued_tick || tick_in_flight) && self.queued.is_none() {
            let shown = self.main.get();
            self.seq.restore(shown.path());
            debug!(
                path = ?shown.path(),
                "pending automatic advance dropped; position restored"
            );
        }
    }

    fn arm_ticker(&mut self) {
        let period = Duration::from_secs(self.interval_seconds);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    async fn on_tick(&mut self) {
        if !self.running {
            return;
        }
        if self.in_flight.is_some() {
            debug!("previous decode still running; skipping tick");
            return;
        }
        match self.seq.next() {
            Some(pick) => self.dispatch(pick, Origin::Tick, Direction::Forward).await,
            None => self.no_more_images(),
        }
    }

    async fn step(&mut self, step: Step) {
        let (pick, direction) = match step {
            Step::Next => (self.seq.next(), Direction::Forward),
            Step::Previous => (self.seq.previous(), Direction::Backward),
        };
        match pick {
            Some(pick) => self.dispatch(pick, Origin::Manual, direction).await,
            None => self.report(StatusReport::info("no images loaded")),
        }
    }

    async fn show_index(&mut self, index: usize) {
        match self.seq.at(index) {
            Some(pick) => self.dispatch(pick, Origin::Manual, Direction::Direct).await,
            None => {
                self.set_frame(Frame::empty());
                self.report(StatusReport::info("no more images"));
            }
        }
    }

    /// Everything failed or nothing is left: clear the surfaces and stop.
    fn no_more_images(&mut self) {
        self.set_frame(Frame::empty());
        if self.running {
            self.ticker = None;
            self.running = false;
            self.emit(PlayerEvent::Running(false));
        }
        self.report(StatusReport::info("no more images"));
    }

    // --- decode pipeline -----------------------------------------------

    async fn dispatch(&mut self, pick: Pick, origin: Origin, direction: Direction) {
        let pending = Pending {
            request: LoadPhoto {
                path: pick.path,
                origin,
                direction,
                epoch: self.epoch,
            },
            attempts_left: self.seq.len(),
        };
        if self.in_flight.is_some() {
            debug!(path = %pending.request.path.display(), "decode busy; queued");
            self.queued = Some(pending);
            return;
        }
        self.send_load(pending).await;
    }

    async fn send_load(&mut self, pending: Pending) {
        if self.to_loader.send(pending.request.clone()).await.is_err() {
            warn!("decode worker gone");
            return;
        }
        self.in_flight = Some(pending);
    }

    fn is_stale(&self, request: &LoadPhoto) -> bool {
        request.epoch != self.epoch || (request.origin == Origin::Tick && !self.running)
    }

    async fn apply_loaded(&mut self, loaded: PhotoLoaded) {
        let pending = self.in_flight.take();
        let PhotoLoaded { request, result } = loaded;
        let stale = self.is_stale(&request);

        match result {
            Ok(image) => {
                if stale {
                    debug!(path = %request.path.display(), "dropping stale decode");
                } else {
                    self.set_frame(Frame::new(image, request.path.clone()));
                    self.report_position();
                }
            }
            Err(err) => {
                if request.epoch == self.epoch && err.is_bad_file() {
                    self.prune(&request.path);
                }
                if stale {
                    debug!(path = %request.path.display(), "stale decode failed: {err}");
                } else {
                    self.report(StatusReport::error(err.to_string()));
                    if self.queued.is_none() {
                        let attempts_left = pending.map_or(0, |p| p.attempts_left);
                        self.retry(request, attempts_left.saturating_sub(1)).await;
                    }
                }
            }
        }

        if self.in_flight.is_none()
            && let Some(next) = self.queued.take()
        {
            if next.request.epoch == self.epoch {
                self.send_load(next).await;
            }
        }
    }

    async fn retry(&mut self, failed: LoadPhoto, attempts_left: usize) {
        if attempts_left == 0 || self.seq.is_empty() {
            self.no_more_images();
            return;
        }
        let pick = match failed.direction {
            Direction::Forward | Direction::Direct => self.seq.next(),
            Direction::Backward => self.seq.previous(),
        };
        let Some(pick) = pick else {
            self.no_more_images();
            return;
        };
        let pending = Pending {
            request: LoadPhoto {
                path: pick.path,
                origin: failed.origin,
                direction: failed.direction,
                epoch: self.epoch,
            },
            attempts_left,
        };
        self.send_load(pending).await;
    }

    fn set_frame(&self, frame: Frame) {
        if let Some(fs) = &self.fullscreen {
            fs.set(frame.clone());
        }
        self.main.set(frame);
    }

    fn report_position(&mut self) {
        if self.seq.mode() != PlayMode::Ordered {
            return;
        }
        if let Some(i) = self.seq.current_index() {
            self.report(StatusReport::info(format!(
                "playing ({} / {})",
                i + 1,
                self.seq.len()
            )));
        }
    }

    // --- scanning ------------------------------------------------------

    fn launch_scan(&mut self, root: PathBuf) {
        let opts = ScanOptions {
            recursive: self.recursive,
            extensions: self.extensions.clone(),
            ordered: self.seq.mode() == PlayMode::Ordered,
        };
        let epoch = self.epoch;
        let tx = self.scan_tx.clone();
        self.scan_in_flight = Some(epoch);
        self.report(StatusReport::info("scanning for images..."));
        tokio::spawn(async move {
            let walk_root = root.clone();
            let result = tokio::task::spawn_blocking(move || scan::scan(&walk_root, &opts))
                .await
                .unwrap_or_else(|join_err| {
                    Err(Error::Scan {
                        root,
                        source: std::io::Error::other(join_err.to_string()),
                    })
                });
            let _ = tx.send(ScanOutcome { epoch, result }).await;
        });
    }

    async fn apply_scan(&mut self, outcome: ScanOutcome) {
        if self.scan_in_flight == Some(outcome.epoch) {
            self.scan_in_flight = None;
        }
        if outcome.epoch != self.epoch {
            debug!("dropping stale scan result");
            return;
        }
        let start = std::mem::take(&mut self.start_after_scan);
        match outcome.result {
            Err(err) => {
                self.report(StatusReport::error(format!("scan failed: {err}")));
            }
            Ok(ScanResult { paths, index }) => {
                info!(count = paths.len(), "scanned images");
                self.seq.replace(paths);
                self.index = index;
                if self.seq.is_empty() {
                    self.report(StatusReport::error(
                        "no supported images found in this folder",
                    ));
                    return;
                }
                self.start_watcher();
                if start {
                    self.start_playback().await;
                } else {
                    self.publish_tree();
                }
            }
        }
    }

    /// Stop playback and forget everything derived from the current folder.
    fn reset_scan(&mut self) {
        if self.running {
            self.ticker = None;
            self.running = false;
            self.emit(PlayerEvent::Running(false));
        }
        self.epoch += 1;
        self.start_after_scan = false;
        self.queued = None;
        self.stop_watcher();
        self.set_frame(Frame::empty());
        self.seq.clear();
        self.index = None;
        self.publish_tree();
    }

    fn publish_tree(&mut self) {
        let tree = self.folder.as_deref().and_then(|root| {
            DirectoryTree::for_view(self.seq.mode(), self.recursive, self.index.as_ref(), root)
        });
        self.emit(PlayerEvent::DirectoryTree(tree));
    }

    fn prune(&mut self, path: &Path) -> bool {
        if !self.seq.remove(path) {
            return false;
        }
        if let Some(index) = self.index.as_mut() {
            index.remove(path);
        }
        debug!(path = %path.display(), remaining = self.seq.len(), "pruned");
        self.publish_tree();
        true
    }

    fn apply_inventory(&mut self, ev: InventoryEvent) {
        match ev {
            InventoryEvent::PhotoRemoved(path) => {
                if self.prune(&path) && self.seq.is_empty() && self.running {
                    self.no_more_images();
                }
            }
        }
    }

    fn start_watcher(&mut self) {
        self.stop_watcher();
        let (true, Some(root)) = (self.watch_removals, self.folder.clone()) else {
            return;
        };
        let token = self.cancel.child_token();
        let tx = self.inv_tx.clone();
        let recursive = self.recursive;
        tokio::spawn({
            let token = token.clone();
            async move {
                if let Err(err) = files::watch_removals(root, recursive, tx, token).await {
                    warn!("removal watcher stopped: {err:#}");
                }
            }
        });
        self.watcher = Some(token);
    }

    fn stop_watcher(&mut self) {
        if let Some(token) = self.watcher.take() {
            token.cancel();
        }
    }

    // --- folder / options ----------------------------------------------

    fn select_folder(&mut self, path: PathBuf) {
        self.reset_scan();
        info!(folder = %path.display(), "folder selected");
        self.folder = Some(path);
        self.report(StatusReport::info("folder updated; press start to play"));
    }

    async fn drop_path(&mut self, path: PathBuf) {
        let target = path.clone();
        let meta = tokio::task::spawn_blocking(move || std::fs::metadata(target)).await;
        match meta {
            Ok(Ok(meta)) => {
                let folder = if meta.is_dir() {
                    path
                } else {
                    path.parent().map(Path::to_path_buf).unwrap_or(path)
                };
                self.select_folder(folder);
            }
            Ok(Err(err)) => self.report(StatusReport::error(format!(
                "cannot open dropped path {}: {err}",
                path.display()
            ))),
            Err(err) => warn!("metadata task failed: {err}"),
        }
    }

    fn set_interval(&mut self, text: &str) {
        let setting = coerce_interval(text);
        if let Some(notice) = setting.notice {
            self.report(StatusReport::info(notice));
        }
        self.interval_seconds = setting.seconds;
        if self.running {
            self.arm_ticker();
        }
        debug!(seconds = self.interval_seconds, "interval updated");
    }

    fn toggle_fullscreen(&mut self) {
        if self.fullscreen.take().is_some() {
            self.emit(PlayerEvent::Fullscreen(None));
            return;
        }
        let current = self.main.get();
        if !current.has_image() {
            self.report(StatusReport::info("nothing to show full-screen"));
            return;
        }
        let store = FrameStore::with_frame((*current).clone());
        self.emit(PlayerEvent::Fullscreen(Some(store.watch())));
        self.fullscreen = Some(store);
    }

    // --- file actions --------------------------------------------------

    async fn delete_current(&mut self) {
        let Some(path) = self.main.get().path().map(Path::to_path_buf) else {
            self.report(StatusReport::info("nothing to delete"));
            return;
        };
        let target = path.clone();
        let outcome = tokio::task::spawn_blocking(move || files::delete_file(&target)).await;
        match outcome {
            Ok(Ok(())) => {
                self.report(StatusReport::info(format!("deleted {}", path.display())));
                self.prune(&path);
                if self.seq.is_empty() {
                    self.no_more_images();
                } else {
                    self.step(Step::Next).await;
                }
            }
            Ok(Err(err)) => self.report(StatusReport::error(err.to_string())),
            Err(err) => warn!("delete task failed: {err}"),
        }
    }

    async fn properties(&self) -> Result<FileProperties, String> {
        let Some(path) = self.main.get().path().map(Path::to_path_buf) else {
            return Err("no image shown".to_string());
        };
        tokio::task::spawn_blocking(move || files::properties(&path))
            .await
            .map_err(|err| err.to_string())?
            .map_err(|err| err.to_string())
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            running: self.running,
            mode: self.seq.mode(),
            current_index: self.seq.current_index(),
            current_path: self.seq.current_path().map(Path::to_path_buf),
            len: self.seq.len(),
            interval_seconds: self.interval_seconds,
            folder: self.folder.clone(),
            recursive: self.recursive,
            fullscreen_open: self.fullscreen.is_some(),
        }
    }

    // --- outbound ------------------------------------------------------

    fn report(&mut self, status: StatusReport) {
        match status.severity {
            Severity::Info => info!("{}", status.message),
            Severity::Error => warn!("{}", status.message),
        }
        self.emit(PlayerEvent::Status(status));
    }

    fn emit(&mut self, event: PlayerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped_events += 1;
                warn!(
                    ?event,
                    dropped = self.dropped_events,
                    "event queue full; UI is not draining events"
                );
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_event_queue_counts_dropped_events() {
        let (events, mut event_rx) = mpsc::channel(1);
        let (to_loader, _load_rx) = mpsc::channel(1);
        let (scan_tx, _scan_rx) = mpsc::channel(1);
        let (inv_tx, _inv_rx) = mpsc::channel(1);
        let mut player = Player::new(
            Configuration::default(),
            events,
            to_loader,
            scan_tx,
            inv_tx,
            FrameStore::new(),
            CancellationToken::new(),
        );

        player.emit(PlayerEvent::Running(true));
        player.emit(PlayerEvent::Running(false));
        player.report(StatusReport::info("lost"));
        assert_eq!(player.dropped_events, 2);

        assert!(matches!(event_rx.try_recv(), Ok(PlayerEvent::Running(true))));
        player.emit(PlayerEvent::Running(false));
        assert_eq!(player.dropped_events, 2);

        drop(event_rx);
        player.emit(PlayerEvent::Running(true));
        assert_eq!(player.dropped_events, 2);
    }
}
