//! Drives the engine against a simulated media subsystem
//!
//! Connection results and controller callbacks arrive on background
//! threads, the way a platform subsystem delivers them; the main thread
//! applies them with `dispatch_with_timeout`.
//!
//! Run with: cargo run -p media-source-engine --example simulated_session
//! Set MEDIA_SOURCE_LOG_MODE=debug to see the engine's trace output.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use media_source::prelude::*;
use media_source::{
    init_logging_from_env, CallbackId, CallbackKind, ConnectionEvent, ConnectionListener,
    ControllerCallback, ControllerUpdate, MediaController, MediaMetadata, PackageName,
    PlaybackStatus, QueueItem, SessionToken,
};
use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;

/// Simulated media session walkthrough
#[derive(Parser, Debug)]
#[command(name = "simulated_session")]
struct Args {
    /// Delay before a connection attempt resolves, in milliseconds
    #[arg(long, default_value = "100")]
    connect_delay_ms: u64,

    /// Interval between simulated tracks, in milliseconds
    #[arg(long, default_value = "150")]
    track_interval_ms: u64,

    /// Make every connection attempt fail
    #[arg(long)]
    fail_connect: bool,

    /// Engine configuration as a JSON file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                EngineConfig::from_json_str(&json).context("Invalid engine configuration")
            }
            None => Ok(EngineConfig::default()),
        }
    }
}

struct SimulatedController {
    token: SessionToken,
    package: PackageName,
}

impl MediaController for SimulatedController {
    fn session_token(&self) -> &SessionToken {
        &self.token
    }
    fn package_name(&self) -> &PackageName {
        &self.package
    }
    fn metadata(&self) -> Option<MediaMetadata> {
        Some(MediaMetadata::with_title("Station Ident"))
    }
    fn playback_status(&self) -> Option<PlaybackStatus> {
        Some(PlaybackStatus::new(PlaybackState::Buffering))
    }
    fn queue(&self) -> Option<Vec<QueueItem>> {
        None
    }
}

type Callbacks = Arc<Mutex<HashMap<CallbackId, (CallbackKind, ControllerCallback)>>>;

struct SimulatedSubsystem {
    callbacks: Callbacks,
    active: Node<Vec<ControllerHandle>>,
    next_id: Cell<u64>,
    connect_delay: Duration,
    track_interval: Duration,
    fail_connect: bool,
}

impl SimulatedSubsystem {
    fn new(args: &Args) -> Self {
        Self {
            callbacks: Arc::default(),
            active: Node::with_value(Vec::new()),
            next_id: Cell::new(1),
            connect_delay: Duration::from_millis(args.connect_delay_ms),
            track_interval: Duration::from_millis(args.track_interval_ms),
            fail_connect: args.fail_connect,
        }
    }

    /// Play a few tracks from a background thread
    fn start_broadcast(&self) -> thread::JoinHandle<()> {
        let callbacks = Arc::clone(&self.callbacks);
        let interval = self.track_interval;
        thread::spawn(move || {
            for (i, title) in ["Overture", "Interlude", "Finale"].iter().enumerate() {
                thread::sleep(interval);
                let registered: Vec<_> = callbacks.lock().values().cloned().collect();
                for (kind, callback) in registered {
                    let update = match kind {
                        CallbackKind::Metadata => {
                            ControllerUpdate::Metadata(Some(MediaMetadata::with_title(*title)))
                        }
                        CallbackKind::PlaybackState => ControllerUpdate::PlaybackState(Some(
                            PlaybackStatus::new(PlaybackState::Playing)
                                .with_position(i as u64 * 1_000),
                        )),
                        CallbackKind::Queue => ControllerUpdate::Queue(Some(vec![
                            QueueItem::new(i as i64, *title),
                        ])),
                    };
                    callback(update);
                }
            }
        })
    }
}

impl MediaSessionSubsystem for SimulatedSubsystem {
    fn connect(&self, endpoint: &EndpointId, listener: ConnectionListener) {
        let session = SessionToken::new(format!("{}#1", endpoint));
        let delay = self.connect_delay;
        let fail = self.fail_connect;
        thread::spawn(move || {
            thread::sleep(delay);
            if fail {
                listener(ConnectionEvent::Failed("simulated failure".to_string()));
            } else {
                listener(ConnectionEvent::Connected(session));
            }
        });
    }

    fn disconnect(&self, endpoint: &EndpointId) {
        println!("   disconnect {}", endpoint);
    }

    fn controller_for(&self, token: &SessionToken) -> Option<ControllerHandle> {
        let package = token.as_str().split('/').next().unwrap_or_default();
        Some(ControllerHandle::new(SimulatedController {
            token: token.clone(),
            package: PackageName::new(package),
        }))
    }

    fn register_callback(
        &self,
        _controller: &ControllerHandle,
        kind: CallbackKind,
        callback: ControllerCallback,
    ) -> CallbackId {
        let id = CallbackId::new(self.next_id.get());
        self.next_id.set(id.value() + 1);
        self.callbacks.lock().insert(id, (kind, callback));
        id
    }

    fn unregister_callback(&self, _controller: &ControllerHandle, _kind: CallbackKind, id: CallbackId) {
        self.callbacks.lock().remove(&id);
    }

    fn active_controllers(&self) -> Node<Vec<ControllerHandle>> {
        self.active.clone()
    }
}

fn pump(engine: &MediaSourceEngine, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        engine.dispatch_with_timeout(Duration::from_millis(20));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging_from_env().context("Failed to initialize logging")?;

    println!("Media Source Engine - Simulated Session");
    println!("=======================================");

    let radio = MediaSourceHandle::browsable("com.example.radio", "com.example.radio/.BrowseService")
        .with_display_name("Radio");
    let podcasts = MediaSourceHandle::new("com.example.podcasts").with_display_name("Podcasts");
    let store = Arc::new(InMemorySelectionStore::with_sources(vec![
        radio.clone(),
        podcasts.clone(),
    ]));
    let subsystem = Rc::new(SimulatedSubsystem::new(&args));

    let engine = MediaSourceEngine::new(args.engine_config()?, store, subsystem.clone())?;

    let _state = engine
        .connection_state()
        .observe(|state| println!("connection: {}", state));
    let _snapshot = engine.snapshot().observe(|snapshot| {
        let title = snapshot
            .metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "snapshot {}: source={} title={} playing={} queue={}",
            snapshot.generation,
            snapshot.package_name().map(PackageName::as_str).unwrap_or("none"),
            title,
            snapshot.is_playing(),
            snapshot.has_queue()
        );
    });

    println!("\nSelecting {}", radio.name());
    engine.select(&radio)?;
    pump(&engine, subsystem.connect_delay * 3);

    let broadcast = subsystem.start_broadcast();
    pump(&engine, subsystem.track_interval * 4);
    let _ = broadcast.join();

    println!("\nSelecting {}", podcasts.name());
    engine.select(&podcasts)?;
    pump(&engine, Duration::from_millis(100));

    engine.shutdown();
    Ok(())
}
