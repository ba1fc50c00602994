//! Display-side composition of transport, scheduler and overlay.
//!
//! ```text
//!                    ┌──────────────── DisplaySession ────────────────┐
//!  WebSocket ──► RealtimeConnection ──events──► dispatch task         │
//!                    │                           │ photos    │ danmaku│
//!                    │                           ▼           ▼        │
//!                    │                         Wall      OverlayStage │
//!                    │                           ▲           ▲        │
//!                    │            slideshow driver (5 s)  frame driver│
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! Each callback locks the state it touches for one whole update and never
//! holds a lock across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use snapwall_core::{
    ComposeError, ComposerConfig, DanmakuComposer, DanmakuMessage, FrameStats, OverlayAnimator,
    OverlayConfig, OverlayRenderData, Photo, Prefetch, SlideshowConfig, SlideshowQueue,
    TextMeasure, Viewport,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{websocket_url, DEFAULT_API_BASE, DEFAULT_WS_BASE};
use crate::connection::{ConnectionConfig, ConnectionState, RealtimeConnection};
use crate::driver::PeriodicDriver;
use crate::protocol::{OutgoingMessage, Role, ServerMessage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub api_base: String,
    pub ws_base: String,
    pub activity_id: String,
    /// Reconnect and heartbeat settings. `url`, `session_id` and `role` are
    /// filled in by the session.
    pub connection: ConnectionConfig,
    pub slideshow: SlideshowConfig,
    pub overlay: OverlayConfig,
    pub composer: ComposerConfig,
    pub viewport: Viewport,
    pub frame_interval: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            activity_id: String::new(),
            connection: ConnectionConfig::default(),
            slideshow: SlideshowConfig::default(),
            overlay: OverlayConfig::default(),
            composer: ComposerConfig::default(),
            viewport: Viewport::default(),
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl DisplayConfig {
    pub fn websocket_url(&self) -> String {
        websocket_url(&self.ws_base, &self.activity_id)
    }
}

/// Who decides which photo is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAuthority {
    /// The local dual-queue scheduler.
    Client,
    /// The backend, via `play_photo` or a `joined` playlist.
    Server,
}

/// Side effect the session has to carry out after [`Wall::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    None,
    /// The photo set changed.
    Photos,
    Danmaku(DanmakuMessage),
    Ended(String),
}

/// Photo state of a display: the client scheduler plus whatever the
/// backend says when it drives playback.
pub struct Wall {
    slideshow: SlideshowQueue,
    authority: PlaybackAuthority,
    /// `(photo, index, total)` from the backend.
    server_current: Option<(Photo, usize, usize)>,
    ended: Option<String>,
}

impl Wall {
    pub fn new(slideshow: SlideshowQueue) -> Self {
        Self {
            slideshow,
            authority: PlaybackAuthority::Client,
            server_current: None,
            ended: None,
        }
    }

    pub fn apply(&mut self, message: ServerMessage) -> Dispatch {
        match message {
            ServerMessage::Joined {
                activity_id,
                photos,
                playlist,
                current_index,
                ..
            } => {
                log::info!("Joined activity {activity_id} with {} photos", photos.len());
                self.slideshow.set_photos(photos);
                if let Some(playlist) = playlist {
                    let index = current_index.unwrap_or(0);
                    let total = playlist.len();
                    self.set_authority(PlaybackAuthority::Server);
                    self.server_current = playlist
                        .into_iter()
                        .nth(index)
                        .map(|photo| (photo, index, total));
                }
                self.show_first();
                Dispatch::Photos
            }
            ServerMessage::PhotoAdded { photo } => {
                log::debug!("Photo {} added", photo.id);
                if self.slideshow.add_photo(photo) {
                    self.show_first();
                    Dispatch::Photos
                } else {
                    Dispatch::None
                }
            }
            ServerMessage::PlayPhoto {
                photo, index, total, ..
            } => {
                self.set_authority(PlaybackAuthority::Server);
                self.slideshow.add_photo(photo.clone());
                self.server_current = Some((photo, index, total));
                Dispatch::Photos
            }
            ServerMessage::Danmaku(message) => Dispatch::Danmaku(message),
            ServerMessage::ActivityEnded {
                activity_id, reason, ..
            } => {
                log::info!("Activity {activity_id} ended: {reason}");
                self.ended = Some(reason.clone());
                Dispatch::Ended(reason)
            }
            ServerMessage::Pong { timestamp } => {
                log::debug!("Pong {timestamp}");
                Dispatch::None
            }
            ServerMessage::Error {
                code,
                message,
                retry_after,
            } => {
                match retry_after {
                    Some(secs) => log::error!("Server error {code}: {message} (retry after {secs}s)"),
                    None => log::error!("Server error {code}: {message}"),
                }
                Dispatch::None
            }
        }
    }

    /// Seed from an HTTP snapshot. Ignored once photos are known, since the
    /// live snapshot is fresher.
    pub fn seed(&mut self, photos: Vec<Photo>) -> bool {
        if self.slideshow.photo_count() > 0 || photos.is_empty() {
            return false;
        }
        self.slideshow.set_photos(photos);
        self.show_first();
        true
    }

    /// Slideshow timer. The scheduler keeps advancing in server mode, but
    /// its pick is not what is shown.
    pub fn tick(&mut self) -> Option<&Photo> {
        self.slideshow.tick();
        self.current_photo()
    }

    pub fn report_failed(&mut self, photo_id: &str) -> bool {
        self.slideshow.mark_failed(photo_id)
    }

    pub fn current_photo(&self) -> Option<&Photo> {
        match self.authority {
            PlaybackAuthority::Client => self.slideshow.current(),
            PlaybackAuthority::Server => self.server_current.as_ref().map(|(photo, _, _)| photo),
        }
    }

    /// `(index, total)` of the visible photo.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self.authority {
            PlaybackAuthority::Client => self.slideshow.position(),
            PlaybackAuthority::Server => self
                .server_current
                .as_ref()
                .map(|(_, index, total)| (*index, *total)),
        }
    }

    pub fn authority(&self) -> PlaybackAuthority {
        self.authority
    }

    pub fn ended_reason(&self) -> Option<&str> {
        self.ended.as_deref()
    }

    pub fn slideshow(&self) -> &SlideshowQueue {
        &self.slideshow
    }

    fn set_authority(&mut self, authority: PlaybackAuthority) {
        if self.authority != authority {
            log::info!("Playback is now {authority:?}-driven");
            self.authority = authority;
        }
    }

    /// Put something on screen right away instead of waiting a full interval.
    fn show_first(&mut self) {
        if self.authority == PlaybackAuthority::Client && self.slideshow.current().is_none() {
            self.slideshow.tick();
        }
    }
}

/// Overlay animator plus the measurer it draws with.
struct OverlayStage {
    animator: OverlayAnimator,
    measure: Box<dyn TextMeasure + Send>,
    last_frame: FrameStats,
}

impl OverlayStage {
    fn frame(&mut self) {
        let stats = self.animator.frame(&mut *self.measure);
        if stats.spawned > 0 || stats.retired > 0 {
            log::trace!("Overlay frame {stats:?}");
        }
        self.last_frame = stats;
    }
}

/// A running display: one connection, one wall, one overlay.
///
/// Dropping it tears everything down.
pub struct DisplaySession {
    config: DisplayConfig,
    connection: Arc<RealtimeConnection>,
    wall: Arc<Mutex<Wall>>,
    stage: Arc<Mutex<OverlayStage>>,
    composer: Mutex<DanmakuComposer>,
    prefetch: Arc<dyn Prefetch + Send + Sync>,
    cancel: CancellationToken,
    dispatch: JoinHandle<()>,
    slideshow_driver: PeriodicDriver,
    frame_driver: PeriodicDriver,
}

impl DisplaySession {
    /// Connect and start all drivers. Must be called inside a Tokio runtime.
    pub fn start(
        config: DisplayConfig,
        session_id: impl Into<String>,
        measure: Box<dyn TextMeasure + Send>,
        prefetch: Arc<dyn Prefetch + Send + Sync>,
    ) -> Self {
        let connection_config = ConnectionConfig {
            url: config.websocket_url(),
            session_id: session_id.into(),
            role: Role::Display,
            ..config.connection.clone()
        };
        let mut connection = RealtimeConnection::new(connection_config);
        let events = connection.take_event_rx();
        let connection = Arc::new(connection);

        let wall = Arc::new(Mutex::new(Wall::new(SlideshowQueue::new())));
        let stage = Arc::new(Mutex::new(OverlayStage {
            animator: OverlayAnimator::new(config.overlay.clone(), config.viewport),
            measure,
            last_frame: FrameStats::default(),
        }));
        let cancel = CancellationToken::new();

        let dispatch = {
            let connection = Arc::clone(&connection);
            let wall = Arc::clone(&wall);
            let stage = Arc::clone(&stage);
            let prefetch = Arc::clone(&prefetch);
            let cancel = cancel.clone();
            let prefetch_ahead = config.slideshow.prefetch_ahead;
            tokio::spawn(async move {
                let Some(mut events) = events else {
                    return;
                };
                loop {
                    let message = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        message = events.recv() => match message {
                            Some(message) => message,
                            None => break,
                        },
                    };
                    let dispatch = {
                        let mut wall = lock(&wall);
                        let dispatch = wall.apply(message);
                        if dispatch == Dispatch::Photos {
                            wall.slideshow().prefetch_upcoming(prefetch_ahead, &*prefetch);
                        }
                        dispatch
                    };
                    match dispatch {
                        Dispatch::Danmaku(message) => {
                            lock(&stage).animator.enqueue(message);
                        }
                        Dispatch::Ended(_) => connection.disconnect(),
                        Dispatch::None | Dispatch::Photos => {}
                    }
                }
                log::debug!("Dispatch task stopped");
            })
        };

        let slideshow_driver = {
            let wall = Arc::clone(&wall);
            let prefetch = Arc::clone(&prefetch);
            let prefetch_ahead = config.slideshow.prefetch_ahead;
            PeriodicDriver::spawn("slideshow", config.slideshow.interval, move || {
                let mut wall = lock(&wall);
                if let Some(photo) = wall.tick() {
                    log::debug!("Showing photo {}", photo.id);
                }
                wall.slideshow().prefetch_upcoming(prefetch_ahead, &*prefetch);
            })
        };

        let frame_driver = {
            let stage = Arc::clone(&stage);
            PeriodicDriver::spawn("overlay", config.frame_interval, move || {
                lock(&stage).frame();
            })
        };

        connection.connect();

        let composer = Mutex::new(DanmakuComposer::new(config.composer.clone()));
        Self {
            config,
            connection,
            wall,
            stage,
            composer,
            prefetch,
            cancel,
            dispatch,
            slideshow_driver,
            frame_driver,
        }
    }

    /// Seed the wall from an HTTP snapshot taken before the socket joined.
    pub fn seed_photos(&self, photos: Vec<Photo>) -> bool {
        let mut wall = lock(&self.wall);
        let seeded = wall.seed(photos);
        if seeded {
            wall.slideshow()
                .prefetch_upcoming(self.config.slideshow.prefetch_ahead, &*self.prefetch);
        }
        seeded
    }

    /// Validate and send a danmaku from this display.
    ///
    /// `Ok(false)` means the text was valid but the connection is not open.
    pub fn send_danmaku(&self, text: &str) -> Result<bool, ComposeError> {
        let content = lock(&self.composer).compose(text, Instant::now())?;
        Ok(self.connection.send(OutgoingMessage::danmaku(content)))
    }

    /// The surface failed to load this photo.
    pub fn report_failed(&self, photo_id: &str) -> bool {
        lock(&self.wall).report_failed(photo_id)
    }

    pub fn resize(&self, viewport: Viewport) {
        lock(&self.stage).animator.resize(viewport);
    }

    pub fn current_photo(&self) -> Option<Photo> {
        lock(&self.wall).current_photo().cloned()
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        lock(&self.wall).position()
    }

    pub fn authority(&self) -> PlaybackAuthority {
        lock(&self.wall).authority()
    }

    pub fn ended_reason(&self) -> Option<String> {
        lock(&self.wall).ended_reason().map(str::to_string)
    }

    /// `(total photos, priority queue, regular queue)`.
    pub fn queue_lengths(&self) -> (usize, usize, usize) {
        let wall = lock(&self.wall);
        let slideshow = wall.slideshow();
        (
            slideshow.photo_count(),
            slideshow.priority_len(),
            slideshow.regular_len(),
        )
    }

    /// Draw list of the most recent overlay frame.
    pub fn overlay_snapshot(&self) -> Vec<OverlayRenderData> {
        lock(&self.stage).animator.render_list()
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        lock(&self.stage).last_frame
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &RealtimeConnection {
        &self.connection
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Stop drivers and dispatch, cancel reconnects, close the socket.
    /// Idempotent.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            log::info!("Shutting down display for {}", self.config.activity_id);
        }
        self.cancel.cancel();
        self.slideshow_driver.cancel();
        self.frame_driver.cancel();
        self.dispatch.abort();
        self.connection.disconnect();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for DisplaySession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
