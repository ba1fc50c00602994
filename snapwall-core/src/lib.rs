//! # snapwall-core — playback and overlay state machines for Snapwall
//!
//! Everything in this crate is synchronous and free of I/O. The async
//! runtime side (`snapwall-live`) owns timers and sockets and calls into
//! these types once per tick, frame or inbound message.
//!
//! ## Architecture
//!
//! ```text
//!  photo_added / joined            danmaku
//!        │                            │
//!        ▼                            ▼
//! ┌───────────────┐           ┌────────────────┐
//! │ SlideshowQueue│           │ OverlayAnimator│
//! │ priority      │           │ pending (FIFO) │
//! │ regular       │           │ active (≤ cap) │
//! └──────┬────────┘           └───────┬────────┘
//!        │ tick (5 s)                 │ frame (~16 ms)
//!        ▼                            ▼
//!   current photo              render list ── TextMeasure
//!        │
//!        └── upcoming(n) ── Prefetch
//! ```
//!
//! ## Modules
//!
//! - [`model`] — Photo, danmaku and event records as they travel on the wire
//! - [`slideshow`] — dual-queue photo scheduler with Fisher–Yates reshuffling
//! - [`overlay`] — bounded-concurrency danmaku animation
//! - [`capability`] — text measurement and prefetch seams
//! - [`session`] — per-activity participant identity
//! - [`compose`] — outbound danmaku validation and cooldown

pub mod capability;
pub mod compose;
pub mod model;
pub mod overlay;
pub mod session;
pub mod slideshow;

pub use capability::{FontSpec, Prefetch, TextMeasure};
pub use compose::{ComposeError, ComposerConfig, DanmakuComposer};
pub use model::{DanmakuMessage, Event, EventSnapshot, EventStatus, Photo};
pub use overlay::{
    ActiveOverlayItem, FrameStats, OverlayAnimator, OverlayColor, OverlayConfig,
    OverlayRenderData, Viewport,
};
pub use session::{MemoryStorage, SessionStorage, SessionStore};
pub use slideshow::{shuffle, SlideshowConfig, SlideshowQueue};
