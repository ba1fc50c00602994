//! # snapwall-text
//!
//! Real text measurement for the danmaku overlay, backed by `cosmic-text`.
//!
//! ```text
//! OverlayAnimator::frame ──► TextMeasure::measure_text(text, FontSpec)
//!                                 │
//!                                 ▼
//!                         CosmicMeasure ── LRU (text, size, weight, family)
//!                                 │ miss
//!                                 ▼
//!                       FontSystem + Buffer shaping
//! ```

pub mod measure;

pub use measure::CosmicMeasure;
