//! Danmaku overlay animation.
//!
//! Messages enter a FIFO backlog and are promoted to on-screen items one
//! frame at a time, never more than `max_concurrent` at once. Each item
//! scrolls right-to-left at a constant speed and is retired once its right
//! edge (`x + width`) has passed the left edge of the viewport.
//!
//! The animator owns no clock. A driver calls [`OverlayAnimator::frame`] at
//! the display's frame rate and draws [`OverlayAnimator::render_list`].

use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::capability::{FontSpec, TextMeasure};
use crate::model::DanmakuMessage;

/// sRGB text colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl OverlayColor {
    pub const WHITE: Self = Self::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Self = Self::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Normalised RGBA, opaque.
    pub fn to_array(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            1.0,
        ]
    }

    /// `#RRGGBB`.
    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

pub const DEFAULT_PALETTE: [OverlayColor; 8] = [
    OverlayColor::rgb(0xFF, 0xFF, 0xFF),
    OverlayColor::rgb(0xFF, 0xD7, 0x00),
    OverlayColor::rgb(0xFF, 0x69, 0xB4),
    OverlayColor::rgb(0x00, 0xFF, 0xFF),
    OverlayColor::rgb(0xFF, 0x63, 0x47),
    OverlayColor::rgb(0x7F, 0xFF, 0x00),
    OverlayColor::rgb(0xFF, 0x14, 0x93),
    OverlayColor::rgb(0x00, 0xFA, 0x9A),
];

pub const DEFAULT_FONT_SIZES: [u16; 4] = [24, 28, 32, 36];

pub const DEFAULT_FONT_FAMILY: &str = r#""Microsoft YaHei", "PingFang TC", sans-serif"#;

/// Overlay tuning knobs.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Upper bound on simultaneously animating items.
    pub max_concurrent: usize,
    /// Pixels per frame every item moves at minimum.
    pub base_speed: f32,
    /// Extra speed drawn uniformly from `[0, speed_jitter)`.
    pub speed_jitter: f32,
    /// Distance from the top edge to the spawn band.
    pub band_offset: f32,
    /// Height removed from the viewport to form the spawn band.
    pub band_trim: f32,
    pub palette: Vec<OverlayColor>,
    pub font_sizes: Vec<u16>,
    pub font_family: String,
    pub font_weight: u16,
    /// Stroke width of the dark outline drawn under the fill.
    pub outline_width: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            base_speed: 2.0,
            speed_jitter: 2.0,
            band_offset: 50.0,
            band_trim: 100.0,
            palette: DEFAULT_PALETTE.to_vec(),
            font_sizes: DEFAULT_FONT_SIZES.to_vec(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_weight: 700,
            outline_width: 3.0,
        }
    }
}

/// Drawing surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// One message currently moving across the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOverlayItem {
    pub id: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub color: OverlayColor,
    pub font_size: u16,
    /// Rendered text width, measured once at spawn.
    pub width: f32,
}

impl ActiveOverlayItem {
    /// True once the item's right edge has left the viewport on the left.
    pub fn is_offscreen(&self) -> bool {
        self.x + self.width < 0.0
    }
}

/// Everything a surface needs to draw one item this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRenderData {
    pub id: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub font: FontSpec,
    pub fill: OverlayColor,
    pub outline: OverlayColor,
    pub outline_width: f32,
}

/// What happened during one [`OverlayAnimator::frame`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub spawned: usize,
    pub retired: usize,
    pub active: usize,
    pub pending: usize,
}

/// Bounded-concurrency danmaku engine.
pub struct OverlayAnimator {
    config: OverlayConfig,
    viewport: Viewport,
    seen: HashSet<String>,
    pending: VecDeque<DanmakuMessage>,
    active: Vec<ActiveOverlayItem>,
    rng: StdRng,
}

impl OverlayAnimator {
    pub fn new(config: OverlayConfig, viewport: Viewport) -> Self {
        Self::with_rng(config, viewport, StdRng::from_entropy())
    }

    pub fn with_seed(config: OverlayConfig, viewport: Viewport, seed: u64) -> Self {
        Self::with_rng(config, viewport, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: OverlayConfig, viewport: Viewport, rng: StdRng) -> Self {
        Self {
            config,
            viewport,
            seen: HashSet::new(),
            pending: VecDeque::new(),
            active: Vec::new(),
            rng,
        }
    }

    /// Queue a message for display. Returns `false` if this id was seen before.
    pub fn enqueue(&mut self, message: DanmakuMessage) -> bool {
        if !self.seen.insert(message.id.clone()) {
            log::debug!("Ignoring duplicate danmaku {}", message.id);
            return false;
        }
        self.pending.push_back(message);
        true
    }

    /// Advance one animation frame: spawn, move, retire.
    pub fn frame<M: TextMeasure + ?Sized>(&mut self, measure: &mut M) -> FrameStats {
        let mut spawned = 0;
        while self.active.len() < self.config.max_concurrent {
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            let item = self.spawn(message, measure);
            self.active.push(item);
            spawned += 1;
        }

        for item in &mut self.active {
            item.x -= item.speed;
        }

        let before = self.active.len();
        self.active.retain(|item| !item.is_offscreen());

        FrameStats {
            spawned,
            retired: before - self.active.len(),
            active: self.active.len(),
            pending: self.pending.len(),
        }
    }

    fn spawn<M: TextMeasure + ?Sized>(
        &mut self,
        message: DanmakuMessage,
        measure: &mut M,
    ) -> ActiveOverlayItem {
        let color = self
            .config
            .palette
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(OverlayColor::WHITE);
        let font_size = self
            .config
            .font_sizes
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(DEFAULT_FONT_SIZES[0]);

        let band = (self.viewport.height - self.config.band_trim).max(0.0);
        let y = self.rng.gen::<f32>() * band + self.config.band_offset;
        let speed = self.config.base_speed + self.rng.gen::<f32>() * self.config.speed_jitter;

        let font = self.font_for(font_size);
        let width = measure.measure_text(&message.content, &font);

        ActiveOverlayItem {
            id: message.id,
            content: message.content,
            x: self.viewport.width,
            y,
            speed,
            color,
            font_size,
            width,
        }
    }

    fn font_for(&self, size: u16) -> FontSpec {
        FontSpec::new(size as f32, self.config.font_weight, self.config.font_family.clone())
    }

    /// Draw list for the current frame, in spawn order.
    pub fn render_list(&self) -> Vec<OverlayRenderData> {
        self.active
            .iter()
            .map(|item| OverlayRenderData {
                id: item.id.clone(),
                content: item.content.clone(),
                x: item.x,
                y: item.y,
                font: self.font_for(item.font_size),
                fill: item.color,
                outline: OverlayColor::BLACK,
                outline_width: self.config.outline_width,
            })
            .collect()
    }

    /// Applies to items spawned from now on. Items in flight keep their lane.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn active(&self) -> &[ActiveOverlayItem] {
        &self.active
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Drop everything on screen and in the backlog. Seen ids are kept.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.active.clear();
    }
}
