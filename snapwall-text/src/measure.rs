//! Width measurement by shaping text with `cosmic-text`.
//!
//! Danmaku items are measured once at spawn, but the same short messages
//! and font sizes come up again and again, so widths are memoised in an
//! LRU keyed by everything that affects shaping.

use std::num::NonZeroUsize;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Weight};
use lru::LruCache;
use snapwall_core::{FontSpec, TextMeasure};

const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct WidthKey {
    text: String,
    /// `f32::to_bits` of the font size.
    size: u32,
    weight: u16,
    family: String,
}

/// `TextMeasure` backed by a cosmic-text `FontSystem`.
pub struct CosmicMeasure {
    font_system: FontSystem,
    widths: LruCache<WidthKey, f32>,
    hits: u64,
    misses: u64,
}

impl CosmicMeasure {
    /// System font discovery. This scans installed fonts and can take a
    /// noticeable moment; create one per display.
    pub fn new() -> Self {
        Self::with_font_system(FontSystem::new(), DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_font_system(font_system: FontSystem, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        log::debug!(
            "Text measure ready: {} font faces, cache capacity {}",
            font_system.db().faces().count(),
            capacity
        );
        Self {
            font_system,
            widths: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Number of font faces the system knows about.
    pub fn face_count(&self) -> usize {
        self.font_system.db().faces().count()
    }

    /// `(hits, misses)` of the width cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    fn shape_width(&mut self, text: &str, font: &FontSpec) -> f32 {
        let metrics = Metrics::new(font.size, font.size * 1.2);
        let attrs = Attrs::new()
            .family(first_family(&font.family))
            .weight(Weight(font.weight));

        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        // Unbounded width: a danmaku line never wraps.
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(&mut self.font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        buffer
            .layout_runs()
            .flat_map(|run| run.glyphs.iter())
            .map(|g| g.x + g.w)
            .fold(0.0f32, f32::max)
    }
}

impl Default for CosmicMeasure {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasure for CosmicMeasure {
    fn measure_text(&mut self, text: &str, font: &FontSpec) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let key = WidthKey {
            text: text.to_string(),
            size: font.size.to_bits(),
            weight: font.weight,
            family: font.family.clone(),
        };
        if let Some(width) = self.widths.get(&key) {
            self.hits += 1;
            return *width;
        }

        self.misses += 1;
        let width = self.shape_width(text, font);
        self.widths.put(key, width);
        width
    }
}

/// First entry of a CSS family chain, with generic names mapped to
/// cosmic-text's generic families. cosmic-text falls back on its own when
/// a named family is missing.
fn first_family(chain: &str) -> Family<'_> {
    let first = chain
        .split(',')
        .next()
        .unwrap_or(chain)
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    match first.to_ascii_lowercase().as_str() {
        "" | "sans-serif" | "system-ui" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(first),
    }
}
