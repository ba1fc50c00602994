//! Seams between the state machines and the rendering surface.
//!
//! The scheduler and the animator never touch fonts or image caches
//! directly. A real surface plugs in `snapwall-text` for measurement and an
//! HTTP prefetcher from `snapwall-live`; tests plug in fixed-width doubles.

/// Font used to draw (and therefore measure) one overlay item.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Font size in pixels.
    pub size: f32,
    /// Font weight (100–900). 700 = bold.
    pub weight: u16,
    /// CSS-style family chain, e.g. `"Microsoft YaHei", sans-serif`.
    pub family: String,
}

impl FontSpec {
    pub fn new(size: f32, weight: u16, family: impl Into<String>) -> Self {
        Self {
            size,
            weight,
            family: family.into(),
        }
    }

    /// CSS shorthand, as a canvas `font` property would take it.
    pub fn css(&self) -> String {
        let weight = if self.weight >= 700 { "bold".to_string() } else { self.weight.to_string() };
        format!("{weight} {}px {}", self.size, self.family)
    }
}

/// Measures the rendered width of a single line of text.
pub trait TextMeasure {
    /// Width in pixels of `text` drawn with `font`.
    fn measure_text(&mut self, text: &str, font: &FontSpec) -> f32;
}

/// Fire-and-forget image warm-up. Failures are the implementor's to swallow.
pub trait Prefetch {
    fn prefetch(&self, url: &str);
}

impl<T: TextMeasure + ?Sized> TextMeasure for Box<T> {
    fn measure_text(&mut self, text: &str, font: &FontSpec) -> f32 {
        (**self).measure_text(text, font)
    }
}

impl<T: Prefetch + ?Sized> Prefetch for std::sync::Arc<T> {
    fn prefetch(&self, url: &str) {
        (**self).prefetch(url)
    }
}
