//! Dual-queue slideshow scheduler.
//!
//! Photos live in exactly one of two queues:
//!
//! ```text
//!   priority (new, not yet shown)     regular (rotation, reshuffled per cycle)
//!  ┌────┬────┬────┐                  ┌────┬────┬────┬────┬────┐
//!  │ p13│ p12│ p11│ ── shown once ─► │ r0 │ r1 │ r2 │ .. │ p13│
//!  └────┴────┴────┘                  └────┴────┴────┴────┴────┘
//!                                          ▲ cursor
//! ```
//!
//! Each tick shows the head of `priority` if there is one, otherwise the
//! photo under the regular cursor. A priority photo is appended to the tail
//! of `regular` once shown. When the cursor runs off the end of `regular`
//! it wraps to 0, and `regular` is reshuffled if no new photos are waiting.
//!
//! Failed photos are excluded for good; played ids only ever grow.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capability::Prefetch;
use crate::model::Photo;

/// Scheduler timing.
#[derive(Debug, Clone)]
pub struct SlideshowConfig {
    /// Time each photo stays on screen.
    pub interval: Duration,
    /// How many upcoming photos to prefetch after each tick.
    pub prefetch_ahead: usize,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            prefetch_ahead: 3,
        }
    }
}

/// Fisher–Yates shuffle into a new vector. Every permutation is equally likely.
pub fn shuffle<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.gen_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// Client-side playback order for the photo wall.
pub struct SlideshowQueue {
    /// Canonical photo set, in delivery order.
    photos: Vec<Photo>,
    priority: VecDeque<Photo>,
    regular: Vec<Photo>,
    played: HashSet<String>,
    failed: HashSet<String>,
    /// Next position to show in `regular`.
    cursor: usize,
    current: Option<Photo>,
    /// `(index, total)` of `current` in `priority ++ regular` when it was shown.
    position: Option<(usize, usize)>,
    /// Set once the first non-empty set has been shuffled into `regular`.
    seeded: bool,
    rng: StdRng,
}

impl SlideshowQueue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic ordering, for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            photos: Vec::new(),
            priority: VecDeque::new(),
            regular: Vec::new(),
            played: HashSet::new(),
            failed: HashSet::new(),
            cursor: 0,
            current: None,
            position: None,
            seeded: false,
            rng,
        }
    }

    /// Replace the canonical set with a full snapshot.
    ///
    /// Duplicate ids in the snapshot keep their first occurrence.
    pub fn set_photos(&mut self, photos: Vec<Photo>) {
        let mut ids = HashSet::with_capacity(photos.len());
        self.photos = photos
            .into_iter()
            .filter(|p| ids.insert(p.id.clone()))
            .collect();
        self.recompute();
    }

    /// Apply a single arrival. Returns `false` for a duplicate delivery.
    pub fn add_photo(&mut self, photo: Photo) -> bool {
        if self.photos.iter().any(|p| p.id == photo.id) {
            return false;
        }
        self.photos.push(photo);
        self.recompute();
        true
    }

    /// Exclude a photo whose image failed to load. Returns `false` if it was
    /// already excluded.
    pub fn mark_failed(&mut self, id: &str) -> bool {
        if !self.failed.insert(id.to_owned()) {
            return false;
        }
        log::warn!("Photo {id} failed to load; removing it from rotation");

        self.priority.retain(|p| p.id != id);
        if let Some(pos) = self.regular.iter().position(|p| p.id == id) {
            self.regular.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
        if self.cursor >= self.regular.len() {
            self.cursor = 0;
        }
        if self.current.as_ref().is_some_and(|p| p.id == id) {
            self.current = None;
            self.position = None;
        }
        true
    }

    /// Advance to the next photo. Returns `None` while there is nothing to show.
    pub fn tick(&mut self) -> Option<&Photo> {
        let (shown, index) = if let Some(photo) = self.priority.pop_front() {
            // Folds into normal rotation at the tail.
            self.regular.push(photo.clone());
            (photo, 0)
        } else if self.regular.is_empty() {
            self.current = None;
            self.position = None;
            return None;
        } else {
            if self.cursor >= self.regular.len() {
                self.cursor = 0;
            }
            let index = self.cursor;
            self.cursor += 1;
            (self.regular[index].clone(), index)
        };

        self.played.insert(shown.id.clone());
        let total = self.priority.len() + self.regular.len();
        self.position = Some((index, total));

        if self.cursor >= self.regular.len() {
            self.cursor = 0;
            if self.priority.is_empty() {
                self.regular = shuffle(&self.regular, &mut self.rng);
                // Never open a cycle with the photo that just closed the last one.
                if self.regular.len() > 1 && self.regular[0].id == shown.id {
                    let other = self.rng.gen_range(1..self.regular.len());
                    self.regular.swap(0, other);
                }
                log::debug!("Slideshow wrapped; reshuffled {} photos", self.regular.len());
            }
        }

        self.current = Some(shown);
        self.current.as_ref()
    }

    /// Photo that should be on screen right now.
    pub fn current(&self) -> Option<&Photo> {
        self.current.as_ref()
    }

    /// `(index, total)` of the visible photo in the combined queue.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.position
    }

    /// The next `n` photos in playback order, without advancing.
    pub fn upcoming(&self, n: usize) -> Vec<&Photo> {
        let cursor = self.cursor.min(self.regular.len());
        self.priority
            .iter()
            .chain(self.regular[cursor..].iter())
            .chain(self.regular[..cursor].iter())
            .take(n)
            .collect()
    }

    /// Warm up the next `n` photos. Fire-and-forget.
    pub fn prefetch_upcoming<P: Prefetch + ?Sized>(&self, n: usize, prefetcher: &P) {
        for photo in self.upcoming(n) {
            prefetcher.prefetch(&photo.full_url);
        }
    }

    /// Effective playback order: `priority ++ regular`.
    pub fn playback_order(&self) -> Vec<&Photo> {
        self.priority.iter().chain(self.regular.iter()).collect()
    }

    pub fn priority_len(&self) -> usize {
        self.priority.len()
    }

    pub fn regular_len(&self) -> usize {
        self.regular.len()
    }

    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    pub fn is_played(&self, id: &str) -> bool {
        self.played.contains(id)
    }

    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    /// True when no photo can be shown.
    pub fn is_idle(&self) -> bool {
        self.priority.is_empty() && self.regular.is_empty()
    }

    /// Rebuild both queues from the canonical set.
    fn recompute(&mut self) {
        let failed = &self.failed;
        let canonical: HashSet<&str> = self
            .photos
            .iter()
            .filter(|p| !failed.contains(&p.id))
            .map(|p| p.id.as_str())
            .collect();

        if !self.seeded {
            if canonical.is_empty() {
                return;
            }
            let visible: Vec<Photo> = self
                .photos
                .iter()
                .filter(|p| canonical.contains(p.id.as_str()))
                .cloned()
                .collect();
            self.regular = shuffle(&visible, &mut self.rng);
            self.cursor = 0;
            self.seeded = true;
            log::debug!("Slideshow seeded with {} photos", self.regular.len());
            return;
        }

        self.priority.retain(|p| canonical.contains(p.id.as_str()));
        self.regular.retain(|p| canonical.contains(p.id.as_str()));
        if self.cursor >= self.regular.len() {
            self.cursor = 0;
        }

        let queued: HashSet<&str> = self
            .priority
            .iter()
            .chain(self.regular.iter())
            .map(|p| p.id.as_str())
            .collect();
        let fresh: Vec<Photo> = self
            .photos
            .iter()
            .filter(|p| canonical.contains(p.id.as_str()))
            .filter(|p| !queued.contains(p.id.as_str()) && !self.played.contains(&p.id))
            .cloned()
            .collect();
        // Shown before, dropped by a snapshot, now back: rejoin the rotation.
        let returning: Vec<Photo> = self
            .photos
            .iter()
            .filter(|p| canonical.contains(p.id.as_str()))
            .filter(|p| !queued.contains(p.id.as_str()) && self.played.contains(&p.id))
            .cloned()
            .collect();

        if !returning.is_empty() {
            log::debug!("{} returning photo(s) appended to rotation", returning.len());
            self.regular.extend(returning);
        }
        if !fresh.is_empty() {
            log::debug!("{} new photo(s) queued ahead of rotation", fresh.len());
            for photo in fresh.into_iter().rev() {
                self.priority.push_front(photo);
            }
        }
    }
}

impl Default for SlideshowQueue {
    fn default() -> Self {
        Self::new()
    }
}
