//! ADWIN change detector over a stream of 0/1 outcomes.
//!
//! Maintains an adaptive window of recent values as exponential-histogram
//! buckets. After each insertion the window is scanned for a split point
//! whose sub-window means differ by more than a Hoeffding bound; when one
//! is found the older part is dropped and a change is reported.
//!
//! Reference: Bifet & Gavaldà, "Learning from time-changing data with
//! adaptive windowing", SDM 2007.

use std::collections::VecDeque;

const MAX_BUCKETS_PER_LEVEL: usize = 5;

#[derive(Debug, Clone, Default)]
struct Bucket {
    total: f64,
    count: u64,
}

/// ADWIN drift detector.
///
/// # Examples
///
/// ```
/// use recordar::drift::Adwin;
///
/// let mut adwin = Adwin::new(0.01).with_min_samples(10);
/// let mut detected = false;
/// for _ in 0..60 {
///     detected |= adwin.update(0.0);
/// }
/// for _ in 0..60 {
///     detected |= adwin.update(1.0);
/// }
/// assert!(detected);
/// ```
#[derive(Debug, Clone)]
pub struct Adwin {
    delta: f64,
    /// Bucket rows by merge level; level 0 holds the newest singletons.
    /// Within a row, older buckets come first.
    levels: VecDeque<Vec<Bucket>>,
    total: f64,
    width: u64,
    min_samples: u64,
}

impl Default for Adwin {
    fn default() -> Self {
        Self::new(0.002)
    }
}

impl Adwin {
    /// Creates a detector with confidence parameter `delta`; smaller values
    /// make detection more conservative.
    #[must_use]
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            levels: VecDeque::new(),
            total: 0.0,
            width: 0,
            min_samples: 30,
        }
    }

    /// Sets the number of samples required before detection is attempted.
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Returns the current window width.
    #[must_use]
    pub fn width(&self) -> u64 {
        self.width
    }

    /// Returns the mean of the current window.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.width > 0 {
            self.total / self.width as f64
        } else {
            0.0
        }
    }

    /// Feeds one value and returns true when a change was detected (the
    /// window has been shrunk past the change point).
    pub fn update(&mut self, value: f32) -> bool {
        self.insert(f64::from(value));
        if self.width < self.min_samples {
            return false;
        }
        let mut detected = false;
        while let Some(n_drop) = self.cut_point() {
            detected = true;
            for _ in 0..n_drop {
                self.drop_oldest();
            }
        }
        detected
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.levels.clear();
        self.total = 0.0;
        self.width = 0;
    }

    fn insert(&mut self, value: f64) {
        self.total += value;
        self.width += 1;
        if self.levels.is_empty() {
            self.levels.push_back(Vec::new());
        }
        self.levels[0].push(Bucket {
            total: value,
            count: 1,
        });
        self.compress();
    }

    /// Merges the two oldest buckets of any over-full level into the next.
    fn compress(&mut self) {
        let mut level = 0;
        while level < self.levels.len() {
            if self.levels[level].len() > MAX_BUCKETS_PER_LEVEL {
                if level + 1 == self.levels.len() {
                    self.levels.push_back(Vec::new());
                }
                let b1 = self.levels[level].remove(0);
                let b2 = self.levels[level].remove(0);
                self.levels[level + 1].push(Bucket {
                    total: b1.total + b2.total,
                    count: b1.count + b2.count,
                });
            }
            level += 1;
        }
    }

    fn drop_oldest(&mut self) {
        for level in (0..self.levels.len()).rev() {
            if self.levels[level].is_empty() {
                continue;
            }
            let bucket = self.levels[level].remove(0);
            self.total -= bucket.total;
            self.width -= bucket.count;
            break;
        }
        while self.levels.len() > 1 && self.levels.back().is_some_and(|row| row.is_empty()) {
            self.levels.pop_back();
        }
    }

    /// Scans oldest-to-newest for a split violating the Hoeffding bound.
    /// Returns the number of oldest buckets to drop, if any.
    fn cut_point(&self) -> Option<usize> {
        if self.width < 2 {
            return None;
        }
        let n = self.width as f64;
        let mut n0 = 0.0;
        let mut sum0 = 0.0;
        let mut scanned = 0usize;

        for level in (0..self.levels.len()).rev() {
            for bucket in &self.levels[level] {
                n0 += bucket.count as f64;
                sum0 += bucket.total;
                scanned += 1;
                let n1 = n - n0;
                if n0 < 1.0 || n1 < 1.0 {
                    continue;
                }
                let mean0 = sum0 / n0;
                let mean1 = (self.total - sum0) / n1;
                let m = 1.0 / (1.0 / n0 + 1.0 / n1);
                let eps = (0.5 * (4.0 / self.delta).ln() / m).sqrt();
                if (mean0 - mean1).abs() > eps {
                    return Some(scanned);
                }
            }
        }
        None
    }
}
