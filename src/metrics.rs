//! Evaluation helpers for streaming classification.

use crate::instance::InstanceRef;
use crate::neighbors::class_from_votes;
use crate::traits::StreamClassifier;
use std::collections::VecDeque;

/// Fraction of positions where prediction and truth agree.
///
/// # Examples
///
/// ```
/// use recordar::metrics::accuracy;
///
/// let acc = accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]);
/// assert!((acc - 0.75).abs() < 1e-6);
/// ```
#[must_use]
pub fn accuracy(predicted: &[usize], actual: &[usize]) -> f32 {
    assert_eq!(
        predicted.len(),
        actual.len(),
        "prediction and truth lengths must match"
    );
    if predicted.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    correct as f32 / predicted.len() as f32
}

/// Interleaved test-then-train evaluation state.
///
/// Each instance is first predicted, the outcome recorded, and the learner
/// then trained on it. Tracks both the overall accuracy and the accuracy
/// over a sliding window of recent outcomes.
#[derive(Debug, Clone)]
pub struct PrequentialEvaluation {
    window_size: usize,
    window: VecDeque<u8>,
    n_seen: u64,
    n_correct: u64,
}

impl PrequentialEvaluation {
    /// Creates an evaluation with the given sliding-window size.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            n_seen: 0,
            n_correct: 0,
        }
    }

    /// Tests the learner on `x`, records the outcome, then trains on `x`.
    /// Returns whether the prediction was correct.
    pub fn step<C: StreamClassifier>(&mut self, learner: &mut C, x: &InstanceRef) -> bool {
        let votes = learner.predict(x);
        let correct = !votes.is_empty() && class_from_votes(&votes) == x.label();
        self.n_seen += 1;
        if correct {
            self.n_correct += 1;
        }
        self.window.push_back(u8::from(correct));
        if self.window.len() > self.window_size {
            self.window.pop_front();
        }
        learner.train(x);
        correct
    }

    /// Runs [`step`](Self::step) over a whole stream.
    pub fn run<C: StreamClassifier>(&mut self, learner: &mut C, stream: &[InstanceRef]) {
        for x in stream {
            self.step(learner, x);
        }
    }

    /// Returns the number of instances evaluated.
    #[must_use]
    pub fn n_seen(&self) -> u64 {
        self.n_seen
    }

    /// Returns the overall accuracy since the start of the stream.
    #[must_use]
    pub fn accuracy(&self) -> f32 {
        if self.n_seen == 0 {
            return 0.0;
        }
        self.n_correct as f32 / self.n_seen as f32
    }

    /// Returns the accuracy over the most recent window of outcomes.
    #[must_use]
    pub fn window_accuracy(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        let correct: u32 = self.window.iter().map(|&b| u32::from(b)).sum();
        correct as f32 / self.window.len() as f32
    }
}
