//! Poisson-bagged ensemble of SAM-kNN learners with drift-driven
//! member replacement.
//!
//! Each member sees every instance `Poisson(λ)` times (online bagging),
//! optionally with a randomized neighbor count and attribute subset for
//! extra diversity. Predictions are normalized per member, scaled by the
//! member's accuracy on the current concept, and summed. A single ADWIN
//! detector watches the ensemble's own error stream; when it fires, the
//! worst members are reset and re-randomized.
//!
//! Training and prediction are fork-join parallel regions over the members:
//! each member owns its state exclusively, and the pool is joined before
//! any post-processing runs.

use crate::drift::Adwin;
use crate::error::{RecordarError, Result};
use crate::instance::{InstanceRef, StreamHeader};
use crate::neighbors::class_from_votes;
use crate::sam::SamKnn;
use crate::traits::StreamClassifier;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;

/// Poisson-bagged SAM-kNN ensemble.
///
/// # Examples
///
/// ```
/// use recordar::ensemble::SamEnsemble;
/// use recordar::instance::{Instance, StreamHeader};
/// use recordar::sam::SamKnn;
///
/// let header = StreamHeader::numeric(1, 2);
/// let mut ensemble = SamEnsemble::new()
///     .with_ensemble_size(3)
///     .with_base(SamKnn::new().with_k(1).with_limit(50))
///     .with_random_state(7);
/// ensemble.set_context(&header).expect("valid configuration");
///
/// for i in 0..30 {
///     let x = Instance::shared(vec![(i % 2) as f32], i % 2);
///     ensemble.predict(&x);
///     ensemble.train(&x);
/// }
/// let probe = Instance::shared(vec![1.0], 1);
/// let votes = ensemble.predict(&probe);
/// assert!(votes[1] > votes[0]);
/// ```
///
/// # Host contract
///
/// Like [`SamKnn`], the ensemble is driven prequentially with the same
/// [`InstanceRef`] handle passed to `predict` and then `train`; the vote
/// for the handle is memoized so the internal correctness check does not
/// recompute it.
#[derive(Debug)]
pub struct SamEnsemble {
    // Configuration.
    ensemble_size: usize,
    lambda: f32,
    disable_weighted_vote: bool,
    no_drift_detection: bool,
    randomize_k: bool,
    randomize_features: bool,
    number_of_jobs: i32,
    base: SamKnn,

    // State.
    members: Vec<SamKnn>,
    lambdas: Vec<f32>,
    adwin: Adwin,
    rng: StdRng,
    pool: Option<rayon::ThreadPool>,
    header: Option<StreamHeader>,
    last_voted: Option<(InstanceRef, Vec<f32>)>,
    n_changes_detected: usize,
    train_step: usize,
}

impl Default for SamEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl SamEnsemble {
    /// Creates an ensemble with the default configuration: 10 members,
    /// λ = 6, weighted voting, drift detection on, sequential execution.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ensemble_size: 10,
            lambda: 6.0,
            disable_weighted_vote: false,
            no_drift_detection: false,
            randomize_k: false,
            randomize_features: false,
            number_of_jobs: 1,
            base: SamKnn::new(),
            members: Vec::new(),
            lambdas: Vec::new(),
            adwin: Adwin::default(),
            rng: StdRng::seed_from_u64(42),
            pool: None,
            header: None,
            last_voted: None,
            n_changes_detected: 0,
            train_step: 0,
        }
    }

    /// Sets the number of members.
    #[must_use]
    pub fn with_ensemble_size(mut self, size: usize) -> Self {
        self.ensemble_size = size;
        self
    }

    /// Sets the Poisson bagging rate λ.
    #[must_use]
    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    /// Disables scaling member votes by their current-concept accuracy.
    #[must_use]
    pub fn with_disable_weighted_vote(mut self, disable: bool) -> Self {
        self.disable_weighted_vote = disable;
        self
    }

    /// Disables drift detection and member replacement.
    #[must_use]
    pub fn with_no_drift_detection(mut self, disable: bool) -> Self {
        self.no_drift_detection = disable;
        self
    }

    /// Randomizes each member's neighbor count over `[1, 7]`.
    #[must_use]
    pub fn with_randomize_k(mut self, randomize: bool) -> Self {
        self.randomize_k = randomize;
        self
    }

    /// Randomizes each member's attribute subset to
    /// `min(round(0.7 * n) + 1, n)` attributes.
    #[must_use]
    pub fn with_randomize_features(mut self, randomize: bool) -> Self {
        self.randomize_features = randomize;
        self
    }

    /// Sets the worker count for the per-step fork-join regions: `-1` uses
    /// all available cores, `0` and `1` run inline.
    #[must_use]
    pub fn with_number_of_jobs(mut self, jobs: i32) -> Self {
        self.number_of_jobs = jobs;
        self
    }

    /// Sets the prototype configuration cloned into each member.
    #[must_use]
    pub fn with_base(mut self, base: SamKnn) -> Self {
        self.base = base;
        self
    }

    /// Seeds the ensemble RNG (Poisson draws and member randomization).
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Returns the members.
    #[must_use]
    pub fn members(&self) -> &[SamKnn] {
        &self.members
    }

    /// Returns how many times the drift detector has fired.
    #[must_use]
    pub fn n_changes_detected(&self) -> usize {
        self.n_changes_detected
    }

    /// Creates the members and initializes them for a stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for the header.
    pub fn set_context(&mut self, header: &StreamHeader) -> Result<()> {
        if self.ensemble_size == 0 {
            return Err(RecordarError::InvalidHyperparameter {
                name: "ensemble_size".to_string(),
                value: "0".to_string(),
                constraint: "must be >= 1".to_string(),
            });
        }
        if self.lambda <= 0.0 {
            return Err(RecordarError::InvalidHyperparameter {
                name: "lambda".to_string(),
                value: self.lambda.to_string(),
                constraint: "must be > 0".to_string(),
            });
        }
        self.header = Some(header.clone());
        self.members = (0..self.ensemble_size).map(|_| self.base.clone()).collect();
        self.lambdas = vec![self.lambda; self.ensemble_size];
        self.adwin = Adwin::default();
        self.last_voted = None;
        self.n_changes_detected = 0;
        self.pool = build_pool(self.number_of_jobs)?;
        for i in 0..self.ensemble_size {
            self.members[i].set_context(header)?;
            self.randomize_member(i)?;
        }
        Ok(())
    }

    /// Re-randomizes member `i` according to the configured options.
    fn randomize_member(&mut self, i: usize) -> Result<()> {
        if self.randomize_k {
            let k = self.rng.gen_range(1..=7);
            self.members[i].set_k(k);
        }
        if self.randomize_features {
            let n = self
                .header
                .as_ref()
                .ok_or(RecordarError::NoContext)?
                .n_attributes();
            let n_features = (((n as f32) * 0.7).round() as usize + 1).min(n);
            let Self { members, rng, .. } = self;
            members[i].randomize_features(n_features, rng)?;
        }
        Ok(())
    }

    /// Trains the members on `x` with Poisson weights, then feeds the
    /// ensemble's own error bit to ADWIN and replaces the worst members
    /// when a change is signaled.
    ///
    /// # Panics
    ///
    /// Panics if no context is set. A panicking member inside the parallel
    /// region is fatal and propagates.
    pub fn train(&mut self, x: &InstanceRef) {
        assert!(self.header.is_some(), "no model context: call set_context() first");
        self.train_step += 1;

        let weights: Vec<u32> = self
            .lambdas
            .iter()
            .map(|&lambda| poisson(lambda, &mut self.rng))
            .collect();
        let Self { members, pool, .. } = self;
        match pool {
            Some(pool) => pool.install(|| {
                members
                    .par_iter_mut()
                    .zip(&weights)
                    .for_each(|(member, &w)| {
                        if w > 0 {
                            member.train(x);
                        }
                    });
            }),
            None => {
                for (member, &w) in members.iter_mut().zip(&weights) {
                    if w > 0 {
                        member.train(x);
                    }
                }
            }
        }

        if self.no_drift_detection {
            return;
        }
        let correct = self.correctly_classifies(x);
        if self.adwin.update(if correct { 0.0 } else { 1.0 }) {
            self.n_changes_detected += 1;
            self.replace_worst_members();
        }
    }

    /// Resets and re-randomizes the `max(M/10, 1)` members with the
    /// highest current-concept error. No member is picked twice; members
    /// with zero error are never picked.
    fn replace_worst_members(&mut self) {
        let header = self.header.clone().expect("context checked in train");
        let n_removals = (self.members.len() / 10).max(1);
        let mut excluded: Vec<usize> = Vec::with_capacity(n_removals);
        for _ in 0..n_removals {
            let mut max_error = 0.0f32;
            let mut worst = None;
            for (i, member) in self.members.iter().enumerate() {
                let error = 1.0 - member.acc_current_concept();
                if error > max_error && !excluded.contains(&i) {
                    max_error = error;
                    worst = Some(i);
                }
            }
            let Some(i) = worst else { break };
            excluded.push(i);
            self.members[i].reset();
            self.members[i]
                .set_context(&header)
                .expect("context was accepted at ensemble setup");
            self.randomize_member(i)
                .expect("randomization was accepted at ensemble setup");
        }
    }

    fn correctly_classifies(&mut self, x: &InstanceRef) -> bool {
        let votes = self.predict(x);
        !votes.is_empty() && class_from_votes(&votes) == x.label()
    }

    /// Combines the members' votes for `x`: each member's vote vector is
    /// normalized to sum 1 and, unless weighted voting is disabled, scaled
    /// by the member's current-concept accuracy.
    ///
    /// The result for a given handle is memoized, so the prequential
    /// `predict`-then-`train` sequence evaluates the members only once.
    ///
    /// # Panics
    ///
    /// Panics if no context is set.
    pub fn predict(&mut self, x: &InstanceRef) -> Vec<f32> {
        if let Some((instance, votes)) = self.last_voted.as_ref() {
            if Arc::ptr_eq(instance, x) {
                return votes.clone();
            }
        }
        assert!(self.header.is_some(), "no model context: call set_context() first");

        let Self { members, pool, .. } = self;
        let member_votes: Vec<(Vec<f32>, f32)> = match pool {
            Some(pool) => pool.install(|| {
                members
                    .par_iter_mut()
                    .map(|member| {
                        let votes = member.predict(x);
                        (votes, member.acc_current_concept())
                    })
                    .collect()
            }),
            None => members
                .iter_mut()
                .map(|member| {
                    let votes = member.predict(x);
                    (votes, member.acc_current_concept())
                })
                .collect(),
        };

        let mut combined: Vec<f32> = Vec::new();
        for (mut votes, acc) in member_votes {
            let sum: f32 = votes.iter().sum();
            if sum <= 0.0 {
                continue;
            }
            for v in &mut votes {
                *v /= sum;
            }
            if !self.disable_weighted_vote && acc > 0.0 {
                for v in &mut votes {
                    *v *= acc;
                }
            }
            if votes.len() > combined.len() {
                combined.resize(votes.len(), 0.0);
            }
            for (c, v) in combined.iter_mut().zip(&votes) {
                *c += v;
            }
        }

        self.last_voted = Some((x.clone(), combined.clone()));
        combined
    }

    /// Clears learned state; call [`set_context`](Self::set_context) before
    /// the next use.
    pub fn reset(&mut self) {
        self.members.clear();
        self.lambdas.clear();
        self.adwin.reset();
        self.last_voted = None;
        self.n_changes_detected = 0;
        self.train_step = 0;
    }

    /// Releases member buffers and the worker pool once the stream has
    /// ended.
    pub fn after_learning(&mut self) {
        for member in &mut self.members {
            member.after_learning();
        }
        self.pool = None;
        self.last_voted = None;
    }
}

impl StreamClassifier for SamEnsemble {
    fn set_context(&mut self, header: &StreamHeader) -> Result<()> {
        SamEnsemble::set_context(self, header)
    }

    fn predict(&mut self, x: &InstanceRef) -> Vec<f32> {
        SamEnsemble::predict(self, x)
    }

    fn train(&mut self, x: &InstanceRef) {
        SamEnsemble::train(self, x);
    }

    fn reset(&mut self) {
        SamEnsemble::reset(self);
    }
}

/// Builds the fork-join pool: `-1` uses all available cores, `0` and `1`
/// mean inline execution (no pool).
fn build_pool(number_of_jobs: i32) -> Result<Option<rayon::ThreadPool>> {
    let available = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let jobs = match number_of_jobs {
        -1 => available,
        n if n < -1 => {
            return Err(RecordarError::InvalidHyperparameter {
                name: "number_of_jobs".to_string(),
                value: n.to_string(),
                constraint: "must be >= -1".to_string(),
            })
        }
        n => (n as usize).min(available),
    };
    if jobs <= 1 {
        return Ok(None);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| RecordarError::Other(format!("worker pool setup failed: {e}")))?;
    Ok(Some(pool))
}

/// Draws from a Poisson distribution: Knuth's product method below λ = 100,
/// a floored normal approximation above.
pub fn poisson<R: Rng>(lambda: f32, rng: &mut R) -> u32 {
    let lambda = f64::from(lambda);
    if lambda < 100.0 {
        let threshold = rng.gen::<f64>() * lambda.exp();
        let mut product = 1.0f64;
        let mut sum = 1.0f64;
        let mut i = 0u32;
        let max = 100u32.max(10 * lambda.ceil() as u32);
        while i < max && sum <= threshold {
            i += 1;
            product *= lambda / f64::from(i);
            sum += product;
        }
        i
    } else {
        // Box-Muller standard normal.
        let u1 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2 = rng.gen::<f64>();
        let gauss = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let x = lambda + lambda.sqrt() * gauss;
        if x < 0.0 {
            0
        } else {
            x as u32
        }
    }
}

#[cfg(test)]
#[path = "ensemble_tests.rs"]
mod tests;
