//! SAM-kNN: a k-nearest-neighbor classifier with a self-adjusting memory.
//!
//! The classifier keeps two complementary memories. The short-term memory
//! (STM) is the ordered tail of the stream and is assumed to hold the
//! currently active concept; the long-term memory (LTM) archives past
//! concepts as class-wise centroids. A combined view (CM) treats both as a
//! single neighbor pool. Every prediction runs kNN against each memory,
//! and the final vote is delegated to whichever memory has been most
//! accurate over the lifetime of the current STM.
//!
//! Training keeps the STM focused: after each insertion the STM may be
//! shrunk to the suffix length that minimizes an interleaved test-train
//! error (evaluated over a geometric progression of suffix sizes, with all
//! pairwise distances served from a pre-allocated sliding matrix), and
//! instances leaving the STM are migrated into the LTM after a consistency
//! cleaning step. When the total memory budget overflows, the LTM is
//! compressed by class-wise weighted kMeans++.
//!
//! Reference: Losing, Hammer & Wersing, "KNN Classifier with Self Adjusting
//! Memory for Heterogeneous Concept Drift", ICDM 2016.

use crate::cluster;
use crate::distance::{DistanceKernel, DistanceMetric};
use crate::error::{RecordarError, Result};
use crate::instance::{Instance, InstanceRef, StreamHeader};
use crate::matrix::SlidingDistanceMatrix;
use crate::neighbors::{
    class_from_votes, n_arg_min, n_arg_min_range, weighted_votes, weighted_votes_combined,
};
use crate::traits::StreamClassifier;
use crate::window::InstanceWindow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const NO_CONTEXT: &str = "no model context: call set_context() first";

/// Distances computed for the most recently voted instance, kept so that
/// the following `train` call on the same handle can reuse them.
#[derive(Debug, Clone)]
struct LastVoted {
    instance: InstanceRef,
    stm_dists: Vec<f32>,
    ltm_dists: Option<Vec<f32>>,
}

/// Self-adjusting-memory kNN classifier for evolving data streams.
///
/// # Examples
///
/// ```
/// use recordar::instance::{Instance, StreamHeader};
/// use recordar::sam::SamKnn;
///
/// let header = StreamHeader::numeric(1, 2);
/// let mut model = SamKnn::new().with_k(1).with_limit(100);
/// model.set_context(&header).expect("valid configuration");
///
/// for i in 0..20 {
///     let x = Instance::shared(vec![i as f32 % 2.0], i % 2);
///     model.predict(&x);
///     model.train(&x);
/// }
/// let probe = Instance::shared(vec![1.0], 1);
/// let votes = model.predict(&probe);
/// assert_eq!(votes.len(), 2);
/// assert!(votes[1] > votes[0]);
/// ```
///
/// # Host contract
///
/// The classifier is driven prequentially: `predict(x)` followed by
/// `train(x)` with the *same* [`InstanceRef`] handle. The identity of the
/// handle (not its contents) is what lets `train` reuse the STM distances
/// computed during the vote; passing a different handle is correct but
/// forfeits the reuse.
#[derive(Debug, Clone)]
pub struct SamKnn {
    // Configuration.
    k: usize,
    limit: usize,
    min_stm_size: usize,
    relative_ltm_size: f32,
    adaptation_interval: usize,
    recalculate_error: bool,
    uniform_weighted: bool,
    metric: DistanceMetric,

    // Derived at set_context.
    max_stm_size: usize,
    max_ltm_size: usize,
    header: Option<StreamHeader>,
    kernel: Option<DistanceKernel>,
    matrix: Option<SlidingDistanceMatrix>,

    // Streaming state.
    stm: InstanceWindow,
    ltm: InstanceWindow,
    stm_history: VecDeque<u8>,
    ltm_history: VecDeque<u8>,
    cm_history: VecDeque<u8>,
    prediction_histories: HashMap<usize, Vec<u8>>,
    last_voted: Option<LastVoted>,
    max_class_seen: usize,
    train_step: usize,
    acc_current_concept: f32,
    rng: StdRng,
}

impl Default for SamKnn {
    fn default() -> Self {
        Self::new()
    }
}

impl SamKnn {
    /// Creates a classifier with the default configuration: `k = 5`,
    /// `limit = 1000`, `min_stm_size = 50`, `relative_ltm_size = 0.4`,
    /// distance-weighted voting, adaptation every step.
    #[must_use]
    pub fn new() -> Self {
        Self {
            k: 5,
            limit: 1000,
            min_stm_size: 50,
            relative_ltm_size: 0.4,
            adaptation_interval: 1,
            recalculate_error: false,
            uniform_weighted: false,
            metric: DistanceMetric::Euclidean,
            max_stm_size: 0,
            max_ltm_size: 0,
            header: None,
            kernel: None,
            matrix: None,
            stm: InstanceWindow::new(),
            ltm: InstanceWindow::new(),
            stm_history: VecDeque::new(),
            ltm_history: VecDeque::new(),
            cm_history: VecDeque::new(),
            prediction_histories: HashMap::new(),
            last_voted: None,
            max_class_seen: 0,
            train_step: 0,
            acc_current_concept: 0.0,
            rng: StdRng::seed_from_u64(42),
        }
    }

    /// Sets the number of neighbors.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Sets the total capacity shared by STM and LTM.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the minimum STM size the size adaptation may shrink to.
    #[must_use]
    pub fn with_min_stm_size(mut self, min_stm_size: usize) -> Self {
        self.min_stm_size = min_stm_size;
        self
    }

    /// Sets the fraction of the total capacity reserved for the LTM.
    #[must_use]
    pub fn with_relative_ltm_size(mut self, relative_ltm_size: f32) -> Self {
        self.relative_ltm_size = relative_ltm_size;
        self
    }

    /// Sets how many training steps pass between size adaptations.
    #[must_use]
    pub fn with_adaptation_interval(mut self, interval: usize) -> Self {
        self.adaptation_interval = interval;
        self
    }

    /// Recomputes suffix error rates from scratch on every adaptation
    /// instead of extending cached prediction histories.
    #[must_use]
    pub fn with_recalculate_error(mut self, recalculate: bool) -> Self {
        self.recalculate_error = recalculate;
        self
    }

    /// Disables distance weighting; every neighbor then votes with weight 1.
    #[must_use]
    pub fn with_uniform_weighting(mut self, uniform: bool) -> Self {
        self.uniform_weighted = uniform;
        self
    }

    /// Sets the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Seeds the internal RNG (used by the LTM compression) for
    /// reproducibility.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Overrides the number of neighbors in place. Used by the ensemble
    /// when re-randomizing a replaced member.
    pub fn set_k(&mut self, k: usize) {
        self.k = k;
    }

    /// Returns the number of neighbors.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the total capacity.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the short-term memory.
    #[must_use]
    pub fn stm(&self) -> &InstanceWindow {
        &self.stm
    }

    /// Returns the long-term memory.
    #[must_use]
    pub fn ltm(&self) -> &InstanceWindow {
        &self.ltm
    }

    /// Returns the length of the per-memory prediction histories.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.stm_history.len()
    }

    /// Returns the accuracy of the memory currently delegated to, over the
    /// lifetime of the current STM.
    #[must_use]
    pub fn acc_current_concept(&self) -> f32 {
        self.acc_current_concept
    }

    /// Returns the highest class index observed so far.
    #[must_use]
    pub fn max_class_seen(&self) -> usize {
        self.max_class_seen
    }

    /// Returns the STM distance matrix, when a context is set.
    #[must_use]
    pub fn distance_matrix(&self) -> Option<&SlidingDistanceMatrix> {
        self.matrix.as_ref()
    }

    /// Initializes memories, histories and the distance matrix for a
    /// stream. Clears any previous streaming state; the configuration is
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns an error when a hyperparameter is out of range for the
    /// header.
    pub fn set_context(&mut self, header: &StreamHeader) -> Result<()> {
        self.validate(header)?;
        self.max_ltm_size = (self.relative_ltm_size * self.limit as f32) as usize;
        self.max_stm_size = self.limit - self.max_ltm_size;
        self.kernel = Some(DistanceKernel::new(header, self.metric));
        self.matrix = Some(SlidingDistanceMatrix::new(self.limit));
        self.header = Some(header.clone());
        self.stm.clear();
        self.ltm.clear();
        self.stm_history.clear();
        self.ltm_history.clear();
        self.cm_history.clear();
        self.prediction_histories.clear();
        self.last_voted = None;
        Ok(())
    }

    fn validate(&self, header: &StreamHeader) -> Result<()> {
        if self.k == 0 {
            return Err(invalid("k", self.k.to_string(), "must be >= 1"));
        }
        if self.limit == 0 {
            return Err(invalid("limit", self.limit.to_string(), "must be >= 1"));
        }
        if self.min_stm_size == 0 {
            return Err(invalid(
                "min_stm_size",
                self.min_stm_size.to_string(),
                "must be >= 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_ltm_size) {
            return Err(invalid(
                "relative_ltm_size",
                self.relative_ltm_size.to_string(),
                "must be in [0, 1]",
            ));
        }
        if self.adaptation_interval == 0 {
            return Err(invalid(
                "adaptation_interval",
                self.adaptation_interval.to_string(),
                "must be >= 1",
            ));
        }
        if header.n_attributes() == 0 {
            return Err(invalid("header", "0 attributes".to_string(), "stream needs attributes"));
        }
        if header.n_classes() == 0 {
            return Err(invalid("header", "0 classes".to_string(), "stream needs classes"));
        }
        Ok(())
    }

    /// Restricts the kNN to `n_features` attribute indices drawn uniformly
    /// without replacement.
    ///
    /// # Errors
    ///
    /// Returns an error when no context is set or `n_features` is not in
    /// `[1, n_attributes]`.
    pub fn randomize_features<R: Rng>(&mut self, n_features: usize, rng: &mut R) -> Result<()> {
        let header = self.header.as_ref().ok_or(RecordarError::NoContext)?;
        if n_features == 0 || n_features > header.n_attributes() {
            return Err(invalid(
                "n_features",
                n_features.to_string(),
                format!("must be in [1, {}]", header.n_attributes()),
            ));
        }
        let mut chosen: Vec<usize> = Vec::with_capacity(n_features);
        while chosen.len() < n_features {
            let idx = rng.gen_range(0..header.n_attributes());
            if !chosen.contains(&idx) {
                chosen.push(idx);
            }
        }
        self.kernel = Some(DistanceKernel::with_subset(header, self.metric, chosen)?);
        Ok(())
    }

    /// Clears all learned state. The configuration survives; call
    /// [`set_context`](Self::set_context) before the next use.
    pub fn reset(&mut self) {
        self.stm.clear();
        self.ltm.clear();
        self.stm_history.clear();
        self.ltm_history.clear();
        self.cm_history.clear();
        self.prediction_histories.clear();
        self.last_voted = None;
        if let Some(matrix) = self.matrix.as_mut() {
            matrix.reset();
        }
    }

    /// Releases the memory-heavy buffers once the stream has ended.
    pub fn after_learning(&mut self) {
        self.reset();
        self.matrix = None;
        self.kernel = None;
        self.header = None;
    }

    /// Predicts the class votes for `x` using the currently most accurate
    /// of the three memories. Also appends one correctness bit per memory
    /// to the prediction histories (prequential usage: the label of `x` is
    /// known to the caller before training).
    ///
    /// Returns a vector indexed by class, of length `max_class_seen + 1`
    /// (or the declared class count while the STM is still empty).
    ///
    /// # Panics
    ///
    /// Panics if no context is set.
    pub fn predict(&mut self, x: &InstanceRef) -> Vec<f32> {
        let declared = self.header.as_ref().expect(NO_CONTEXT).n_classes();
        if self.stm.is_empty() {
            self.acc_current_concept = 1.0 / declared as f32;
            self.push_history_bits(0, 0, 0, x.label());
            return vec![0.0; declared];
        }

        let kernel = self.kernel.as_ref().expect(NO_CONTEXT);
        let n_classes = self.max_class_seen + 1;

        let d_stm = kernel.dist_to_all(x, &self.stm);
        let nn_stm = n_arg_min(self.k.min(d_stm.len()), &d_stm);
        let v_stm = weighted_votes(&d_stm, &nn_stm, &self.stm, n_classes, self.uniform_weighted);
        let pred_stm = class_from_votes(&v_stm);

        let d_ltm = kernel.dist_to_all(x, &self.ltm);
        let nn_ltm = n_arg_min(self.k.min(d_ltm.len()), &d_ltm);
        let v_ltm = weighted_votes(&d_ltm, &nn_ltm, &self.ltm, n_classes, self.uniform_weighted);
        let pred_ltm = class_from_votes(&v_ltm);

        let mut d_cm = Vec::with_capacity(d_stm.len() + d_ltm.len());
        d_cm.extend_from_slice(&d_stm);
        d_cm.extend_from_slice(&d_ltm);
        let nn_cm = n_arg_min(self.k.min(d_cm.len()), &d_cm);
        let v_cm = weighted_votes_combined(
            &d_cm,
            &nn_cm,
            &self.stm,
            &self.ltm,
            n_classes,
            self.uniform_weighted,
        );
        let pred_cm = class_from_votes(&v_cm);

        self.last_voted = Some(LastVoted {
            instance: x.clone(),
            stm_dists: d_stm,
            ltm_dists: Some(d_ltm),
        });

        let corr_stm = history_sum(&self.stm_history);
        let corr_ltm = history_sum(&self.ltm_history);
        let corr_cm = history_sum(&self.cm_history);
        let hist_len = self.stm_history.len().max(1) as f32;

        let votes = if corr_stm >= corr_ltm && corr_stm >= corr_cm {
            self.acc_current_concept = corr_stm as f32 / hist_len;
            v_stm
        } else if corr_ltm > corr_stm && corr_ltm >= corr_cm {
            self.acc_current_concept = corr_ltm as f32 / hist_len;
            v_ltm
        } else {
            self.acc_current_concept = corr_cm as f32 / hist_len;
            v_cm
        };

        self.push_history_bits(pred_stm, pred_ltm, pred_cm, x.label());
        votes
    }

    /// Trains on `x`: appends it to the STM, enforces the memory budget,
    /// records its distance row, cleans the LTM against it and, on
    /// adaptation steps, shrinks the STM to the error-minimal suffix.
    ///
    /// # Panics
    ///
    /// Panics if no context is set.
    pub fn train(&mut self, x: &InstanceRef) {
        assert!(self.header.is_some(), "{NO_CONTEXT}");
        self.train_step += 1;
        if x.label() > self.max_class_seen {
            self.max_class_seen = x.label();
        }
        self.stm.push(x.clone());
        self.memory_size_check();

        let stm_len = self.stm.len();
        let reusable = self
            .last_voted
            .as_ref()
            .is_some_and(|lv| Arc::ptr_eq(&lv.instance, x) && lv.stm_dists.len() + 1 == stm_len);
        if reusable {
            let lv = self.last_voted.as_ref().expect("identity checked above");
            self.matrix
                .as_mut()
                .expect(NO_CONTEXT)
                .push_row(stm_len, &lv.stm_dists);
        } else {
            let dists = self
                .kernel
                .as_ref()
                .expect(NO_CONTEXT)
                .dist_to_all(x, &self.stm);
            self.matrix
                .as_mut()
                .expect(NO_CONTEXT)
                .push_row(stm_len, &dists);
        }

        self.clean_incremental();

        if self.train_step % self.adaptation_interval == 0 {
            self.adapt_stm_size();
        }
    }

    fn push_history_bits(&mut self, pred_stm: usize, pred_ltm: usize, pred_cm: usize, label: usize) {
        self.stm_history.push_back(u8::from(pred_stm == label));
        self.ltm_history.push_back(u8::from(pred_ltm == label));
        self.cm_history.push_back(u8::from(pred_cm == label));
    }

    /// Keeps STM + LTM within the total budget: compresses the LTM when it
    /// is over its own cap, otherwise shifts the oldest STM instances into
    /// the LTM and compresses.
    fn memory_size_check(&mut self) {
        if self.stm.len() + self.ltm.len() <= self.max_stm_size + self.max_ltm_size {
            return;
        }
        if self.ltm.len() > self.max_ltm_size {
            self.cluster_down();
        } else {
            let min_shifts = ((self.max_stm_size + self.max_ltm_size) / 10).min(200);
            let num_shifts = min_shifts.max(self.max_ltm_size - self.ltm.len() + 1);
            let mut shifted = 0;
            for _ in 0..num_shifts {
                let Some(inst) = self.stm.pop_front() else { break };
                // A zero-sized LTM is disabled outright; evicted instances
                // are forgotten instead of archived.
                if self.max_ltm_size > 0 {
                    self.ltm.push(inst);
                }
                self.stm_history.pop_front();
                self.ltm_history.pop_front();
                self.cm_history.pop_front();
                shifted += 1;
            }
            if let Some(lv) = self.last_voted.as_mut() {
                // The cached vote distances start at the old STM front.
                lv.stm_dists.drain(..shifted.min(lv.stm_dists.len()));
            }
            self.cluster_down();
            self.prediction_histories.clear();
            self.matrix.as_mut().expect(NO_CONTEXT).trim_front(shifted);
        }
    }

    /// Class-wise LTM compression: each class with more than one instance
    /// is replaced by `ceil(n/2)` weighted-kMeans++ centroids.
    fn cluster_down(&mut self) {
        for c in 0..=self.max_class_seen {
            let indices: Vec<usize> = (0..self.ltm.len())
                .filter(|&i| self.ltm.get(i).label() == c)
                .collect();
            if indices.len() <= 1 {
                continue;
            }
            let mut points = Vec::with_capacity(indices.len());
            for &i in indices.iter().rev() {
                let inst = self.ltm.remove(i).expect("collected index in range");
                // Sample weight 1.0 occupies slot 0; coordinates follow.
                let mut point = Vec::with_capacity(inst.n_attributes() + 1);
                point.push(1.0);
                point.extend_from_slice(inst.values());
                points.push(point);
            }
            let k = (points.len() + 1) / 2;
            let centroids = cluster::cluster_weighted(k, &points, &mut self.rng)
                .expect("k is within [1, point count] by construction");
            for coords in centroids {
                self.ltm.push(Instance::shared(coords, c));
            }
        }
        if let Some(lv) = self.last_voted.as_mut() {
            lv.ltm_dists = None;
        }
    }

    /// Removes the LTM points that contradict the newest STM instance: a
    /// point among its k nearest LTM neighbors, with a different label, no
    /// farther away than its farthest same-class STM neighbor.
    fn clean_incremental(&mut self) {
        if self.stm.len() <= self.k || self.ltm.is_empty() {
            return;
        }
        let anchor_idx = self.stm.len() - 1;
        let anchor = self.stm.get(anchor_idx).clone();
        let stm_dists = self
            .matrix
            .as_ref()
            .expect(NO_CONTEXT)
            .distances_to_older(anchor_idx)
            .to_vec();
        let ltm_dists = match self.last_voted.as_ref() {
            Some(lv) if Arc::ptr_eq(&lv.instance, &anchor) && lv.ltm_dists.is_some() => {
                lv.ltm_dists.clone().expect("presence checked")
            }
            _ => self
                .kernel
                .as_ref()
                .expect(NO_CONTEXT)
                .dist_to_all(&anchor, &self.ltm),
        };

        let nn_stm = n_arg_min(self.k.min(stm_dists.len()), &stm_dists);
        let mut threshold = 0.0f32;
        for &j in &nn_stm {
            if self.stm.get(j).label() == anchor.label() && stm_dists[j] > threshold {
                threshold = stm_dists[j];
            }
        }

        let nn_ltm = n_arg_min(self.k.min(ltm_dists.len()), &ltm_dists);
        let mut deletions: Vec<usize> = nn_ltm
            .into_iter()
            .filter(|&j| self.ltm.get(j).label() != anchor.label() && ltm_dists[j] <= threshold)
            .collect();
        deletions.sort_unstable_by(|a, b| b.cmp(a));
        for j in deletions {
            self.ltm.remove(j);
        }
    }

    /// Cleans a batch of instances just discarded from the STM against the
    /// surviving STM, one STM anchor at a time, before the batch migrates
    /// into the LTM.
    fn clean_batch(&self, batch: &mut InstanceWindow) {
        if self.stm.len() <= self.k || batch.is_empty() {
            return;
        }
        let kernel = self.kernel.as_ref().expect(NO_CONTEXT);
        for i in 0..self.stm.len() {
            let anchor = self.stm.get(i);
            let mut dists = Vec::with_capacity(self.stm.len() - 1);
            let mut labels = Vec::with_capacity(self.stm.len() - 1);
            for j in 0..self.stm.len() {
                if j == i {
                    continue;
                }
                dists.push(kernel.dist(anchor, self.stm.get(j)));
                labels.push(self.stm.get(j).label());
            }

            let nn = n_arg_min(self.k.min(dists.len()), &dists);
            let mut threshold = 0.0f32;
            for &j in &nn {
                if labels[j] == anchor.label() && dists[j] > threshold {
                    threshold = dists[j];
                }
            }

            let batch_dists = kernel.dist_to_all(anchor, batch);
            let nn_batch = n_arg_min(self.k.min(batch_dists.len()), &batch_dists);
            let mut deletions: Vec<usize> = nn_batch
                .into_iter()
                .filter(|&j| batch.get(j).label() != anchor.label() && batch_dists[j] <= threshold)
                .collect();
            deletions.sort_unstable_by(|a, b| b.cmp(a));
            for j in deletions {
                batch.remove(j);
            }
        }
    }

    /// Shrinks the STM to the suffix size with the minimal interleaved
    /// test-train error; discarded instances are cleaned and migrated into
    /// the LTM.
    fn adapt_stm_size(&mut self) {
        let old_size = self.stm.len();
        let new_size = if self.recalculate_error {
            self.min_error_window_recalc()
        } else {
            self.min_error_window_incremental()
        };
        if new_size >= old_size {
            return;
        }
        let diff = old_size - new_size;
        let discarded = self.stm.drain_front(diff);
        self.matrix.as_mut().expect(NO_CONTEXT).trim_front(diff);

        let hist_excess = self.stm_history.len().saturating_sub(new_size);
        for _ in 0..hist_excess {
            self.stm_history.pop_front();
            self.ltm_history.pop_front();
            self.cm_history.pop_front();
        }

        if self.max_ltm_size > 0 {
            let mut batch: InstanceWindow = discarded.into_iter().collect();
            self.clean_batch(&mut batch);
            while let Some(inst) = batch.pop_front() {
                self.ltm.push(inst);
            }
        }
        self.memory_size_check();
    }

    /// Geometric progression of candidate suffix sizes: `n, n/2, n/4, ...`.
    /// The guard is applied to the element being halved, so the final entry
    /// may fall below `2 * min_stm_size`.
    fn candidate_sizes(&self, n: usize) -> Vec<usize> {
        let mut sizes = vec![n];
        loop {
            let last = sizes[sizes.len() - 1];
            if last < 2 * self.min_stm_size {
                break;
            }
            sizes.push(last / 2);
        }
        sizes
    }

    /// Extends the interleaved test-train history of the suffix starting at
    /// `off` up to the current STM end. Every prediction reads its distances
    /// from the cached matrix row of the instance being tested.
    fn extend_history(&self, off: usize, history: &mut Vec<u8>) {
        let n = self.stm.len();
        let matrix = self.matrix.as_ref().expect(NO_CONTEXT);
        let n_classes = self.max_class_seen + 1;
        let start = off + self.k + history.len();
        for i in start..n {
            let row = matrix.distances_to_older(i);
            let nn = n_arg_min_range(self.k.min(n), row, off, i - 1);
            let votes = weighted_votes(row, &nn, &self.stm, n_classes, self.uniform_weighted);
            let predicted = class_from_votes(&votes);
            history.push(u8::from(predicted == self.stm.get(i).label()));
        }
    }

    /// Bisection with full recomputation: cached histories whose size is no
    /// longer a candidate are pruned, the rest are extended in place.
    fn min_error_window_recalc(&mut self) -> usize {
        let n = self.stm.len();
        if n < 2 * self.min_stm_size {
            return n;
        }
        let sizes = self.candidate_sizes(n);
        self.prediction_histories
            .retain(|&off, _| off <= n && sizes.contains(&(n - off)));

        let mut error_rates = Vec::with_capacity(sizes.len());
        for &size in &sizes {
            let off = n - size;
            let mut history = self.prediction_histories.remove(&off).unwrap_or_default();
            self.extend_history(off, &mut history);
            error_rates.push(history_error(&history));
            self.prediction_histories.insert(off, history);
        }

        let min_idx = arg_min_first(&error_rates);
        let window_size = sizes[min_idx];
        if window_size < n {
            self.adapt_histories(min_idx);
        }
        window_size
    }

    /// Bisection with incremental approximation: a history keyed one
    /// position earlier is recycled by dropping its first bit. Candidates
    /// that appear to beat the full-size baseline are then recomputed from
    /// scratch once, because the recycled approximation can be stale.
    fn min_error_window_incremental(&mut self) -> usize {
        let n = self.stm.len();
        if n < 2 * self.min_stm_size {
            return n;
        }
        let sizes = self.candidate_sizes(n);

        let mut error_rates = Vec::with_capacity(sizes.len());
        for &size in &sizes {
            let off = n - size;
            let cached = self.prediction_histories.remove(&off).or_else(|| {
                if off == 0 {
                    return None;
                }
                self.prediction_histories.remove(&(off - 1)).map(|mut h| {
                    if !h.is_empty() {
                        h.remove(0);
                    }
                    h
                })
            });
            let mut history = cached.unwrap_or_default();
            self.extend_history(off, &mut history);
            error_rates.push(history_error(&history));
            self.prediction_histories.insert(off, history);
        }

        let mut min_idx = arg_min_first(&error_rates);
        if min_idx > 0 {
            for i in 1..error_rates.len() {
                if error_rates[i] < error_rates[0] {
                    let off = n - sizes[i];
                    let mut history = Vec::new();
                    self.extend_history(off, &mut history);
                    error_rates[i] = history_error(&history);
                    self.prediction_histories.insert(off, history);
                }
            }
            min_idx = arg_min_first(&error_rates);
        }

        let window_size = sizes[min_idx];
        if window_size < n {
            self.adapt_histories(min_idx);
        }
        window_size
    }

    /// Drops the history of the smallest surviving offset `n_deletions`
    /// times, re-keying the remaining entries relative to the new smallest
    /// offset after each drop.
    fn adapt_histories(&mut self, n_deletions: usize) {
        for _ in 0..n_deletions {
            let Some(&smallest) = self.prediction_histories.keys().min() else {
                break;
            };
            self.prediction_histories.remove(&smallest);
            let Some(&new_min) = self.prediction_histories.keys().min() else {
                continue;
            };
            let rekeyed: HashMap<usize, Vec<u8>> = self
                .prediction_histories
                .drain()
                .map(|(key, history)| (key - new_min, history))
                .collect();
            self.prediction_histories = rekeyed;
        }
    }
}

impl StreamClassifier for SamKnn {
    fn set_context(&mut self, header: &StreamHeader) -> Result<()> {
        SamKnn::set_context(self, header)
    }

    fn predict(&mut self, x: &InstanceRef) -> Vec<f32> {
        SamKnn::predict(self, x)
    }

    fn train(&mut self, x: &InstanceRef) {
        SamKnn::train(self, x);
    }

    fn reset(&mut self) {
        SamKnn::reset(self);
    }
}

fn history_sum(history: &VecDeque<u8>) -> u32 {
    history.iter().map(|&b| u32::from(b)).sum()
}

/// Error rate of an interleaved test-train history; empty histories rank
/// worst so they are never selected.
fn history_error(history: &[u8]) -> f64 {
    if history.is_empty() {
        return f64::INFINITY;
    }
    let correct: u32 = history.iter().map(|&b| u32::from(b)).sum();
    1.0 - f64::from(correct) / history.len() as f64
}

/// Index of the smallest value; the first occurrence wins, which keeps the
/// largest candidate size on ties.
fn arg_min_first(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[best] {
            best = i;
        }
    }
    best
}

fn invalid(name: &str, value: String, constraint: impl Into<String>) -> RecordarError {
    RecordarError::InvalidHyperparameter {
        name: name.to_string(),
        value,
        constraint: constraint.into(),
    }
}

#[cfg(test)]
#[path = "sam_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests_memory_contract.rs"]
mod tests_memory_contract;
