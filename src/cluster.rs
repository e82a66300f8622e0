//! Weighted kMeans++ used for long-term-memory compression.
//!
//! Points carry a sample weight at index 0; the coordinates follow. The
//! returned centroids are coordinate-only (the weight slot is dropped),
//! which is the contract the memory compressor expects.

use crate::error::{RecordarError, Result};
use rand::Rng;

const MAX_ITER: usize = 100;

/// Picks `k` initial centroids by weighted D² sampling.
///
/// The first centroid is drawn with probability proportional to sample
/// weight; each further centroid with probability proportional to
/// `weight · D²` where `D` is the distance to the nearest centroid chosen
/// so far.
///
/// # Errors
///
/// Returns an error when `k` is zero or exceeds the number of points, or
/// when a point consists of the weight slot alone.
pub fn init_centroids<R: Rng>(
    k: usize,
    points: &[Vec<f32>],
    rng: &mut R,
) -> Result<Vec<Vec<f32>>> {
    if k == 0 || k > points.len() {
        return Err(RecordarError::InvalidHyperparameter {
            name: "k".to_string(),
            value: k.to_string(),
            constraint: format!("must be in [1, {}]", points.len()),
        });
    }
    let dim = points[0].len();
    if dim < 2 {
        return Err(RecordarError::Other(
            "weighted points need a weight slot plus at least one coordinate".to_string(),
        ));
    }

    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);

    let total_weight: f64 = points.iter().map(|p| f64::from(p[0])).sum();
    let first = sample_index(points.iter().map(|p| f64::from(p[0])), total_weight, rng);
    centroids.push(points[first][1..].to_vec());

    let mut nearest_sq: Vec<f64> = points
        .iter()
        .map(|p| dist_sq(&p[1..], &centroids[0]))
        .collect();

    while centroids.len() < k {
        let scores: Vec<f64> = points
            .iter()
            .zip(&nearest_sq)
            .map(|(p, &d)| f64::from(p[0]) * d)
            .collect();
        let total: f64 = scores.iter().sum();
        let next = if total > 0.0 {
            sample_index(scores.iter().copied(), total, rng)
        } else {
            // All remaining mass sits on already-chosen positions; fall back
            // to a uniform draw.
            rng.gen_range(0..points.len())
        };
        let centroid = points[next][1..].to_vec();
        for (p, d) in points.iter().zip(nearest_sq.iter_mut()) {
            let cand = dist_sq(&p[1..], &centroid);
            if cand < *d {
                *d = cand;
            }
        }
        centroids.push(centroid);
    }

    Ok(centroids)
}

/// Refines centroids in place with Lloyd iterations over the weighted
/// points, stopping when the assignment stabilizes.
pub fn refine(centroids: &mut [Vec<f32>], points: &[Vec<f32>]) {
    if centroids.is_empty() || points.is_empty() {
        return;
    }
    let dim = centroids[0].len();
    let mut assignment = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITER {
        let mut changed = false;
        for (p, slot) in points.iter().zip(assignment.iter_mut()) {
            let nearest = nearest_centroid(&p[1..], centroids);
            if nearest != *slot {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f64; dim]; centroids.len()];
        let mut weights = vec![0.0f64; centroids.len()];
        for (p, &c) in points.iter().zip(&assignment) {
            let w = f64::from(p[0]);
            weights[c] += w;
            for (s, &v) in sums[c].iter_mut().zip(&p[1..]) {
                *s += w * f64::from(v);
            }
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if weights[c] > 0.0 {
                for (slot, s) in centroid.iter_mut().zip(&sums[c]) {
                    *slot = (s / weights[c]) as f32;
                }
            }
            // A cluster that lost all its points keeps its previous position.
        }
    }
}

/// Initializes and refines in one call; returns coordinate-only centroids.
///
/// # Errors
///
/// Propagates the validation errors of [`init_centroids`].
pub fn cluster_weighted<R: Rng>(
    k: usize,
    points: &[Vec<f32>],
    rng: &mut R,
) -> Result<Vec<Vec<f32>>> {
    let mut centroids = init_centroids(k, points, rng)?;
    refine(&mut centroids, points);
    Ok(centroids)
}

fn dist_sq(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

fn nearest_centroid(coords: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = dist_sq(coords, centroid);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

/// Draws an index with probability proportional to the given scores.
fn sample_index<R: Rng>(
    scores: impl Iterator<Item = f64>,
    total: f64,
    rng: &mut R,
) -> usize {
    let mut target = rng.gen::<f64>() * total;
    let mut last = 0;
    for (i, s) in scores.enumerate() {
        last = i;
        target -= s;
        if target <= 0.0 {
            return i;
        }
    }
    last
}
