//! Seeded stream generators for drift experiments and tests.

use crate::instance::{Instance, InstanceRef};
use rand::Rng;

/// Generates `n` instances with features uniform in `[0, 1)` and a fixed
/// label. Concatenating blocks with different labels yields a pure label
/// drift: the feature distribution never moves, only the target does.
#[must_use]
pub fn uniform_label_stream<R: Rng>(
    n: usize,
    n_features: usize,
    label: usize,
    rng: &mut R,
) -> Vec<InstanceRef> {
    (0..n)
        .map(|_| {
            let values = (0..n_features).map(|_| rng.gen::<f32>()).collect();
            Instance::shared(values, label)
        })
        .collect()
}

/// Generates `n` instances drawn round-robin from Gaussian-ish blobs.
///
/// Each entry of `centers` pairs a blob center with its label; `spread`
/// scales a symmetric triangular noise term per dimension.
#[must_use]
pub fn blob_stream<R: Rng>(
    n: usize,
    centers: &[(Vec<f32>, usize)],
    spread: f32,
    rng: &mut R,
) -> Vec<InstanceRef> {
    assert!(!centers.is_empty(), "at least one blob center is required");
    (0..n)
        .map(|i| {
            let (center, label) = &centers[i % centers.len()];
            let values = center
                .iter()
                .map(|&c| c + spread * (rng.gen::<f32>() + rng.gen::<f32>() - 1.0))
                .collect();
            Instance::shared(values, *label)
        })
        .collect()
}

/// Alternating blocks of two label-drift concepts: blocks at even positions
/// label their instances 0, odd positions label them 1.
#[must_use]
pub fn alternating_label_stream<R: Rng>(
    block_size: usize,
    n_blocks: usize,
    n_features: usize,
    rng: &mut R,
) -> Vec<InstanceRef> {
    let mut stream = Vec::with_capacity(block_size * n_blocks);
    for block in 0..n_blocks {
        stream.extend(uniform_label_stream(
            block_size,
            n_features,
            block % 2,
            rng,
        ));
    }
    stream
}
