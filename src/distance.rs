//! Distance kernel over mixed numeric/nominal attributes.

use crate::error::{RecordarError, Result};
use crate::instance::{AttributeKind, Instance, StreamHeader};
use crate::window::InstanceWindow;
use serde::{Deserialize, Serialize};

/// The distance metric used by the kNN search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared numeric differences plus a nominal mismatch count, square-rooted.
    #[default]
    Euclidean,
    /// Sum of absolute differences over the selected attributes.
    Manhattan,
    /// Maximum absolute difference over the selected attributes.
    Chebyshev,
}

/// Distance computation over a selected attribute subset.
///
/// The kernel is built from a [`StreamHeader`] and pre-splits the selected
/// attributes into numeric and nominal groups so the Euclidean mix of
/// squared differences and mismatch counts needs no per-call dispatch.
///
/// # Examples
///
/// ```
/// use recordar::distance::DistanceKernel;
/// use recordar::instance::{Instance, StreamHeader};
///
/// let header = StreamHeader::numeric(2, 2);
/// let kernel = DistanceKernel::new(&header, Default::default());
/// let a = Instance::new(vec![0.0, 0.0], 0);
/// let b = Instance::new(vec![3.0, 4.0], 1);
/// assert!((kernel.dist(&a, &b) - 5.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct DistanceKernel {
    metric: DistanceMetric,
    attributes: Vec<usize>,
    numeric: Vec<usize>,
    nominal: Vec<usize>,
}

impl DistanceKernel {
    /// Creates a kernel over all attributes of the header.
    #[must_use]
    pub fn new(header: &StreamHeader, metric: DistanceMetric) -> Self {
        let attributes: Vec<usize> = (0..header.n_attributes()).collect();
        Self::build(header, metric, attributes)
    }

    /// Creates a kernel over a subset of attribute indices.
    ///
    /// # Errors
    ///
    /// Returns an error when the subset is empty or references an attribute
    /// outside the header.
    pub fn with_subset(
        header: &StreamHeader,
        metric: DistanceMetric,
        subset: Vec<usize>,
    ) -> Result<Self> {
        if subset.is_empty() {
            return Err(RecordarError::InvalidHyperparameter {
                name: "subset".to_string(),
                value: "[]".to_string(),
                constraint: "must select at least one attribute".to_string(),
            });
        }
        if let Some(&bad) = subset.iter().find(|&&i| i >= header.n_attributes()) {
            return Err(RecordarError::InvalidHyperparameter {
                name: "subset".to_string(),
                value: bad.to_string(),
                constraint: format!("attribute index must be < {}", header.n_attributes()),
            });
        }
        Ok(Self::build(header, metric, subset))
    }

    fn build(header: &StreamHeader, metric: DistanceMetric, attributes: Vec<usize>) -> Self {
        let mut numeric = Vec::new();
        let mut nominal = Vec::new();
        for &idx in &attributes {
            match header.attribute(idx) {
                AttributeKind::Numeric => numeric.push(idx),
                AttributeKind::Nominal => nominal.push(idx),
            }
        }
        Self {
            metric,
            attributes,
            numeric,
            nominal,
        }
    }

    /// Returns the selected attribute indices.
    #[must_use]
    pub fn attributes(&self) -> &[usize] {
        &self.attributes
    }

    /// Returns the metric in use.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns the distance between two instances.
    #[must_use]
    pub fn dist(&self, a: &Instance, b: &Instance) -> f32 {
        match self.metric {
            DistanceMetric::Euclidean => self.euclidean(a, b),
            DistanceMetric::Manhattan => self.manhattan(a, b),
            DistanceMetric::Chebyshev => self.chebyshev(a, b),
        }
    }

    /// Returns the distances from `x` to every instance of `window`.
    ///
    /// The output has one entry per window position, in window order.
    #[must_use]
    pub fn dist_to_all(&self, x: &Instance, window: &InstanceWindow) -> Vec<f32> {
        window.iter().map(|other| self.dist(x, other)).collect()
    }

    fn euclidean(&self, a: &Instance, b: &Instance) -> f32 {
        let mut sum = 0.0f32;
        for &idx in &self.nominal {
            if (a.value(idx) as i64) != (b.value(idx) as i64) {
                sum += 1.0;
            }
        }
        for &idx in &self.numeric {
            let diff = a.value(idx) - b.value(idx);
            sum += diff * diff;
        }
        sum.sqrt()
    }

    fn manhattan(&self, a: &Instance, b: &Instance) -> f32 {
        self.attributes
            .iter()
            .map(|&idx| (a.value(idx) - b.value(idx)).abs())
            .sum()
    }

    fn chebyshev(&self, a: &Instance, b: &Instance) -> f32 {
        self.attributes
            .iter()
            .map(|&idx| (a.value(idx) - b.value(idx)).abs())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
#[path = "distance_tests.rs"]
mod tests;
