//! Core trait for streaming classifiers.

use crate::error::Result;
use crate::instance::{InstanceRef, StreamHeader};

/// Contract shared by streaming classifiers.
///
/// Hosts drive a learner prequentially: every labeled instance is first
/// passed to [`predict`](StreamClassifier::predict) (test) and then to
/// [`train`](StreamClassifier::train) with the *same* shared handle. The
/// handle identity lets implementations reuse work between the two calls.
pub trait StreamClassifier {
    /// Initializes the learner for a stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for the header.
    fn set_context(&mut self, header: &StreamHeader) -> Result<()>;

    /// Returns a vote per class for the given instance. The vote vector is
    /// indexed by class and may be shorter than the declared class count
    /// when not all classes have been observed yet.
    fn predict(&mut self, x: &InstanceRef) -> Vec<f32>;

    /// Learns from the given instance.
    fn train(&mut self, x: &InstanceRef);

    /// Clears learned state. A new [`set_context`](StreamClassifier::set_context)
    /// call is required before further use.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    // The trait is exercised through its implementations.
}
