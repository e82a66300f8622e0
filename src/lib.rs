//! Recordar: streaming k-Nearest-Neighbor classification under concept drift.
//!
//! Recordar implements the Self-Adjusting Memory kNN classifier (SAM-kNN)
//! for evolving data streams, together with a Poisson-bagged ensemble
//! wrapper with ADWIN-driven member replacement.
//!
//! The classifier keeps a short-term memory for the active concept and a
//! compressed long-term memory for past concepts, and delegates every
//! prediction to whichever memory has recently been most accurate. The
//! short-term memory continuously re-sizes itself to the error-minimal
//! suffix of the stream, so abrupt, gradual and recurring drift are all
//! handled by the same mechanism.
//!
//! # Quick Start
//!
//! ```
//! use recordar::prelude::*;
//!
//! // A two-class stream over one numeric attribute.
//! let header = StreamHeader::numeric(1, 2);
//! let mut model = SamKnn::new().with_k(3).with_limit(200);
//! model.set_context(&header).expect("valid configuration");
//!
//! // Prequential: test on each instance, then train on it.
//! let mut eval = PrequentialEvaluation::new(50);
//! for i in 0..100 {
//!     let x = Instance::shared(vec![(i % 2) as f32], i % 2);
//!     eval.step(&mut model, &x);
//! }
//! assert!(eval.window_accuracy() > 0.9);
//! ```
//!
//! # Modules
//!
//! - [`sam`]: the SAM-kNN classifier
//! - [`ensemble`]: Poisson-bagged SAM-kNN ensemble
//! - [`instance`]: stream header and shared instances
//! - [`distance`]: mixed numeric/nominal distance kernel
//! - [`drift`]: ADWIN change detector
//! - [`cluster`]: weighted kMeans++ used for memory compression
//! - [`metrics`]: prequential evaluation helpers
//! - [`synthetic`]: seeded drift-stream generators

pub mod cluster;
pub mod distance;
pub mod drift;
pub mod ensemble;
pub mod error;
pub mod instance;
pub mod matrix;
pub mod metrics;
pub mod neighbors;
pub mod prelude;
pub mod sam;
pub mod synthetic;
pub mod traits;
pub mod window;

pub use ensemble::SamEnsemble;
pub use error::{RecordarError, Result};
pub use instance::{AttributeKind, Instance, InstanceRef, StreamHeader};
pub use sam::SamKnn;
pub use traits::StreamClassifier;
