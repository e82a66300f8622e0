//! Convenience re-exports for common usage.
//!
//! ```
//! use recordar::prelude::*;
//! ```

pub use crate::distance::DistanceMetric;
pub use crate::drift::Adwin;
pub use crate::ensemble::SamEnsemble;
pub use crate::error::{RecordarError, Result};
pub use crate::instance::{AttributeKind, Instance, InstanceRef, StreamHeader};
pub use crate::metrics::{accuracy, PrequentialEvaluation};
pub use crate::sam::SamKnn;
pub use crate::traits::StreamClassifier;
