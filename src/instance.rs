//! Stream header and instance types.
//!
//! A stream is described once by a [`StreamHeader`] (attribute kinds plus the
//! number of classes) and then delivers labeled [`Instance`] values one at a
//! time. Instances are immutable after creation and are shared by reference
//! between the input stream and the classifier memories, so they are handed
//! around as [`InstanceRef`] (an `Arc`).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The kind of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Real-valued attribute, compared by difference.
    Numeric,
    /// Categorical attribute, compared by equality.
    Nominal,
}

/// Static description of a data stream: attribute kinds and class count.
///
/// # Examples
///
/// ```
/// use recordar::instance::StreamHeader;
///
/// let header = StreamHeader::numeric(3, 2);
/// assert_eq!(header.n_attributes(), 3);
/// assert_eq!(header.n_classes(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeader {
    attributes: Vec<AttributeKind>,
    n_classes: usize,
}

impl StreamHeader {
    /// Creates a header from explicit attribute kinds.
    #[must_use]
    pub fn new(attributes: Vec<AttributeKind>, n_classes: usize) -> Self {
        Self {
            attributes,
            n_classes,
        }
    }

    /// Creates an all-numeric header with `n_attributes` attributes.
    #[must_use]
    pub fn numeric(n_attributes: usize, n_classes: usize) -> Self {
        Self {
            attributes: vec![AttributeKind::Numeric; n_attributes],
            n_classes,
        }
    }

    /// Returns the number of attributes (excluding the class).
    #[must_use]
    pub fn n_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Returns the declared number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Returns the kind of attribute `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn attribute(&self, idx: usize) -> AttributeKind {
        self.attributes[idx]
    }

    /// Returns all attribute kinds.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeKind] {
        &self.attributes
    }
}

/// A labeled feature vector. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    values: Vec<f32>,
    label: usize,
}

/// Shared handle to an instance.
///
/// The same handle travels from the stream into the STM and later into the
/// LTM; identity comparisons (`Arc::ptr_eq`) are used by the classifier to
/// recognize the instance it has just voted on.
pub type InstanceRef = Arc<Instance>;

impl Instance {
    /// Creates a new instance.
    #[must_use]
    pub fn new(values: Vec<f32>, label: usize) -> Self {
        Self { values, label }
    }

    /// Creates a new shared instance handle.
    #[must_use]
    pub fn shared(values: Vec<f32>, label: usize) -> InstanceRef {
        Arc::new(Self::new(values, label))
    }

    /// Returns the value of attribute `idx`.
    #[must_use]
    pub fn value(&self, idx: usize) -> f32 {
        self.values[idx]
    }

    /// Returns the full feature vector.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the class label.
    #[must_use]
    pub fn label(&self) -> usize {
        self.label
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn n_attributes(&self) -> usize {
        self.values.len()
    }
}
