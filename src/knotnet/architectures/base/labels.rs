//! Signed-value folding between class indices and signature values.
//!
//! Knot signatures are signed integers; classification folds them into the
//! non-negative bins `[0, num_classes)`. Index `i <= m` (with
//! `m = (num_classes - 1) / 2`) represents the signature `i`, and index
//! `i > m` represents `-(i - m)`. The fold is one-directional: it maps a
//! class index back to a value in regression-comparable units so the same
//! error metrics apply to both task kinds.

use burn::tensor::{backend::Backend, Tensor};

use super::config::ConfigError;

/// Mapping from a one-sided class-index range onto the symmetric signed
/// range it encodes. `num_classes` must be odd so the midpoint is integral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedClassMap {
    num_classes: usize,
}

impl SignedClassMap {
    pub const DEFAULT_NUM_CLASSES: usize = 41;

    pub fn new(num_classes: usize) -> Result<Self, ConfigError> {
        if num_classes == 0 {
            return Err(ConfigError::ZeroDim { name: "num_classes" });
        }
        if num_classes % 2 == 0 {
            return Err(ConfigError::EvenClassCount { num_classes });
        }
        Ok(Self { num_classes })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Largest representable signature magnitude, `(num_classes - 1) / 2`.
    pub fn midpoint(&self) -> usize {
        (self.num_classes - 1) / 2
    }

    /// Fold a float tensor of class indices into signed signature values.
    /// Elements `v <= m` pass through; elements `v > m` become `-(v - m)`.
    pub fn fold<B: Backend, const D: usize>(&self, values: Tensor<B, D>) -> Tensor<B, D> {
        let m = self.midpoint() as f32;
        let above = values.clone().greater_elem(m);
        let folded = values.clone().sub_scalar(m).neg();
        values.mask_where(above, folded)
    }

    /// Scalar version of [`fold`](Self::fold) for a single class index.
    pub fn fold_index(&self, idx: usize) -> i64 {
        let m = self.midpoint();
        if idx > m {
            -((idx - m) as i64)
        } else {
            idx as i64
        }
    }
}
