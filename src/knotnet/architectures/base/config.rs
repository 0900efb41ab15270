//! Shared configuration types for the model variants.
//!
//! Every architecture config validates eagerly in its `init` and returns
//! `Result<_, ConfigError>`, so misconfiguration surfaces at construction
//! rather than as a runtime shape mismatch deep inside a forward pass.

use std::fmt;

use super::labels::SignedClassMap;

/// What a model predicts: continuous invariant values, or a class index
/// into the signed-value fold.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Predict `num_invariants` continuous values per sample.
    Regression { num_invariants: usize },
    /// Predict one of `classes.num_classes()` folded signature bins.
    Classification { classes: SignedClassMap },
}

impl Task {
    /// Build a task from the per-variant `classification`/`num_classes`/
    /// `num_invariants` constructor parameters.
    pub fn from_flags(
        classification: bool,
        num_classes: usize,
        num_invariants: usize,
    ) -> Result<Self, ConfigError> {
        if classification {
            Ok(Task::Classification {
                classes: SignedClassMap::new(num_classes)?,
            })
        } else {
            if num_invariants == 0 {
                return Err(ConfigError::ZeroDim {
                    name: "num_invariants",
                });
            }
            Ok(Task::Regression { num_invariants })
        }
    }

    /// Width of the model's output layer: `num_classes` for classification,
    /// `num_invariants` for regression.
    pub fn output_width(&self) -> usize {
        match self {
            Task::Regression { num_invariants } => *num_invariants,
            Task::Classification { classes } => classes.num_classes(),
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, Task::Classification { .. })
    }
}

/// Misconfiguration detected at model construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The signed-value fold needs an odd class count to have an integer
    /// midpoint.
    EvenClassCount { num_classes: usize },
    /// A dimension that must be positive was zero.
    ZeroDim { name: &'static str },
    /// The Noam schedule needs at least one warm-up step.
    InvalidWarmupSteps { warmup_steps: usize },
    /// Attention heads must evenly divide the embedding dimension.
    HeadsMismatch { d_model: usize, nhead: usize },
    /// The configured kernel size shrinks the CNN feature maps to nothing.
    CollapsedSpatial {
        lk_matrix_size: usize,
        kernel_size: usize,
    },
    /// The GAT supports exactly two or three attention layers.
    BadLayerCount { num_layers: usize },
    /// The axial positional embedding needs `max_seq_len` to factor into a
    /// two-dimensional grid.
    AxialFactorization { max_seq_len: usize },
    /// A sequence model was configured with a zero-length position table.
    SequenceLengthZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EvenClassCount { num_classes } => write!(
                f,
                "num_classes must be odd for the signed-value fold, got {}",
                num_classes
            ),
            ConfigError::ZeroDim { name } => {
                write!(f, "{} must be positive, got 0", name)
            }
            ConfigError::InvalidWarmupSteps { warmup_steps } => write!(
                f,
                "warmup_steps must be at least 1 for the Noam schedule, got {}",
                warmup_steps
            ),
            ConfigError::HeadsMismatch { d_model, nhead } => write!(
                f,
                "d_model ({}) must be divisible by nhead ({})",
                d_model, nhead
            ),
            ConfigError::CollapsedSpatial {
                lk_matrix_size,
                kernel_size,
            } => write!(
                f,
                "kernel_size {k} collapses the {s}x{s} input below 1x1 after three convolutions",
                k = kernel_size,
                s = lk_matrix_size
            ),
            ConfigError::BadLayerCount { num_layers } => write!(
                f,
                "GAT supports 2 or 3 attention layers, got {}",
                num_layers
            ),
            ConfigError::AxialFactorization { max_seq_len } => write!(
                f,
                "max_seq_len {} has no two-factor axial decomposition",
                max_seq_len
            ),
            ConfigError::SequenceLengthZero => {
                write!(f, "maximum sequence length must be positive")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_from_flags_regression() {
        let task = Task::from_flags(false, 41, 3).unwrap();
        assert_eq!(task.output_width(), 3);
        assert!(!task.is_classification());
    }

    #[test]
    fn task_from_flags_classification_needs_odd_classes() {
        let task = Task::from_flags(true, 41, 1).unwrap();
        assert_eq!(task.output_width(), 41);
        assert!(task.is_classification());

        let err = Task::from_flags(true, 40, 1).unwrap_err();
        assert_eq!(err, ConfigError::EvenClassCount { num_classes: 40 });
    }

    #[test]
    fn zero_invariants_rejected() {
        let err = Task::from_flags(false, 41, 0).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDim { .. }));
    }
}
