//! The shared training contract.
//!
//! Every model variant implements [`InvariantModel`]: one forward
//! operation from its input type to `[batch, output_width]` predictions,
//! plus its task kind and learning-rate schedule. The step functions here
//! drive that contract once per batch:
//!
//! - [`training_step`]: forward, loss (smoothed cross-entropy or MSE),
//!   `train_loss` logging, loss tensor returned for backward.
//! - [`evaluation_step`]: forward, arg-max + signed fold in classification
//!   mode, MSE and L1 metrics under phase-specific names.
//! - [`Trainer`]: owns the model, Adam optimizer, and schedule state, and
//!   applies the parameter update after each training step.
//!
//! Batches are assumed validated upstream; a malformed shape fails
//! immediately inside the tensor ops with no recovery.

use std::fmt;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Int, Tensor};

use super::config::{ConfigError, Task};
use super::loss_utils;
use super::schedule::{LrSchedule, ScheduleState, BASE_LEARNING_RATE};

/// A step-level failure surfaced to the training-loop driver.
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    /// The loss or a metric came out NaN or infinite.
    NonFiniteLoss { metric: String, value: f32 },
    /// The batch's target kind does not match the model's task.
    TargetMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::NonFiniteLoss { metric, value } => {
                write!(f, "{} is not finite: {}", metric, value)
            }
            StepError::TargetMismatch { expected, found } => {
                write!(f, "expected {} targets, got {}", expected, found)
            }
        }
    }
}

impl std::error::Error for StepError {}

/// Batch targets: class indices for classification, continuous values for
/// regression.
#[derive(Debug, Clone)]
pub enum Targets<B: Backend> {
    /// `[batch]` class indices in `[0, num_classes)`.
    Classes(Tensor<B, 1, Int>),
    /// `[batch, num_invariants]` continuous targets.
    Values(Tensor<B, 2>),
}

impl<B: Backend> Targets<B> {
    fn kind(&self) -> &'static str {
        match self {
            Targets::Classes(_) => "class-index",
            Targets::Values(_) => "continuous",
        }
    }
}

/// Metric-logging collaborator: receives one named scalar per metric per
/// step.
pub trait MetricLogger {
    fn log_scalar(&mut self, name: &str, value: f32);
}

/// Logs metrics through the `log` crate.
#[derive(Debug, Default, Clone)]
pub struct LogMetricLogger;

impl MetricLogger for LogMetricLogger {
    fn log_scalar(&mut self, name: &str, value: f32) {
        log::info!(target: "knotnet::metrics", "{} = {:.6}", name, value);
    }
}

/// Records metrics in memory; used by tests and the demo binary.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    pub scalars: Vec<(String, f32)>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded value under `name`, if any.
    pub fn value(&self, name: &str) -> Option<f32> {
        self.scalars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl MetricLogger for RecordingLogger {
    fn log_scalar(&mut self, name: &str, value: f32) {
        self.scalars.push((name.to_string(), value));
    }
}

/// Evaluation phase, selecting the metric names to report under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalPhase {
    Validate,
    Test,
}

impl EvalPhase {
    pub fn mse_name(&self) -> &'static str {
        match self {
            EvalPhase::Validate => "val_mse_loss",
            EvalPhase::Test => "test_mse_loss",
        }
    }

    pub fn l1_name(&self) -> &'static str {
        match self {
            EvalPhase::Validate => "val_l1_loss",
            EvalPhase::Test => "test_l1_loss",
        }
    }
}

/// The capability every model variant provides to the training contract.
pub trait InvariantModel<B: Backend> {
    /// Batch input type: flattened matrices, images, token sequences, or
    /// graphs depending on the variant.
    type Input: Clone;

    /// Map one batch to `[batch, output_width]` predictions.
    fn forward(&self, input: Self::Input) -> Tensor<B, 2>;

    /// The task this model instance was constructed for.
    fn task(&self) -> &Task;

    /// The learning-rate schedule this variant trains under.
    fn lr_schedule(&self) -> LrSchedule;
}

/// Validation/test metrics computed by [`evaluation_step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalMetrics {
    pub mse: f32,
    pub l1: f32,
}

/// Forward one batch and compute the training loss.
///
/// Classification uses cross-entropy with label smoothing 0.1; regression
/// uses mean-squared error. The scalar is logged as `train_loss` and the
/// loss tensor is returned for gradient computation by the caller.
pub fn training_step<B, M, L>(
    model: &M,
    input: M::Input,
    targets: &Targets<B>,
    logger: &mut L,
) -> Result<Tensor<B, 1>, StepError>
where
    B: Backend,
    M: InvariantModel<B>,
    L: MetricLogger,
{
    let predictions = model.forward(input);
    let loss = match (model.task(), targets) {
        (Task::Classification { .. }, Targets::Classes(y)) => {
            loss_utils::classification_loss(predictions, y.clone())
        }
        (Task::Regression { .. }, Targets::Values(y)) => {
            loss_utils::mse_loss(predictions, y.clone())
        }
        (Task::Classification { .. }, other) => {
            return Err(StepError::TargetMismatch {
                expected: "class-index",
                found: other.kind(),
            })
        }
        (Task::Regression { .. }, other) => {
            return Err(StepError::TargetMismatch {
                expected: "continuous",
                found: other.kind(),
            })
        }
    };
    let value = loss_utils::ensure_finite(&loss, "train_loss")?;
    logger.log_scalar("train_loss", value);
    Ok(loss)
}

/// Forward one batch and compute validation/test error metrics.
///
/// In classification mode the per-sample arg-max class index (batch
/// dimension preserved) and the float-cast target are both folded through
/// the model's [`super::labels::SignedClassMap`], so discrete predictions
/// are scored in the same signed units as regression outputs. Both MSE and
/// L1 are logged under the phase's metric names.
pub fn evaluation_step<B, M, L>(
    model: &M,
    input: M::Input,
    targets: &Targets<B>,
    phase: EvalPhase,
    logger: &mut L,
) -> Result<EvalMetrics, StepError>
where
    B: Backend,
    M: InvariantModel<B>,
    L: MetricLogger,
{
    let predictions = model.forward(input);
    let (predictions, targets) = match (model.task(), targets) {
        (Task::Classification { classes }, Targets::Classes(y)) => {
            // [batch, num_classes] logits -> [batch, 1] class indices.
            let class_idxs = predictions.argmax(1).float();
            let folded_pred = classes.fold(class_idxs);
            let folded_target = classes.fold(y.clone().float().unsqueeze_dim::<2>(1));
            (folded_pred, folded_target)
        }
        (Task::Regression { .. }, Targets::Values(y)) => (predictions, y.clone()),
        (Task::Classification { .. }, other) => {
            return Err(StepError::TargetMismatch {
                expected: "class-index",
                found: other.kind(),
            })
        }
        (Task::Regression { .. }, other) => {
            return Err(StepError::TargetMismatch {
                expected: "continuous",
                found: other.kind(),
            })
        }
    };

    let mse = loss_utils::mse_loss(predictions.clone(), targets.clone());
    let l1 = loss_utils::l1_loss(predictions, targets);
    let mse = loss_utils::ensure_finite(&mse, phase.mse_name())?;
    let l1 = loss_utils::ensure_finite(&l1, phase.l1_name())?;
    logger.log_scalar(phase.mse_name(), mse);
    logger.log_scalar(phase.l1_name(), l1);
    Ok(EvalMetrics { mse, l1 })
}

/// Owns a model, its Adam optimizer, and its learning-rate schedule, and
/// applies parameter updates after each training step.
pub struct Trainer<B, M>
where
    B: AutodiffBackend,
    M: InvariantModel<B> + AutodiffModule<B>,
{
    pub model: M,
    optimizer: OptimizerAdaptor<Adam, M, B>,
    schedule: ScheduleState,
    pub iteration: usize,
}

impl<B, M> Trainer<B, M>
where
    B: AutodiffBackend,
    M: InvariantModel<B> + AutodiffModule<B>,
{
    /// Build a trainer around `model` with Adam at the shared base rate and
    /// the variant's own schedule.
    pub fn new(model: M) -> Result<Self, ConfigError> {
        let schedule = ScheduleState::new(model.lr_schedule(), BASE_LEARNING_RATE)?;
        let adam_config = AdamConfig::new();
        let optimizer = OptimizerAdaptor::from(adam_config.init());
        Ok(Self {
            model,
            optimizer,
            schedule,
            iteration: 0,
        })
    }

    /// One full training iteration: shared training step, backward,
    /// optimizer update at the schedule's current rate.
    pub fn train_step<L: MetricLogger>(
        &mut self,
        input: M::Input,
        targets: &Targets<B>,
        logger: &mut L,
    ) -> Result<f32, StepError> {
        let loss = training_step(&self.model, input, targets, logger)?;
        let value = loss_utils::scalar_value(&loss);

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        let lr = self.schedule.on_step();
        self.model = self.optimizer.step(lr, self.model.clone(), grads);
        self.iteration += 1;
        Ok(value)
    }

    /// Run an evaluation step without touching parameters.
    ///
    /// Evaluation happens on the inner-backend view of the model
    /// (`AutodiffModule::valid`), so dropout is inert and the metrics are
    /// deterministic for a given batch.
    pub fn eval_step<L: MetricLogger>(
        &self,
        input: <M::InnerModule as InvariantModel<B::InnerBackend>>::Input,
        targets: &Targets<B::InnerBackend>,
        phase: EvalPhase,
        logger: &mut L,
    ) -> Result<EvalMetrics, StepError>
    where
        M::InnerModule: InvariantModel<B::InnerBackend>,
    {
        evaluation_step(&self.model.valid(), input, targets, phase, logger)
    }

    /// Advance per-epoch schedules; call once at the end of every epoch.
    pub fn end_epoch(&mut self) {
        self.schedule.on_epoch_end();
    }

    /// The learning rate the next optimizer step would use.
    pub fn learning_rate(&self) -> f64 {
        self.schedule.current_lr()
    }
}
