//! Loss computation helpers shared by every model variant.

use burn::nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction};
use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};

use super::train::StepError;

/// Label smoothing applied to every classification loss.
pub const LABEL_SMOOTHING: f32 = 0.1;

/// Smoothed cross-entropy over `[batch, num_classes]` logits and `[batch]`
/// class-index targets.
pub fn classification_loss<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let device = logits.device();
    CrossEntropyLossConfig::new()
        .with_smoothing(Some(LABEL_SMOOTHING))
        .init(&device)
        .forward(logits, targets)
}

/// Mean-squared error between same-shaped prediction and target tensors.
pub fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    MseLoss::new().forward(predictions, targets, Reduction::Mean)
}

/// Mean absolute error between same-shaped prediction and target tensors.
pub fn l1_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (predictions - targets).abs().mean()
}

/// Read a scalar loss back to the host.
pub fn scalar_value<B: Backend>(loss: &Tensor<B, 1>) -> f32 {
    loss.clone().into_scalar().elem::<f32>()
}

/// Read a scalar loss and fail if it is NaN or infinite, so numerical
/// instability surfaces as a distinct error instead of propagating through
/// logged metrics and gradients.
pub fn ensure_finite<B: Backend>(
    loss: &Tensor<B, 1>,
    metric: &str,
) -> Result<f32, StepError> {
    let value = scalar_value(loss);
    if !value.is_finite() {
        return Err(StepError::NonFiniteLoss {
            metric: metric.to_string(),
            value,
        });
    }
    Ok(value)
}
