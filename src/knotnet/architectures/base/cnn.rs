//! Convolutional network over single-channel Lk matrix images.

use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{GroupNorm, GroupNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;

use super::config::{ConfigError, Task};
use super::schedule::{LrSchedule, EXPONENTIAL_GAMMA};
use super::train::InvariantModel;

const CHANNELS: [usize; 3] = [16, 32, 64];
const FC_HIDDEN: usize = 1000;

#[derive(Config, Debug)]
pub struct CnnConfig {
    /// Side length of the square single-channel input.
    pub lk_matrix_size: usize,
    /// Square kernel size for all three convolutions. Padding is 1 when
    /// the kernel is 3, else 0, so each layer changes the side length by
    /// `2 * padding - kernel_size + 1`.
    pub kernel_size: usize,
    /// Normalize each convolution's output over `[C, H, W]`.
    #[config(default = false)]
    pub layer_norm: bool,
    #[config(default = 1)]
    pub num_invariants: usize,
    #[config(default = false)]
    pub classification: bool,
    #[config(default = 41)]
    pub num_classes: usize,
}

impl CnnConfig {
    fn padding(&self) -> usize {
        usize::from(self.kernel_size == 3)
    }

    /// Spatial side length after `layers` stride-1 convolutions:
    /// each layer changes the side by `2 * padding - kernel_size + 1`.
    fn spatial_after(&self, layers: usize) -> isize {
        let delta = 2 * self.padding() as isize - self.kernel_size as isize + 1;
        self.lk_matrix_size as isize + layers as isize * delta
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Cnn<B>, ConfigError> {
        if self.lk_matrix_size == 0 {
            return Err(ConfigError::ZeroDim {
                name: "lk_matrix_size",
            });
        }
        if self.kernel_size == 0 {
            return Err(ConfigError::ZeroDim { name: "kernel_size" });
        }
        // Validate the shape arithmetic up front instead of letting the
        // flatten-to-linear step fail mid-batch.
        if self.kernel_size > self.lk_matrix_size || self.spatial_after(3) < 1 {
            return Err(ConfigError::CollapsedSpatial {
                lk_matrix_size: self.lk_matrix_size,
                kernel_size: self.kernel_size,
            });
        }
        let task = Task::from_flags(self.classification, self.num_classes, self.num_invariants)?;

        let padding = self.padding();
        let conv = |c_in: usize, c_out: usize| {
            Conv2dConfig::new([c_in, c_out], [self.kernel_size, self.kernel_size])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .init(device)
        };

        let norms = if self.layer_norm {
            // One-group GroupNorm normalizes jointly over [C, H, W];
            // affine parameters stay per-channel.
            Some([
                GroupNormConfig::new(1, CHANNELS[0]).init(device),
                GroupNormConfig::new(1, CHANNELS[1]).init(device),
                GroupNormConfig::new(1, CHANNELS[2]).init(device),
            ])
        } else {
            None
        };

        let final_side = self.spatial_after(3) as usize;
        let flattened = CHANNELS[2] * final_side * final_side;

        Ok(Cnn {
            conv1: conv(1, CHANNELS[0]),
            conv2: conv(CHANNELS[0], CHANNELS[1]),
            conv3: conv(CHANNELS[1], CHANNELS[2]),
            norms,
            fc1: LinearConfig::new(flattened, FC_HIDDEN).init(device),
            fc2: LinearConfig::new(FC_HIDDEN, task.output_width()).init(device),
            relu: Relu::new(),
            task: Ignored(task),
        })
    }
}

/// Three stride-1 convolutions (1 -> 16 -> 32 -> 64 channels) with optional
/// per-layer normalization, flattened into two fully-connected layers.
#[derive(Module, Debug)]
pub struct Cnn<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    norms: Option<[GroupNorm<B>; 3]>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
    task: Ignored<Task>,
}

impl<B: Backend> Cnn<B> {
    /// `[batch, 1, s, s]` -> `[batch, output_width]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.normed(x, 0);
        let x = self.relu.forward(x);

        let x = self.conv2.forward(x);
        let x = self.normed(x, 1);
        let x = self.relu.forward(x);

        let x = self.conv3.forward(x);
        let x = self.normed(x, 2);
        let x = self.relu.forward(x);

        let [batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);
        let x = self.relu.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    fn normed(&self, x: Tensor<B, 4>, layer: usize) -> Tensor<B, 4> {
        match &self.norms {
            Some(norms) => norms[layer].forward(x),
            None => x,
        }
    }
}

impl<B: Backend> InvariantModel<B> for Cnn<B> {
    type Input = Tensor<B, 4>;

    fn forward(&self, input: Self::Input) -> Tensor<B, 2> {
        Cnn::forward(self, input)
    }

    fn task(&self) -> &Task {
        &self.task.0
    }

    fn lr_schedule(&self) -> LrSchedule {
        LrSchedule::Exponential {
            gamma: EXPONENTIAL_GAMMA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_arithmetic() {
        // kernel 3 keeps the side length, kernel 2 shrinks by 1 per layer.
        let keep = CnnConfig::new(9, 3);
        assert_eq!(keep.spatial_after(3), 9);
        let shrink = CnnConfig::new(9, 2);
        assert_eq!(shrink.spatial_after(3), 6);
    }

    #[test]
    fn collapsed_spatial_rejected() {
        use burn_ndarray::NdArray;
        let device = Default::default();
        // 9x9 input with kernel 5 loses 4 per layer: 9 -> 5 -> 1 -> -3.
        let err = CnnConfig::new(9, 5).init::<NdArray<f32>>(&device).unwrap_err();
        assert!(matches!(err, ConfigError::CollapsedSpatial { .. }));
    }
}
