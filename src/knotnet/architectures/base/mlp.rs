//! Multilayer perceptron over flattened Lk matrices.

use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;

use super::config::{ConfigError, Task};
use super::schedule::{LrSchedule, EXPONENTIAL_GAMMA};
use super::train::InvariantModel;

#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Side length of the square Lk matrix; the input is its flattening.
    pub lk_matrix_size: usize,
    /// Width of both hidden layers.
    pub hidden_size: usize,
    /// Dropout applied after each hidden activation.
    pub dropout: f64,
    #[config(default = 1)]
    pub num_invariants: usize,
    #[config(default = false)]
    pub classification: bool,
    #[config(default = 41)]
    pub num_classes: usize,
}

/// Two ReLU hidden layers with dropout, then a task-sized output head.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    dropout: Dropout,
    relu: Relu,
    task: Ignored<Task>,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Mlp<B>, ConfigError> {
        if self.lk_matrix_size == 0 {
            return Err(ConfigError::ZeroDim {
                name: "lk_matrix_size",
            });
        }
        if self.hidden_size == 0 {
            return Err(ConfigError::ZeroDim { name: "hidden_size" });
        }
        let task = Task::from_flags(self.classification, self.num_classes, self.num_invariants)?;

        let input_size = self.lk_matrix_size * self.lk_matrix_size;
        Ok(Mlp {
            fc1: LinearConfig::new(input_size, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            fc3: LinearConfig::new(self.hidden_size, task.output_width()).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            relu: Relu::new(),
            task: Ignored(task),
        })
    }
}

impl<B: Backend> Mlp<B> {
    /// `[batch, lk_matrix_size^2]` -> `[batch, output_width]`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        let x = self.relu.forward(self.fc2.forward(x));
        let x = self.dropout.forward(x);
        self.fc3.forward(x)
    }
}

impl<B: Backend> InvariantModel<B> for Mlp<B> {
    type Input = Tensor<B, 2>;

    fn forward(&self, input: Self::Input) -> Tensor<B, 2> {
        Mlp::forward(self, input)
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
