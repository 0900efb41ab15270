//! Transformer encoder over braid-word token sequences.

use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::transformer::{
    TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput,
};
use burn::nn::{Embedding, EmbeddingConfig};
use burn::prelude::*;
use burn::tensor::Int;

use super::config::{ConfigError, Task};
use super::positional::{PositionalEncoding, PositionalEncodingConfig};
use super::schedule::LrSchedule;
use super::train::InvariantModel;

#[derive(Config, Debug)]
pub struct TransformerConfig {
    /// Token vocabulary size (braid generators plus padding).
    pub vocab_size: usize,
    /// Embedding dimension.
    pub d_model: usize,
    /// Attention heads per encoder layer; must divide `d_model`.
    pub nhead: usize,
    /// Number of stacked encoder layers.
    pub num_encoder_layers: usize,
    /// Width of each layer's position-wise feed-forward block.
    pub dim_feedforward: usize,
    /// Longest sequence the positional encoding covers.
    pub max_seq_length: usize,
    /// Warm-up length of the Noam schedule, in batches.
    pub warmup_steps: usize,
    #[config(default = false)]
    pub classification: bool,
    #[config(default = 41)]
    pub num_classes: usize,
}

/// Embedding scaled by sqrt(d_model), sinusoidal positional encoding, a
/// stack of standard encoder layers, mean pooling over the sequence axis,
/// and a task-sized head.
#[derive(Module, Debug)]
pub struct Transformer<B: Backend> {
    embed: Embedding<B>,
    pos_encoder: PositionalEncoding<B>,
    encoder: TransformerEncoder<B>,
    final_layer: burn::nn::Linear<B>,
    d_model: usize,
    warmup_steps: usize,
    task: Ignored<Task>,
}

impl TransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Transformer<B>, ConfigError> {
        if self.vocab_size == 0 {
            return Err(ConfigError::ZeroDim { name: "vocab_size" });
        }
        if self.num_encoder_layers == 0 {
            return Err(ConfigError::ZeroDim {
                name: "num_encoder_layers",
            });
        }
        if self.dim_feedforward == 0 {
            return Err(ConfigError::ZeroDim {
                name: "dim_feedforward",
            });
        }
        if self.nhead == 0 || self.d_model % self.nhead != 0 {
            return Err(ConfigError::HeadsMismatch {
                d_model: self.d_model,
                nhead: self.nhead,
            });
        }
        if self.warmup_steps == 0 {
            return Err(ConfigError::InvalidWarmupSteps {
                warmup_steps: self.warmup_steps,
            });
        }
        // Regression projects the pooled embedding to a single scalar.
        let task = Task::from_flags(self.classification, self.num_classes, 1)?;

        let pos_encoder = PositionalEncodingConfig::new(self.d_model, self.max_seq_length)
            .init::<B>(device)?;
        let encoder = TransformerEncoderConfig::new(
            self.d_model,
            self.dim_feedforward,
            self.nhead,
            self.num_encoder_layers,
        )
        .init(device);

        Ok(Transformer {
            embed: EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            pos_encoder,
            encoder,
            final_layer: burn::nn::LinearConfig::new(self.d_model, task.output_width())
                .init(device),
            d_model: self.d_model,
            warmup_steps: self.warmup_steps,
            task: Ignored(task),
        })
    }
}

impl<B: Backend> Transformer<B> {
    /// `[batch, seq_len]` token indices -> `[batch, output_width]`.
    pub fn forward(&self, src: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let embedded = self.embed.forward(src) * (self.d_model as f64).sqrt();
        let encoded = self
            .encoder
            .forward(TransformerEncoderInput::new(self.pos_encoder.forward(embedded)));
        let pooled = encoded.mean_dim(1).squeeze::<2>(1);
        self.final_layer.forward(pooled)
    }
}

impl<B: Backend> InvariantModel<B> for Transformer<B> {
    type Input = Tensor<B, 2, Int>;

    fn forward(&self, input: Self::Input) -> Tensor<B, 2> {
        Transformer::forward(self, input)
    }

    fn task(&self) -> &Task {
        &self.task.0
    }

    fn lr_schedule(&self) -> LrSchedule {
        LrSchedule::Noam {
            d_model: self.d_model,
            warmup_steps: self.warmup_steps,
        }
    }
}
