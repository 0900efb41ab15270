//! Memory-efficient transformer for long braid-word sequences.
//!
//! Two differences from the standard encoder keep the memory footprint
//! proportional to `chunk_size * seq_len` instead of `seq_len^2` held all
//! at once, and the position table tiny:
//!
//! - attention is computed for one chunk of query positions at a time
//!   against the full key/value set (non-causal, still exact full
//!   attention);
//! - positions are encoded by a learned axial embedding: two tables whose
//!   outer sum covers `max_seq_len` positions with `O(sqrt(max_seq_len))`
//!   rows each.

use burn::config::Config;
use burn::module::{Ignored, Module, Param};
use burn::nn::{Embedding, EmbeddingConfig, Gelu, Initializer, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::Int;

use super::config::{ConfigError, Task};
use super::schedule::LrSchedule;
use super::train::InvariantModel;

#[derive(Config, Debug)]
pub struct ReformerConfig {
    pub vocab_size: usize,
    pub d_model: usize,
    /// Attention heads; must divide `d_model`.
    pub nhead: usize,
    pub num_layers: usize,
    /// Longest supported sequence; must factor into the axial grid.
    pub max_seq_len: usize,
    /// Warm-up length of the Noam schedule, in batches.
    pub warmup_steps: usize,
    /// Query positions attended per attention pass.
    #[config(default = 64)]
    pub chunk_size: usize,
    /// Feed-forward width; defaults to `4 * d_model`.
    pub dim_feedforward: Option<usize>,
    #[config(default = false)]
    pub classification: bool,
    #[config(default = 41)]
    pub num_classes: usize,
}

/// Factor `n` into `(rows, cols)` with `rows <= cols`, preferring the most
/// square grid. Fails for lengths with no non-trivial factorization.
fn axial_grid(n: usize) -> Option<(usize, usize)> {
    let mut rows = (n as f64).sqrt() as usize;
    while rows > 1 {
        if n % rows == 0 {
            return Some((rows, n / rows));
        }
        rows -= 1;
    }
    None
}

/// Learned axial position table: position `p` maps to
/// `rows[p / cols_per_row] + cols[p % cols_per_row]`.
#[derive(Module, Debug)]
pub struct AxialPositionalEmbedding<B: Backend> {
    rows: Param<Tensor<B, 2>>,
    cols: Param<Tensor<B, 2>>,
    cols_per_row: usize,
}

impl<B: Backend> AxialPositionalEmbedding<B> {
    fn new(grid: (usize, usize), d_model: usize, device: &B::Device) -> Self {
        let initializer = Initializer::Normal {
            mean: 0.0,
            std: 0.02,
        };
        Self {
            rows: initializer.init([grid.0, d_model], device),
            cols: initializer.init([grid.1, d_model], device),
            cols_per_row: grid.1,
        }
    }

    fn max_positions(&self) -> usize {
        self.rows.dims()[0] * self.cols_per_row
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, seq_len, _] = x.dims();
        if seq_len > self.max_positions() {
            panic!(
                "sequence length {} exceeds axial position capacity {}",
                seq_len,
                self.max_positions()
            );
        }
        let device = x.device();
        let row_idx: Vec<i64> = (0..seq_len).map(|p| (p / self.cols_per_row) as i64).collect();
        let col_idx: Vec<i64> = (0..seq_len).map(|p| (p % self.cols_per_row) as i64).collect();
        let row_idx = Tensor::<B, 1, Int>::from_ints(row_idx.as_slice(), &device);
        let col_idx = Tensor::<B, 1, Int>::from_ints(col_idx.as_slice(), &device);
        let positions = self.rows.val().select(0, row_idx) + self.cols.val().select(0, col_idx);
        x + positions.unsqueeze::<3>()
    }
}

/// Exact multi-head full attention evaluated one query chunk at a time.
#[derive(Module, Debug)]
pub struct ChunkedSelfAttention<B: Backend> {
    query: Linear<B>,
    key: Linear<B>,
    value: Linear<B>,
    output: Linear<B>,
    n_heads: usize,
    d_k: usize,
    chunk_size: usize,
}

impl<B: Backend> ChunkedSelfAttention<B> {
    fn new(d_model: usize, n_heads: usize, chunk_size: usize, device: &B::Device) -> Self {
        Self {
            query: LinearConfig::new(d_model, d_model).init(device),
            key: LinearConfig::new(d_model, d_model).init(device),
            value: LinearConfig::new(d_model, d_model).init(device),
            output: LinearConfig::new(d_model, d_model).init(device),
            n_heads,
            d_k: d_model / n_heads,
            chunk_size,
        }
    }

    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, seq_len, _] = x.dims();
        x.reshape([batch, seq_len, self.n_heads, self.d_k])
            .swap_dims(1, 2)
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, d_model] = x.dims();
        let q = self.split_heads(self.query.forward(x.clone()));
        let k = self.split_heads(self.key.forward(x.clone()));
        let v = self.split_heads(self.value.forward(x));

        let scale = (self.d_k as f64).sqrt();
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < seq_len {
            let end = usize::min(start + self.chunk_size, seq_len);
            let q_chunk = q
                .clone()
                .slice([0..batch, 0..self.n_heads, start..end, 0..self.d_k]);
            // [batch, heads, chunk, seq]
            let scores = q_chunk.matmul(k.clone().transpose()).div_scalar(scale as f32);
            let probs = activation::softmax(scores, 3);
            chunks.push(probs.matmul(v.clone()));
            start = end;
        }

        let context = Tensor::cat(chunks, 2)
            .swap_dims(1, 2)
            .reshape([batch, seq_len, d_model]);
        self.output.forward(context)
    }
}

/// Post-norm encoder layer around the chunked attention.
#[derive(Module, Debug)]
pub struct LongEncoderLayer<B: Backend> {
    attention: ChunkedSelfAttention<B>,
    norm1: LayerNorm<B>,
    ff1: Linear<B>,
    ff2: Linear<B>,
    norm2: LayerNorm<B>,
    activation: Gelu,
}

impl<B: Backend> LongEncoderLayer<B> {
    fn new(
        d_model: usize,
        n_heads: usize,
        chunk_size: usize,
        dim_feedforward: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            attention: ChunkedSelfAttention::new(d_model, n_heads, chunk_size, device),
            norm1: LayerNormConfig::new(d_model).init(device),
            ff1: LinearConfig::new(d_model, dim_feedforward).init(device),
            ff2: LinearConfig::new(dim_feedforward, d_model).init(device),
            norm2: LayerNormConfig::new(d_model).init(device),
            activation: Gelu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.norm1.forward(x.clone() + self.attention.forward(x));
        let ff = self.ff2.forward(self.activation.forward(self.ff1.forward(x.clone())));
        self.norm2.forward(x + ff)
    }
}

/// Long-sequence encoder: embedding, axial positions, chunked-attention
/// layers, mean pooling, task head.
#[derive(Module, Debug)]
pub struct Reformer<B: Backend> {
    embed: Embedding<B>,
    positions: AxialPositionalEmbedding<B>,
    layers: Vec<LongEncoderLayer<B>>,
    final_layer: Linear<B>,
    d_model: usize,
    warmup_steps: usize,
    task: Ignored<Task>,
}

impl ReformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Reformer<B>, ConfigError> {
        if self.vocab_size == 0 {
            return Err(ConfigError::ZeroDim { name: "vocab_size" });
        }
        if self.num_layers == 0 {
            return Err(ConfigError::ZeroDim { name: "num_layers" });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroDim { name: "chunk_size" });
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
        if self.max_seq_len == 0 {
            return Err(ConfigError::SequenceLengthZero);
        }
        let grid = axial_grid(self.max_seq_len).ok_or(ConfigError::AxialFactorization {
            max_seq_len: self.max_seq_len,
        })?;
        let task = Task::from_flags(self.classification, self.num_classes, 1)?;
        let dim_feedforward = self.dim_feedforward.unwrap_or(4 * self.d_model);

        let layers = (0..self.num_layers)
            .map(|_| {
                LongEncoderLayer::new(
                    self.d_model,
                    self.nhead,
                    self.chunk_size,
                    dim_feedforward,
                    device,
                )
            })
            .collect();

        Ok(Reformer {
            embed: EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            positions: AxialPositionalEmbedding::new(grid, self.d_model, device),
            layers,
            final_layer: LinearConfig::new(self.d_model, task.output_width()).init(device),
            d_model: self.d_model,
            warmup_steps: self.warmup_steps,
            task: Ignored(task),
        })
    }
}

impl<B: Backend> Reformer<B> {
    /// `[batch, seq_len]` token indices -> `[batch, output_width]`.
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let mut x = self.positions.forward(self.embed.forward(tokens));
        for layer in &self.layers {
            x = layer.forward(x);
        }
        let pooled = x.mean_dim(1).squeeze::<2>(1);
        self.final_layer.forward(pooled)
    }
}

impl<B: Backend> InvariantModel<B> for Reformer<B> {
    type Input = Tensor<B, 2, Int>;

    fn forward(&self, input: Self::Input) -> Tensor<B, 2> {
        Reformer::forward(self, input)
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
