//! Sinusoidal positional encoding.
//!
//! A fixed `[max_len, d_model]` table computed once at construction: even
//! feature columns hold `sin(pos / 10000^(2i/d_model))` and odd columns the
//! matching `cos`. No learned state.

use burn::config::Config;
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

use super::config::ConfigError;

#[derive(Config, Debug)]
pub struct PositionalEncodingConfig {
    /// Embedding dimension of the sequence model this table is added to.
    pub d_model: usize,
    /// Number of precomputed positions.
    pub max_len: usize,
}

/// Constant positional encoding table, added to batch-first sequence
/// embeddings of shape `[batch, seq_len, d_model]`.
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    /// `[max_len, d_model]` table; a constant tensor, not a parameter.
    pe: Tensor<B, 2>,
}

impl PositionalEncodingConfig {
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<PositionalEncoding<B>, ConfigError> {
        if self.d_model == 0 {
            return Err(ConfigError::ZeroDim { name: "d_model" });
        }
        if self.max_len == 0 {
            return Err(ConfigError::SequenceLengthZero);
        }

        let mut table = vec![0.0f32; self.max_len * self.d_model];
        for pos in 0..self.max_len {
            let mut i = 0;
            while i < self.d_model {
                let exponent = i as f64 / self.d_model as f64;
                let angle = pos as f64 / 10000f64.powf(exponent);
                table[pos * self.d_model + i] = angle.sin() as f32;
                if i + 1 < self.d_model {
                    table[pos * self.d_model + i + 1] = angle.cos() as f32;
                }
                i += 2;
            }
        }

        let pe = Tensor::<B, 1>::from_floats(table.as_slice(), device)
            .reshape([self.max_len, self.d_model]);
        Ok(PositionalEncoding { pe })
    }
}

impl<B: Backend> PositionalEncoding<B> {
    /// Add the first `seq_len` rows of the table to `x`, broadcasting over
    /// the batch dimension.
    ///
    /// # Panics
    /// On a sequence longer than `max_len` or a feature width other than
    /// `d_model`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, seq_len, d_model] = x.dims();
        let [max_len, table_width] = self.pe.dims();
        if seq_len > max_len {
            panic!(
                "sequence length {} exceeds positional encoding table length {}",
                seq_len, max_len
            );
        }
        if d_model != table_width {
            panic!(
                "input feature width {} does not match positional encoding d_model {}",
                d_model, table_width
            );
        }
        let rows = self.pe.clone().slice([0..seq_len, 0..d_model]);
        x + rows.unsqueeze::<3>()
    }

    /// The raw `[max_len, d_model]` table.
    pub fn table(&self) -> Tensor<B, 2> {
        self.pe.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn zero_dimensions_rejected() {
        let device = Default::default();
        assert!(PositionalEncodingConfig::new(0, 8)
            .init::<TestBackend>(&device)
            .is_err());
        assert!(PositionalEncodingConfig::new(8, 0)
            .init::<TestBackend>(&device)
            .is_err());
    }

    #[test]
    fn row_zero_alternates_sin_cos_of_zero() {
        let device = Default::default();
        let enc = PositionalEncodingConfig::new(6, 4)
            .init::<TestBackend>(&device)
            .unwrap();
        let table = enc.table().to_data();
        let table = table.as_slice::<f32>().unwrap();
        // Row 0: sin(0)=0 in even columns, cos(0)=1 in odd columns.
        assert_eq!(&table[0..6], &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn table_is_bounded() {
        let device = Default::default();
        let enc = PositionalEncodingConfig::new(8, 64)
            .init::<TestBackend>(&device)
            .unwrap();
        let table = enc.table().to_data();
        for v in table.as_slice::<f32>().unwrap() {
            assert!(*v >= -1.0 && *v <= 1.0, "table value {} out of [-1, 1]", v);
        }
    }
}
