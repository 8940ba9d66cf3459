//! Embedding lookup table
use super::{BuildModule, FeedForwardModule, Module};
use crate::torch::initializers::{Initializer, VarianceScale};
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{Device, Tensor};

/// Configuration for the [`Embedding`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Initializer for the embedding table.
    pub init: Initializer,
}

/// Defaults to a standard normal table, matching `torch.nn.Embedding`.
impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            init: Initializer::Normal(VarianceScale::Constant(1.0)),
        }
    }
}

impl BuildModule for EmbeddingConfig {
    type Module = Embedding;

    /// `in_dim` is the number of embeddings and `out_dim` the embedding width.
    fn build_module(&self, in_dim: usize, out_dim: usize, device: Device) -> Self::Module {
        Embedding::new(in_dim, out_dim, device, self)
    }
}

/// Lookup table mapping integer indices to dense vectors.
#[derive(Debug, PartialEq)]
pub struct Embedding {
    /// `[num_embeddings, embedding_dim]`
    weight: Tensor,
}

impl Embedding {
    #[must_use]
    pub fn new(
        num_embeddings: usize,
        embedding_dim: usize,
        device: Device,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            weight: config
                .init
                .tensor(&[num_embeddings, embedding_dim])
                .device(device)
                .build(),
        }
    }

    /// Number of rows in the table.
    #[must_use]
    pub fn num_embeddings(&self) -> usize {
        self.weight.size()[0] as usize
    }

    /// Width of each embedding vector.
    #[must_use]
    pub fn embedding_dim(&self) -> usize {
        self.weight.size()[1] as usize
    }

    /// The embedding table; `[num_embeddings, embedding_dim]`.
    #[must_use]
    pub const fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Replace the table with one that has more rows.
    ///
    /// Optimizers built from the old variables keep referring to the old table
    /// and must be rebuilt.
    ///
    /// # Panics
    /// If `weight` is not a 2D tensor with `embedding_dim` columns
    /// and at least `num_embeddings` rows.
    pub fn replace_weight(&mut self, weight: Tensor) {
        let size = weight.size();
        assert_eq!(size.len(), 2, "embedding table must be 2D");
        assert_eq!(
            size[1] as usize,
            self.embedding_dim(),
            "embedding width mismatch"
        );
        assert!(
            size[0] as usize >= self.num_embeddings(),
            "embedding table cannot shrink"
        );
        self.weight = weight;
    }
}

impl Module for Embedding {
    fn shallow_clone(&self) -> Self
    where
        Self: Sized,
    {
        Self {
            weight: self.weight.shallow_clone(),
        }
    }

    fn clone_to_device(&self, device: Device) -> Self
    where
        Self: Sized,
    {
        Self {
            weight: self.weight.to_device(device),
        }
    }

    #[inline]
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(iter::once(&self.weight))
    }
}

impl FeedForwardModule for Embedding {
    /// Look up an i64 index tensor of any shape `[*B]`, producing `[*B, embedding_dim]`.
    #[inline]
    fn forward(&self, input: &Tensor) -> Tensor {
        Tensor::embedding(&self.weight, input, -1, false, false)
    }
}
