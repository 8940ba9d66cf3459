//! Growing the encoder vocabulary
use crate::torch::modules::Embedding;
use std::collections::HashMap;
use tch::{IndexOp, Tensor};
use thiserror::Error;

/// Grows an embedding table to cover additional tokens.
pub trait VocabExpansion {
    /// Expand `embedding` in place.
    ///
    /// Existing rows must be preserved.
    ///
    /// # Returns
    /// The number of rows after expansion.
    fn expand(&self, embedding: &mut Embedding) -> Result<usize, ExpandVocabError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpandVocabError {
    #[error("vector for token {token:?} has width {actual}; embedding width is {expected}")]
    DimensionMismatch {
        token: String,
        expected: usize,
        actual: usize,
    },
}

/// Vocabulary expansion from a token-index mapping and optional pretrained word vectors.
///
/// The table grows to cover the largest index in `token_to_idx`.
/// New rows are drawn from `N(0, std^2)` except rows of tokens that have a pretrained
/// vector, which are set to that vector. Rows that already existed are never overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct PretrainedVectors {
    pub token_to_idx: HashMap<String, usize>,
    pub vectors: HashMap<String, Vec<f32>>,
    pub std: f64,
}

impl PretrainedVectors {
    #[must_use]
    pub fn new(token_to_idx: HashMap<String, usize>) -> Self {
        Self {
            token_to_idx,
            vectors: HashMap::new(),
            std: 0.01,
        }
    }

    #[must_use]
    pub fn with_vectors(mut self, vectors: HashMap<String, Vec<f32>>) -> Self {
        self.vectors = vectors;
        self
    }

    #[must_use]
    pub fn with_std(mut self, std: f64) -> Self {
        self.std = std;
        self
    }

    /// Pretrained vectors for tokens whose row is created by the expansion.
    fn new_vectors(&self, old_size: usize) -> impl Iterator<Item = (&str, usize, &[f32])> {
        self.token_to_idx
            .iter()
            .filter(move |&(_, &idx)| idx >= old_size)
            .filter_map(move |(token, &idx)| {
                self.vectors
                    .get(token)
                    .map(|vector| (token.as_str(), idx, vector.as_slice()))
            })
    }
}

impl VocabExpansion for PretrainedVectors {
    fn expand(&self, embedding: &mut Embedding) -> Result<usize, ExpandVocabError> {
        let old_size = embedding.num_embeddings();
        let dim = embedding.embedding_dim();
        let new_size = self
            .token_to_idx
            .values()
            .map(|&idx| idx + 1)
            .fold(old_size, usize::max);
        if new_size == old_size {
            return Ok(old_size);
        }
        let mismatch = self.new_vectors(old_size).find(|(_, _, v)| v.len() != dim);
        if let Some((token, _, vector)) = mismatch {
            return Err(ExpandVocabError::DimensionMismatch {
                token: token.to_owned(),
                expected: dim,
                actual: vector.len(),
            });
        }

        let old_weight = embedding.weight();
        let requires_grad = old_weight.requires_grad();
        let options = (old_weight.kind(), old_weight.device());
        let weight = {
            let _no_grad = tch::no_grad_guard();
            let new_rows =
                Tensor::randn(&[(new_size - old_size) as i64, dim as i64], options) * self.std;
            let weight = Tensor::cat(&[&old_weight.detach(), &new_rows], 0);
            for (_, idx, vector) in self.new_vectors(old_size) {
                let mut row = weight.i(idx as i64);
                row.copy_(&Tensor::of_slice(vector).to_kind(options.0).to_device(options.1));
            }
            weight
        };
        embedding.replace_weight(weight.set_requires_grad(requires_grad));
        Ok(new_size)
    }
}
