//! Sequence encoder
use super::padding::trim_padding;
use crate::torch::modules::{
    Embedding, EmbeddingConfig, FeedForwardModule, Lstm, LstmConfig, Module,
};
use tch::{Device, Tensor};

/// Encodes a batch of right-padded token sequences into one vector per sequence.
///
/// The vector is the output of the final recurrent layer at the last content position of
/// each sequence so it depends only on the non-padding prefix.
#[derive(Debug, PartialEq)]
pub struct Encoder {
    embed: Embedding,
    rnn: Lstm,
    null: i64,
}

impl Encoder {
    #[must_use]
    pub fn new(
        vocab_size: usize,
        wordvec_dim: usize,
        hidden_dim: usize,
        rnn_config: &LstmConfig,
        null: i64,
        device: Device,
    ) -> Self {
        Self {
            embed: Embedding::new(vocab_size, wordvec_dim, device, &EmbeddingConfig::default()),
            rnn: Lstm::new(wordvec_dim, hidden_dim, device, rnn_config),
            null,
        }
    }

    /// Encode a batch of sequences.
    ///
    /// # Args
    /// * `x` - Input token indices. An i64 tensor `[BATCH_SIZE, SEQ_LEN]`.
    /// * `train` - Whether the recurrent network applies dropout.
    ///
    /// # Returns
    /// An f32 tensor `[BATCH_SIZE, HIDDEN_DIM]`.
    pub fn forward(&self, x: &Tensor, train: bool) -> Tensor {
        let (x, last_index) = trim_padding(x, self.null, 0);
        let batch_size = x.size()[0];
        let hidden_dim = self.rnn.hidden_size() as i64;

        let embedded = self.embed.forward(&x);
        let (output, _) = self.rnn.seq(&embedded, train);

        let gather_index = last_index
            .reshape(&[batch_size, 1, 1])
            .expand(&[batch_size, 1, hidden_dim], false);
        output
            .gather(1, &gather_index, false)
            .reshape(&[batch_size, hidden_dim])
    }

    #[must_use]
    pub const fn embedding(&self) -> &Embedding {
        &self.embed
    }

    pub fn embedding_mut(&mut self) -> &mut Embedding {
        &mut self.embed
    }

    #[must_use]
    pub const fn rnn(&self) -> &Lstm {
        &self.rnn
    }
}

impl Module for Encoder {
    fn shallow_clone(&self) -> Self
    where
        Self: Sized,
    {
        Self {
            embed: self.embed.shallow_clone(),
            rnn: self.rnn.shallow_clone(),
            null: self.null,
        }
    }

    fn clone_to_device(&self, device: Device) -> Self
    where
        Self: Sized,
    {
        Self {
            embed: self.embed.clone_to_device(device),
            rnn: self.rnn.clone_to_device(device),
            null: self.null,
        }
    }

    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.embed.variables().chain(self.rnn.variables()))
    }
}
