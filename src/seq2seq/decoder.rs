//! Sequence decoder
use super::padding::trim_padding;
use crate::torch::modules::{
    Embedding, EmbeddingConfig, FeedForwardModule, Linear, LinearConfig, Lstm, LstmConfig,
    LstmState, Module,
};
use tch::{Device, Tensor};

/// Decodes target tokens conditioned on an encoded context vector.
///
/// Each step consumes the embedding of the previous target token concatenated with the
/// context vector and predicts logits over the output vocabulary.
/// Recurrent state is returned to the caller so decoding can proceed one step at a time.
#[derive(Debug, PartialEq)]
pub struct Decoder {
    embed: Embedding,
    rnn: Lstm,
    linear: Linear,
    null: i64,
}

impl Decoder {
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
            rnn: Lstm::new(wordvec_dim + hidden_dim, hidden_dim, device, rnn_config),
            linear: Linear::new(hidden_dim, vocab_size, device, &LinearConfig::default()),
            null,
        }
    }

    /// Decode a batch of target sequences.
    ///
    /// # Args
    /// * `encoded` - Context vectors. An f32 tensor `[BATCH_SIZE, HIDDEN_DIM]`.
    /// * `y` - Decoder input tokens. An i64 tensor `[BATCH_SIZE, SEQ_LEN]` with `SEQ_LEN >= 1`.
    ///     Padding is replaced before the embedding lookup when `SEQ_LEN > 1`.
    /// * `state` - Recurrent state carried from a previous call.
    ///     A zero state is used if `None`.
    /// * `train` - Whether the recurrent network applies dropout.
    ///
    /// # Returns
    /// * Logits over the output vocabulary. An f32 tensor `[BATCH_SIZE, SEQ_LEN, VOCAB_SIZE]`.
    /// * Recurrent state after the final step.
    pub fn forward(
        &self,
        encoded: &Tensor,
        y: &Tensor,
        state: Option<&LstmState>,
        train: bool,
    ) -> (Tensor, LstmState) {
        let size = y.size();
        let (batch_size, seq_len) = (size[0], size[1]);
        let y = if seq_len > 1 {
            trim_padding(y, self.null, 0).0
        } else {
            y.shallow_clone()
        };

        let y_embed = self.embed.forward(&y);
        let hidden_dim = self.rnn.hidden_size() as i64;
        let context = encoded
            .unsqueeze(1)
            .expand(&[batch_size, seq_len, hidden_dim], false);
        let rnn_input = Tensor::cat(&[context, y_embed], 2);

        let (output, state) = match state {
            Some(state) => self.rnn.seq_init(&rnn_input, state, train),
            None => self.rnn.seq(&rnn_input, train),
        };
        (self.linear.forward(&output), state)
    }

    /// Size of the output vocabulary.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.linear.out_dim()
    }

    #[must_use]
    pub const fn rnn(&self) -> &Lstm {
        &self.rnn
    }
}

impl Module for Decoder {
    fn shallow_clone(&self) -> Self
    where
        Self: Sized,
    {
        Self {
            embed: self.embed.shallow_clone(),
            rnn: self.rnn.shallow_clone(),
            linear: self.linear.shallow_clone(),
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
            linear: self.linear.clone_to_device(device),
            null: self.null,
        }
    }

    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(
            self.embed
                .variables()
                .chain(self.rnn.variables())
                .chain(self.linear.variables()),
        )
    }
}
