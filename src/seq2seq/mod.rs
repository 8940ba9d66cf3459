//! Sequence-to-sequence model trained by teacher forcing or policy gradient.
mod decoder;
mod encoder;
mod loss;
mod padding;
mod reinforce;
mod sample;
mod tokens;
mod vocab;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use loss::{masked_cross_entropy, MaskedLoss};
pub use padding::trim_padding;
pub use reinforce::{SampleConfig, SampleTrace};
pub use tokens::{SpecialTokens, TokenError};
pub use vocab::{ExpandVocabError, PretrainedVectors, VocabExpansion};

use crate::logging::StatsLogger;
use crate::torch::modules::{LstmConfig, LstmState, Module};
use serde::{Deserialize, Serialize};
use tch::{Device, Tensor};
use thiserror::Error;

/// Configuration of a [`Seq2Seq`] model.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seq2SeqConfig {
    /// Number of tokens in the input vocabulary.
    pub encoder_vocab_size: usize,
    /// Number of tokens in the output vocabulary.
    pub decoder_vocab_size: usize,
    /// Width of the token embeddings.
    pub wordvec_dim: usize,
    /// Width of the recurrent state and of the encoded context vector.
    pub hidden_dim: usize,
    /// Number of stacked recurrent layers in both the encoder and the decoder.
    pub rnn_num_layers: usize,
    /// Dropout probability between recurrent layers.
    pub rnn_dropout: f64,
    pub tokens: SpecialTokens,
}

impl Default for Seq2SeqConfig {
    fn default() -> Self {
        Self {
            encoder_vocab_size: 100,
            decoder_vocab_size: 100,
            wordvec_dim: 300,
            hidden_dim: 256,
            rnn_num_layers: 2,
            rnn_dropout: 0.0,
            tokens: SpecialTokens::default(),
        }
    }
}

/// Error building a [`Seq2Seq`] model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildSeq2SeqError {
    #[error("{name} must be nonzero")]
    ZeroSize { name: &'static str },
    #[error("dropout probability {0} is not in [0, 1)")]
    InvalidDropout(f64),
    #[error("null, start and end tokens must be distinct: {0:?}")]
    DuplicateTokens(SpecialTokens),
    #[error("{name} token {token} is out of range for a vocabulary of size {size}")]
    TokenOutOfRange {
        name: &'static str,
        token: i64,
        size: usize,
    },
    #[error(transparent)]
    ExpandVocab(#[from] ExpandVocabError),
}

impl Seq2SeqConfig {
    /// Check that a model can be built from this configuration.
    ///
    /// # Errors
    /// If any size is zero, the dropout probability is invalid,
    /// or the reserved tokens are not distinct valid indices.
    pub fn validate(&self) -> Result<(), BuildSeq2SeqError> {
        for (name, size) in [
            ("encoder_vocab_size", self.encoder_vocab_size),
            ("decoder_vocab_size", self.decoder_vocab_size),
            ("wordvec_dim", self.wordvec_dim),
            ("hidden_dim", self.hidden_dim),
            ("rnn_num_layers", self.rnn_num_layers),
        ] {
            if size == 0 {
                return Err(BuildSeq2SeqError::ZeroSize { name });
            }
        }
        if !(0.0..1.0).contains(&self.rnn_dropout) {
            return Err(BuildSeq2SeqError::InvalidDropout(self.rnn_dropout));
        }
        if !self.tokens.are_distinct() {
            return Err(BuildSeq2SeqError::DuplicateTokens(self.tokens));
        }
        let SpecialTokens { null, start, end } = self.tokens;
        for (name, token, size) in [
            ("null", null, self.decoder_vocab_size),
            ("start", start, self.decoder_vocab_size),
            ("end", end, self.decoder_vocab_size),
            ("null", null, self.encoder_vocab_size),
        ] {
            if token < 0 || token as usize >= size {
                return Err(BuildSeq2SeqError::TokenOutOfRange { name, token, size });
            }
        }
        Ok(())
    }

    /// Build a model on the given device.
    ///
    /// # Errors
    /// If the configuration is invalid. See [`Seq2SeqConfig::validate`].
    pub fn build_module(&self, device: Device) -> Result<Seq2Seq, BuildSeq2SeqError> {
        Seq2Seq::new(self, device, None)
    }

    fn rnn_config(&self) -> LstmConfig {
        LstmConfig {
            num_layers: self.rnn_num_layers,
            dropout: self.rnn_dropout,
            ..LstmConfig::default()
        }
    }
}

/// Model dimensions.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dims {
    pub encoder_vocab_size: usize,
    pub decoder_vocab_size: usize,
    pub wordvec_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
}

/// Sequence-to-sequence model.
///
/// An LSTM encoder summarizes the input sequence into a context vector that conditions
/// every step of an LSTM decoder.
#[derive(Debug, PartialEq)]
pub struct Seq2Seq {
    encoder: Encoder,
    decoder: Decoder,
    tokens: SpecialTokens,
}

impl Seq2Seq {
    /// Default maximum length of greedily sampled sequences.
    pub const GREEDY_MAX_LENGTH: usize = 50;

    /// Build a model, optionally expanding the encoder vocabulary.
    ///
    /// # Errors
    /// If the configuration is invalid or the vocabulary expansion fails.
    pub fn new(
        config: &Seq2SeqConfig,
        device: Device,
        vocab_expansion: Option<&dyn VocabExpansion>,
    ) -> Result<Self, BuildSeq2SeqError> {
        config.validate()?;
        let rnn_config = config.rnn_config();
        let null = config.tokens.null;
        let mut model = Self {
            encoder: Encoder::new(
                config.encoder_vocab_size,
                config.wordvec_dim,
                config.hidden_dim,
                &rnn_config,
                null,
                device,
            ),
            decoder: Decoder::new(
                config.decoder_vocab_size,
                config.wordvec_dim,
                config.hidden_dim,
                &rnn_config,
                null,
                device,
            ),
            tokens: config.tokens,
        };
        if let Some(expansion) = vocab_expansion {
            model.expand_encoder_vocab(expansion)?;
        }
        Ok(model)
    }

    #[must_use]
    pub fn dims(&self) -> Dims {
        let embedding = self.encoder.embedding();
        Dims {
            encoder_vocab_size: embedding.num_embeddings(),
            decoder_vocab_size: self.decoder.vocab_size(),
            wordvec_dim: embedding.embedding_dim(),
            hidden_dim: self.encoder.rnn().hidden_size(),
            num_layers: self.encoder.rnn().num_layers(),
        }
    }

    #[must_use]
    pub const fn tokens(&self) -> SpecialTokens {
        self.tokens
    }

    #[must_use]
    pub const fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    #[must_use]
    pub const fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Grow the encoder embedding table.
    ///
    /// Optimizers built from the previous variables must be rebuilt.
    ///
    /// # Returns
    /// The new encoder vocabulary size.
    ///
    /// # Errors
    /// If the expansion is incompatible with the embedding table.
    pub fn expand_encoder_vocab(
        &mut self,
        expansion: &dyn VocabExpansion,
    ) -> Result<usize, ExpandVocabError> {
        expansion.expand(self.encoder.embedding_mut())
    }

    /// Encode a batch of input sequences; see [`Encoder::forward`].
    pub fn encode(&self, x: &Tensor, train: bool) -> Tensor {
        self.encoder.forward(x, train)
    }

    /// Decode a batch of target sequences; see [`Decoder::forward`].
    pub fn decode(
        &self,
        encoded: &Tensor,
        y: &Tensor,
        state: Option<&LstmState>,
        train: bool,
    ) -> (Tensor, LstmState) {
        self.decoder.forward(encoded, y, state, train)
    }

    /// Teacher-forced loss of decoder logits against targets; see [`masked_cross_entropy`].
    pub fn compute_loss(&self, logits: &Tensor, y: &Tensor) -> MaskedLoss {
        masked_cross_entropy(logits, y, self.tokens.null)
    }

    /// Teacher-forced training loss.
    ///
    /// # Args
    /// * `x` - Input sequences. An i64 tensor `[BATCH_SIZE, IN_SEQ_LEN]`.
    /// * `y` - Target sequences starting with the start token.
    ///     An i64 tensor `[BATCH_SIZE, OUT_SEQ_LEN]`.
    ///
    /// # Returns
    /// A scalar f32 loss tensor.
    pub fn forward(&self, x: &Tensor, y: &Tensor) -> Tensor {
        self.forward_logged(x, y, &mut ()).loss
    }

    /// Teacher-forced training loss with statistics logging.
    pub fn forward_logged(
        &self,
        x: &Tensor,
        y: &Tensor,
        logger: &mut dyn StatsLogger,
    ) -> MaskedLoss {
        let encoded = self.encode(x, true);
        let (logits, _) = self.decode(&encoded, y, None, true);
        let loss = self.compute_loss(&logits, y);
        if loss.num_tokens > 0 {
            logger.log_scalar("loss/cross_entropy", loss.loss.double_value(&[]));
        }
        logger.log_scalar("loss/num_tokens", loss.num_tokens as f64);
        loss
    }
}

impl Module for Seq2Seq {
    fn shallow_clone(&self) -> Self
    where
        Self: Sized,
    {
        Self {
            encoder: self.encoder.shallow_clone(),
            decoder: self.decoder.shallow_clone(),
            tokens: self.tokens,
        }
    }

    fn clone_to_device(&self, device: Device) -> Self
    where
        Self: Sized,
    {
        Self {
            encoder: self.encoder.clone_to_device(device),
            decoder: self.decoder.clone_to_device(device),
            tokens: self.tokens,
        }
    }

    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.encoder.variables().chain(self.decoder.variables()))
    }
}
