//! Reserved vocabulary tokens
use crate::torch::utils::to_i64_rows;
use serde::{Deserialize, Serialize};
use tch::Tensor;
use thiserror::Error;

/// Reserved token indices shared by the encoder and decoder vocabularies.
///
/// Well-formed sequences are right-padded with `null`: all `null` tokens form a contiguous
/// suffix. Decoder targets begin with `start`; generated sequences stop at `end`.
/// The model relies on these conventions but only checks them in
/// [`SpecialTokens::check_sequences`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialTokens {
    /// Padding token. Never a content token.
    pub null: i64,
    /// Sequence-begin token. Primes decoding.
    pub start: i64,
    /// Sequence-end token. Stops decoding.
    pub end: i64,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            null: 0,
            start: 1,
            end: 2,
        }
    }
}

/// A malformed token sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenError {
    #[error("sequence {row} has a content token at position {position} after padding")]
    EmbeddedPadding { row: usize, position: usize },
    #[error("sequence {row} has token {token} at position {position}; vocabulary size is {size}")]
    OutOfVocabulary {
        row: usize,
        position: usize,
        token: i64,
        size: usize,
    },
    #[error("expected a 2D batch of sequences, got shape {0:?}")]
    InvalidShape(Vec<i64>),
}

impl SpecialTokens {
    /// Whether all three reserved tokens are distinct.
    #[must_use]
    pub const fn are_distinct(&self) -> bool {
        self.null != self.start && self.null != self.end && self.start != self.end
    }

    /// Check that a batch of sequences is well formed.
    ///
    /// # Args
    /// * `sequences` - An i64 tensor `[BATCH_SIZE, SEQ_LEN]`.
    /// * `vocab_size` - Size of the vocabulary the tokens index into.
    ///
    /// # Errors
    /// If any token is outside `0..vocab_size` or any content token follows a `null`.
    pub fn check_sequences(&self, sequences: &Tensor, vocab_size: usize) -> Result<(), TokenError> {
        if sequences.dim() != 2 {
            return Err(TokenError::InvalidShape(sequences.size()));
        }
        for (row, tokens) in to_i64_rows(sequences).into_iter().enumerate() {
            let mut padded = false;
            for (position, token) in tokens.into_iter().enumerate() {
                if token < 0 || token as usize >= vocab_size {
                    return Err(TokenError::OutOfVocabulary {
                        row,
                        position,
                        token,
                        size: vocab_size,
                    });
                }
                if token == self.null {
                    padded = true;
                } else if padded {
                    return Err(TokenError::EmbeddedPadding { row, position });
                }
            }
        }
        Ok(())
    }
}
