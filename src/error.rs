//! Error type
use crate::seq2seq::{BuildSeq2SeqError, ExpandVocabError, TokenError};
use thiserror::Error;

/// Error from the progseq crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Seq2SeqError {
    #[error("error building sequence-to-sequence model")]
    Build(#[from] BuildSeq2SeqError),
    #[error("malformed token sequence")]
    Token(#[from] TokenError),
    #[error("error expanding vocabulary")]
    ExpandVocab(#[from] ExpandVocabError),
}
