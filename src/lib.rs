//! Sequence-to-sequence program generation.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)] // part of warn(clippy::all), specifically style?
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
mod error;
pub mod logging;
pub mod seq2seq;
pub mod torch;
pub mod utils;

pub use error::Seq2SeqError;
pub use seq2seq::{SampleConfig, SampleTrace, Seq2Seq, Seq2SeqConfig, SpecialTokens};
