//! Right-padded sequence handling
use crate::torch::utils::to_i64_rows;
use tch::Tensor;

/// Locate the last content token of each sequence and replace padding before embedding.
///
/// The last content position of a sequence is the first `t` in `0..SEQ_LEN - 1` such that
/// `t` is not `null` and `t + 1` is `null`. Sequences without such a transition
/// (full-length sequences, or all-`null` sequences) get index `SEQ_LEN - 1`.
/// An all-`null` sequence therefore pools a padding position.
///
/// # Args
/// * `sequences` - Right-padded token indices. An i64 tensor `[BATCH_SIZE, SEQ_LEN]`.
/// * `null` - The padding token.
/// * `replace` - The value substituted for each `null` token.
///
/// # Returns
/// * `sequences` with every `null` replaced by `replace`; `[BATCH_SIZE, SEQ_LEN]`.
/// * Index of the last content position of each sequence. An i64 tensor `[BATCH_SIZE]`.
pub fn trim_padding(sequences: &Tensor, null: i64, replace: i64) -> (Tensor, Tensor) {
    let rows = to_i64_rows(sequences);
    let last_index: Vec<i64> = rows
        .iter()
        .map(|tokens| {
            tokens
                .windows(2)
                .position(|pair| pair[0] != null && pair[1] == null)
                .unwrap_or_else(|| tokens.len().saturating_sub(1)) as i64
        })
        .collect();

    let trimmed = sequences.masked_fill(&sequences.eq(null), replace);
    let last_index = Tensor::of_slice(&last_index).to_device(sequences.device());
    (trimmed, last_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::utils::{from_i64_rows, to_i64_rows, to_i64_vec};
    use rstest::rstest;
    use tch::Device;

    #[rstest]
    #[case::one_token(1)]
    #[case::two_tokens(2)]
    #[case::three_tokens(3)]
    #[case::four_tokens(4)]
    fn prefix_then_padding(#[case] k: usize) {
        let width = 6;
        let row: Vec<i64> = (0..width)
            .map(|t| if t < k { 3 + t as i64 } else { 0 })
            .collect();
        let x = from_i64_rows(&[row], Device::Cpu);
        let (trimmed, idx) = trim_padding(&x, 0, 9);
        assert_eq!(to_i64_vec(&idx), vec![k as i64 - 1]);
        let trimmed = &to_i64_rows(&trimmed)[0];
        assert!(trimmed[..k].iter().all(|&t| t != 9));
        assert!(trimmed[k..].iter().all(|&t| t == 9));
    }

    #[test]
    fn full_length_sequence() {
        let x = from_i64_rows(&[[3, 4, 5, 6]], Device::Cpu);
        let (trimmed, idx) = trim_padding(&x, 0, 0);
        assert_eq!(to_i64_vec(&idx), vec![3]);
        assert_eq!(trimmed, x);
    }

    #[test]
    fn all_null_sequence_falls_back_to_last_position() {
        let x = from_i64_rows(&[[0, 0, 0]], Device::Cpu);
        let (_, idx) = trim_padding(&x, 0, 0);
        assert_eq!(to_i64_vec(&idx), vec![2]);
    }

    #[test]
    fn batch_of_mixed_lengths() {
        let x = from_i64_rows(&[[1, 3, 2, 0, 0], [1, 4, 5, 6, 2], [1, 2, 0, 0, 0]], Device::Cpu);
        let (_, idx) = trim_padding(&x, 0, 0);
        assert_eq!(to_i64_vec(&idx), vec![2, 4, 1]);
    }

    #[test]
    fn nonzero_null_token() {
        let x = from_i64_rows(&[[3, 4, 7, 7]], Device::Cpu);
        let (trimmed, idx) = trim_padding(&x, 7, 0);
        assert_eq!(to_i64_vec(&idx), vec![1]);
        assert_eq!(to_i64_rows(&trimmed), vec![vec![3, 4, 0, 0]]);
    }

    #[test]
    fn first_transition_wins() {
        // Malformed: padding embedded before content
        let x = from_i64_rows(&[[3, 0, 4, 0]], Device::Cpu);
        let (_, idx) = trim_padding(&x, 0, 0);
        assert_eq!(to_i64_vec(&idx), vec![0]);
    }

    #[test]
    fn input_not_modified() {
        let x = from_i64_rows(&[[3, 0]], Device::Cpu);
        let _ = trim_padding(&x, 0, 5);
        assert_eq!(to_i64_rows(&x), vec![vec![3, 0]]);
    }
}
