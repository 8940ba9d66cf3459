//! Teacher-forced sequence loss
use tch::{IndexOp, Kind, Tensor};

/// Cross-entropy over the non-padding target positions of a batch.
#[derive(Debug)]
pub struct MaskedLoss {
    /// Mean cross-entropy of the selected positions. A scalar f32 tensor.
    ///
    /// Zero, but still attached to the logits graph, if no positions are selected.
    pub loss: Tensor,
    /// Number of target tokens that contributed to `loss`.
    pub num_tokens: i64,
}

/// Cross-entropy of decoder logits against right-shifted targets, ignoring padding.
///
/// `targets[:, 0]` is the start marker and is never predicted.
/// For `t >= 1`, `logits[:, t - 1]` predicts `targets[:, t]` wherever `targets[:, t]` is not
/// `null`. Padding positions contribute neither loss nor gradient.
///
/// # Args
/// * `logits` - Decoder outputs. An f32 tensor `[BATCH_SIZE, SEQ_LEN, VOCAB_SIZE]`.
/// * `targets` - Untrimmed decoder targets. An i64 tensor `[BATCH_SIZE, SEQ_LEN]`.
/// * `null` - The padding token.
pub fn masked_cross_entropy(logits: &Tensor, targets: &Tensor, null: i64) -> MaskedLoss {
    let batch_size = targets.size()[0];
    let vocab_size = logits.size()[2];
    let device = targets.device();

    let content = targets.ne(null).i((.., 1..));
    let boundary = Tensor::zeros(&[batch_size, 1], (Kind::Bool, device));
    let target_mask = Tensor::cat(&[&boundary, &content], 1);
    let output_mask = Tensor::cat(&[&content, &boundary], 1);

    let num_tokens = target_mask.sum(Kind::Int64).int64_value(&[]);
    if num_tokens == 0 {
        return MaskedLoss {
            loss: logits.sum(Kind::Float) * 0.0,
            num_tokens,
        };
    }

    let selected_targets = targets.masked_select(&target_mask);
    let selected_logits = logits
        .masked_select(&output_mask.unsqueeze(-1))
        .reshape(&[-1, vocab_size]);
    MaskedLoss {
        loss: selected_logits.cross_entropy_for_logits(&selected_targets),
        num_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::utils::from_i64_rows;
    use rstest::rstest;
    use tch::Device;

    fn logits(batch_size: i64, seq_len: i64) -> Tensor {
        Tensor::randn(&[batch_size, seq_len, 10], (Kind::Float, Device::Cpu))
            .set_requires_grad(true)
    }

    #[test]
    fn matches_shifted_cross_entropy() {
        let logits = logits(1, 5);
        let targets = from_i64_rows(&[[1, 5, 6, 2, 0]], Device::Cpu);
        let MaskedLoss { loss, num_tokens } = masked_cross_entropy(&logits, &targets, 0);
        assert_eq!(num_tokens, 3);

        let expected = logits
            .i((0, 0..3, ..))
            .cross_entropy_for_logits(&Tensor::of_slice(&[5_i64, 6, 2]));
        assert!(loss.allclose(&expected, 1e-5, 1e-6, false));
    }

    #[test]
    fn padding_has_zero_gradient() {
        let logits = logits(2, 5);
        let targets = from_i64_rows(&[[1, 5, 6, 2, 0], [1, 3, 2, 0, 0]], Device::Cpu);
        masked_cross_entropy(&logits, &targets, 0).loss.backward();
        let grad = logits.grad();

        assert_eq!(f64::from(grad.i((0, 3.., ..)).abs().sum(Kind::Float)), 0.0);
        assert_eq!(f64::from(grad.i((1, 2.., ..)).abs().sum(Kind::Float)), 0.0);
        assert!(f64::from(grad.i((0, 0..3, ..)).abs().sum(Kind::Float)) > 0.0);
        assert!(f64::from(grad.i((1, 0..2, ..)).abs().sum(Kind::Float)) > 0.0);
    }

    #[rstest]
    #[case::start_only(&[1])]
    #[case::start_then_padding(&[1, 0, 0])]
    fn degenerate_batch(#[case] row: &[i64]) {
        let logits = logits(1, row.len() as i64);
        let targets = from_i64_rows(&[row], Device::Cpu);
        let MaskedLoss { loss, num_tokens } = masked_cross_entropy(&logits, &targets, 0);
        assert_eq!(num_tokens, 0);
        assert_eq!(f64::from(&loss), 0.0);

        loss.backward();
        let grad = logits.grad();
        assert!(!bool::from(grad.isnan().any()));
        assert_eq!(f64::from(grad.abs().sum(Kind::Float)), 0.0);
    }

    #[test]
    fn degenerate_row_does_not_affect_others() {
        let logits = logits(2, 3);
        let targets = from_i64_rows(&[[1, 4, 2], [1, 0, 0]], Device::Cpu);
        let MaskedLoss { loss, num_tokens } = masked_cross_entropy(&logits, &targets, 0);
        assert_eq!(num_tokens, 2);

        let expected = logits
            .i((0, 0..2, ..))
            .cross_entropy_for_logits(&Tensor::of_slice(&[4_i64, 2]));
        assert!(loss.allclose(&expected, 1e-5, 1e-6, false));
    }

    #[test]
    fn nonzero_null_token() {
        let logits = logits(1, 4);
        let targets = from_i64_rows(&[[1, 5, 9, 9]], Device::Cpu);
        assert_eq!(masked_cross_entropy(&logits, &targets, 9).num_tokens, 1);
    }
}
