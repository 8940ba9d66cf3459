//! Greedy decoding
use super::Seq2Seq;
use crate::torch::distributions::Categorical;
use tch::{Kind, Tensor};

impl Seq2Seq {
    /// Greedily decode a single input sequence.
    ///
    /// Decoding starts from the start token and repeatedly feeds back the most likely next
    /// token until the end token is produced or the sequence reaches `max_length` tokens.
    /// At least one token is decoded after the start token.
    ///
    /// # Args
    /// * `x` - Input sequence. An i64 tensor `[1, SEQ_LEN]`.
    /// * `max_length` - Maximum length of the output, including the start token.
    ///
    /// # Returns
    /// The decoded tokens beginning with the start token.
    ///
    /// # Panics
    /// If the batch size of `x` is not 1.
    pub fn sample(&self, x: &Tensor, max_length: usize) -> Vec<i64> {
        assert_eq!(x.size()[0], 1, "greedy sampling requires a batch size of 1");
        let _no_grad = tch::no_grad_guard();
        let device = x.device();
        let encoded = self.encode(x, false);

        let mut output = vec![self.tokens.start];
        let mut state = None;
        loop {
            let last = *output.last().unwrap_or(&self.tokens.start);
            let input = Tensor::full(&[1, 1], last, (Kind::Int64, device));
            let (logits, next_state) = self.decode(&encoded, &input, state.as_ref(), false);
            state = Some(next_state);

            let next = Categorical::new(&logits).mode().int64_value(&[0, 0]);
            output.push(next);
            if output.len() >= max_length || next == self.tokens.end {
                break;
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::super::Seq2SeqConfig;
    use super::*;
    use crate::torch::utils::from_i64_rows;
    use rstest::{fixture, rstest};
    use tch::Device;

    #[fixture]
    fn model() -> Seq2Seq {
        let config = Seq2SeqConfig {
            encoder_vocab_size: 10,
            decoder_vocab_size: 10,
            wordvec_dim: 6,
            hidden_dim: 8,
            ..Seq2SeqConfig::default()
        };
        config.build_module(Device::Cpu).unwrap()
    }

    #[rstest]
    #[case::short(2)]
    #[case::medium(5)]
    #[case::long(Seq2Seq::GREEDY_MAX_LENGTH)]
    fn length_bounded(model: Seq2Seq, #[case] max_length: usize) {
        let x = from_i64_rows(&[[3, 4, 0, 0]], Device::Cpu);
        let output = model.sample(&x, max_length);
        assert_eq!(output[0], 1);
        assert!(output.len() >= 2);
        assert!(output.len() <= max_length);
        let ends = output.last() == Some(&2);
        assert!(ends || output.len() == max_length);
    }

    #[rstest]
    fn end_token_only_at_end(model: Seq2Seq) {
        let x = from_i64_rows(&[[5, 6, 7, 0]], Device::Cpu);
        let output = model.sample(&x, 20);
        assert!(!output[..output.len() - 1].contains(&2));
    }

    #[rstest]
    fn deterministic(model: Seq2Seq) {
        let x = from_i64_rows(&[[3, 4, 0, 0]], Device::Cpu);
        assert_eq!(model.sample(&x, 10), model.sample(&x, 10));
    }

    #[rstest]
    #[should_panic(expected = "batch size of 1")]
    fn rejects_batches(model: Seq2Seq) {
        let x = from_i64_rows(&[[3, 4], [5, 6]], Device::Cpu);
        let _ = model.sample(&x, 5);
    }
}
