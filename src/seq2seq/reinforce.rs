//! Stochastic decoding and policy-gradient updates
use super::Seq2Seq;
use crate::logging::StatsLogger;
use crate::torch::distributions::Categorical;
use crate::torch::modules::LstmState;
use crate::torch::utils::{from_i64_rows, to_i64_vec};
use serde::{Deserialize, Serialize};
use tch::{IndexOp, Kind, Tensor};

/// Configuration of [`Seq2Seq::reinforce_sample`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Maximum number of decoding steps.
    pub max_length: usize,
    /// Logits are divided by this value before sampling.
    pub temperature: f64,
    /// Select the most likely token instead of sampling.
    pub argmax: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            max_length: 30,
            temperature: 1.0,
            argmax: false,
        }
    }
}

/// The tokens selected at one decoding step and the distribution they were selected from.
#[derive(Debug)]
struct SampleStep {
    /// `[BATCH_SIZE]`
    tokens: Tensor,
    distribution: Categorical,
}

/// Sampled output sequences along with the record needed to reinforce them.
///
/// Produced by [`Seq2Seq::reinforce_sample`] and consumed by
/// [`SampleTrace::reinforce_backward`]. The distributions are attached to the model's
/// computation graph so the policy gradient reuses the forward pass of sampling.
#[derive(Debug)]
pub struct SampleTrace {
    /// `[BATCH_SIZE, MAX_LENGTH]`
    outputs: Tensor,
    steps: Vec<SampleStep>,
}

/// Output rows that stop changing once they contain the end token.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputBuffer {
    rows: Vec<Vec<i64>>,
    /// Number of tokens written to each row
    lengths: Vec<usize>,
    done: Vec<bool>,
    end: i64,
}

impl OutputBuffer {
    fn new(batch_size: usize, max_length: usize, null: i64, end: i64) -> Self {
        Self {
            rows: vec![vec![null; max_length]; batch_size],
            lengths: vec![0; batch_size],
            done: vec![false; batch_size],
            end,
        }
    }

    /// Write the tokens of step `t` into the rows that have not yet ended.
    ///
    /// Returns the tokens that were written.
    fn record(&mut self, t: usize, tokens: &[i64]) -> Vec<i64> {
        let mut written = Vec::new();
        for (n, &token) in tokens.iter().enumerate() {
            if self.done[n] {
                continue;
            }
            self.rows[n][t] = token;
            self.lengths[n] += 1;
            self.done[n] = token == self.end;
            written.push(token);
        }
        written
    }

    fn all_done(&self) -> bool {
        self.done.iter().all(|&d| d)
    }

    fn mean_length(&self) -> Option<f64> {
        if self.lengths.is_empty() {
            return None;
        }
        Some(self.lengths.iter().sum::<usize>() as f64 / self.lengths.len() as f64)
    }
}

impl Seq2Seq {
    /// Sample a batch of output sequences for policy-gradient training.
    ///
    /// All examples are decoded in lockstep. Each step samples (or takes the most likely)
    /// next token of every example and feeds it back as the next input. An example's output
    /// is frozen once it produces the end token but its recurrent state keeps advancing
    /// until every example has ended or `max_length` steps have run.
    ///
    /// # Args
    /// * `x` - Input sequences. An i64 tensor `[BATCH_SIZE, SEQ_LEN]`.
    /// * `config` - Sampling configuration.
    /// * `logger` - Logs sampled lengths, tokens, and policy entropy.
    ///
    /// # Returns
    /// The trace of the sample. Unwritten output positions hold the null token.
    pub fn reinforce_sample(
        &self,
        x: &Tensor,
        config: &SampleConfig,
        logger: &mut dyn StatsLogger,
    ) -> SampleTrace {
        let batch_size = x.size()[0];
        let device = x.device();
        let vocab_size = self.decoder.vocab_size();
        let encoded = self.encode(x, true);

        let mut buffer = OutputBuffer::new(
            batch_size as usize,
            config.max_length,
            self.tokens.null,
            self.tokens.end,
        );
        let mut input = Tensor::full(&[batch_size, 1], self.tokens.start, (Kind::Int64, device));
        let mut state: Option<LstmState> = None;
        let mut steps = Vec::with_capacity(config.max_length);
        for t in 0..config.max_length {
            let (logits, next_state) = self.decode(&encoded, &input, state.as_ref(), true);
            state = Some(next_state);

            let distribution = Categorical::new(&(logits.squeeze_dim(1) / config.temperature));
            let tokens = if config.argmax {
                distribution.mode()
            } else {
                distribution.sample()
            };

            let written = buffer.record(t, &to_i64_vec(&tokens));
            for token in written {
                logger.log_index("sample/token", token as usize, vocab_size);
            }
            logger.log_scalar(
                "sample/entropy",
                distribution.entropy().mean(Kind::Float).double_value(&[]),
            );

            input = tokens.unsqueeze(1);
            steps.push(SampleStep {
                tokens,
                distribution,
            });
            if buffer.all_done() {
                break;
            }
        }

        if let Some(mean_length) = buffer.mean_length() {
            logger.log_scalar("sample/length", mean_length);
        }
        logger.log_counter_increment("sample/count", batch_size as u64);

        SampleTrace {
            outputs: from_i64_rows(&buffer.rows, device),
            steps,
        }
    }
}

impl SampleTrace {
    /// Number of decoding steps that were run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sampled sequences; an i64 tensor `[BATCH_SIZE, MAX_LENGTH]`.
    ///
    /// Positions after an example's end token, or after the last step, hold the null token.
    #[must_use]
    pub const fn outputs(&self) -> &Tensor {
        &self.outputs
    }

    /// Tokens selected at every step, including those after an example ended.
    ///
    /// An i64 tensor `[BATCH_SIZE, NUM_STEPS]`.
    #[must_use]
    pub fn tokens(&self) -> Tensor {
        if self.steps.is_empty() {
            return self.outputs.i((.., ..0));
        }
        let tokens: Vec<_> = self.steps.iter().map(|step| &step.tokens).collect();
        Tensor::stack(&tokens, 1)
    }

    /// Token distributions of every step; an f32 tensor `[BATCH_SIZE, NUM_STEPS, VOCAB_SIZE]`.
    ///
    /// # Panics
    /// If no steps were run.
    #[must_use]
    pub fn probs(&self) -> Tensor {
        assert!(!self.steps.is_empty(), "sample trace has no steps");
        let probs: Vec<_> = self
            .steps
            .iter()
            .map(|step| step.distribution.probs())
            .collect();
        Tensor::stack(&probs, 1)
    }

    /// Backpropagate the REINFORCE policy gradient of the sampled tokens.
    ///
    /// Computes and backpropagates the surrogate loss
    /// `-sum_{n,t} mask[n, t] * reward[n] * log p(tokens[n, t])`
    /// through every recorded step at once, accumulating gradients in the model variables.
    ///
    /// # Args
    /// * `reward` - Reward of each example. An f32 tensor broadcastable to `[BATCH_SIZE]`.
    /// * `output_mask` - Optional weight of each step. An f32 tensor `[BATCH_SIZE, T]` with
    ///     `T` at least the number of steps run; only the first `self.len()` columns are used.
    /// * `logger` - Logs the surrogate loss and the mean reward.
    ///
    /// # Returns
    /// The value of the surrogate loss.
    pub fn reinforce_backward(
        self,
        reward: &Tensor,
        output_mask: Option<&Tensor>,
        logger: &mut dyn StatsLogger,
    ) -> f64 {
        let batch_size = self.outputs.size()[0];
        let device = self.outputs.device();
        let reward = reward
            .to_device(device)
            .to_kind(Kind::Float)
            .detach()
            .expand(&[batch_size], false);
        logger.log_scalar("reinforce/reward", reward.mean(Kind::Float).double_value(&[]));
        if self.steps.is_empty() {
            return 0.0;
        }

        let log_probs: Vec<_> = self
            .steps
            .iter()
            .map(|step| step.distribution.log_probs(&step.tokens))
            .collect();
        let log_probs = Tensor::stack(&log_probs, 1);

        let mut weights = reward.unsqueeze(1);
        if let Some(mask) = output_mask {
            let num_steps = self.steps.len() as i64;
            weights = weights
                * mask
                    .to_device(device)
                    .to_kind(Kind::Float)
                    .detach()
                    .i((.., ..num_steps));
        }

        let loss = -(log_probs * weights).sum(Kind::Float);
        loss.backward();
        let loss = loss.double_value(&[]);
        logger.log_scalar("reinforce/policy_loss", loss);
        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SampleConfig::default();
        assert_eq!(config.max_length, 30);
        assert!((config.temperature - 1.0).abs() < f64::EPSILON);
        assert!(!config.argmax);
    }

    #[test]
    fn deserialize_partial_config() {
        let config: SampleConfig = serde_json::from_str(r#"{"argmax": true}"#).unwrap();
        assert_eq!(
            config,
            SampleConfig {
                argmax: true,
                ..SampleConfig::default()
            }
        );
    }

    #[test]
    fn buffer_freezes_after_end() {
        let mut buffer = OutputBuffer::new(2, 4, 0, 2);
        assert_eq!(buffer.record(0, &[5, 2]), vec![5, 2]);
        assert_eq!(buffer.record(1, &[2, 7]), vec![2]);
        assert!(buffer.all_done());
        assert_eq!(buffer.rows, vec![vec![5, 2, 0, 0], vec![2, 0, 0, 0]]);
        assert_eq!(buffer.mean_length(), Some(1.5));
    }

    #[test]
    fn buffer_writes_unfinished_rows() {
        let mut buffer = OutputBuffer::new(1, 3, 0, 2);
        buffer.record(0, &[4]);
        buffer.record(1, &[0]);
        buffer.record(2, &[6]);
        assert!(!buffer.all_done());
        assert_eq!(buffer.rows, vec![vec![4, 0, 6]]);
    }

    #[test]
    fn empty_buffer() {
        let buffer = OutputBuffer::new(0, 3, 0, 2);
        assert!(buffer.all_done());
        assert_eq!(buffer.mean_length(), None);
    }
}
