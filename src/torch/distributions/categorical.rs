//! Categorical distribution
use tch::{Kind, Tensor};

/// Categorical distribution(s).
#[derive(Debug)]
pub struct Categorical {
    /// Normalized log probability of each event.
    ///
    /// An f32 tensor of shape `[BATCH_SHAPE.., NUM_EVENTS]`.
    log_probs: Tensor,
}

impl Categorical {
    /// Initialize from possibly unnormalized log probabilities (logits).
    ///
    /// The log probabilities are normalized by adding some value `C` to each
    /// such that `sum_i exp(logits[i] + C) = 1`.
    #[must_use]
    pub fn new(logits: &Tensor) -> Self {
        Self {
            log_probs: logits.log_softmax(-1, Kind::Float),
        }
    }

    /// Number of events in each distribution.
    #[must_use]
    pub fn num_events(&self) -> i64 {
        *self
            .log_probs
            .size()
            .last()
            .expect("categorical logits must have an event dimension")
    }

    /// Event probabilities; `[BATCH_SHAPE.., NUM_EVENTS]`.
    #[must_use]
    pub fn probs(&self) -> Tensor {
        self.log_probs.exp()
    }

    /// Draw one sample from each distribution; an i64 tensor `[BATCH_SHAPE..]`.
    #[must_use]
    pub fn sample(&self) -> Tensor {
        let _no_grad = tch::no_grad_guard();
        let probs = self.probs();
        let shape = probs.size();
        probs
            .reshape(&[-1, self.num_events()])
            .multinomial(1, true)
            .reshape(&shape[..shape.len() - 1])
    }

    /// The most likely event of each distribution; an i64 tensor `[BATCH_SHAPE..]`.
    ///
    /// Ties resolve to the lowest index.
    #[must_use]
    pub fn mode(&self) -> Tensor {
        self.log_probs.argmax(Some(-1), false)
    }

    /// Log probability of the given elements.
    ///
    /// # Args
    /// * `elements` - An i64 tensor `[BATCH_SHAPE..]`.
    #[must_use]
    pub fn log_probs(&self, elements: &Tensor) -> Tensor {
        self.log_probs
            .gather(-1, &elements.unsqueeze(-1), false)
            .squeeze_dim(-1)
    }

    /// Entropy of each distribution; `[BATCH_SHAPE..]`.
    #[must_use]
    pub fn entropy(&self) -> Tensor {
        // Zero-probability events contribute 0 rather than 0 * -inf = NaN
        let clamped = self.log_probs.clamp_min(f64::from(f32::MIN));
        -(clamped * self.probs()).sum_dim_intlist(&[-1], false, Kind::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn assert_isclose(actual: &Tensor, expected: &Tensor) {
        assert!(
            bool::from(expected.isclose(actual, 1e-6, 1e-6, false).all()),
            "expected: {:?}\nactual: {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn log_probs() {
        let logits = Tensor::of_slice(&[
            f32::NEG_INFINITY,
            0.0,
            f32::NEG_INFINITY,
            //
            -1.0,
            0.0,
            1.0,
            //
            0.0,
            0.0,
            0.0,
        ])
        .reshape(&[-1, 3]);
        let distribution = Categorical::new(&logits);

        let elements = Tensor::of_slice(&[1_i64, 2, 0]);
        let log_normalizer = f32::ln(f32::exp(-1.0) + 1.0 + f32::exp(1.0));
        let expected = Tensor::of_slice(&[0.0, 1.0 - log_normalizer, -(3.0_f32.ln())]);

        assert_isclose(&distribution.log_probs(&elements), &expected);
    }

    #[test]
    fn log_probs_ignores_logit_offset() {
        let logits = Tensor::of_slice(&[0.1_f32, 0.2, 0.7]).log();
        let a = Categorical::new(&logits);
        let b = Categorical::new(&(&logits + 5.0));
        let elements = Tensor::of_slice(&[2_i64]).reshape(&[]);
        assert_isclose(&a.log_probs(&elements), &b.log_probs(&elements));
    }

    #[test]
    fn entropies() {
        let logits = Tensor::of_slice(&[
            f32::NEG_INFINITY,
            0.0,
            f32::NEG_INFINITY,
            //
            0.0,
            0.0,
            0.0,
            //
            0.1_f32.ln(),
            0.3_f32.ln(),
            0.6_f32.ln(),
        ])
        .reshape(&[-1, 3]);
        let distribution = Categorical::new(&logits);

        let expected = Tensor::of_slice(&[
            0.0,
            -(3.0_f32.recip().ln()),
            -0.1 * 0.1_f32.ln() - 0.3 * 0.3_f32.ln() - 0.6 * 0.6_f32.ln(),
        ]);
        assert_isclose(&distribution.entropy(), &expected);
    }

    #[test]
    fn mode() {
        let logits = Tensor::of_slice(&[0.0_f32, 2.0, 1.0, 3.0, -1.0, 0.0]).reshape(&[2, 3]);
        let distribution = Categorical::new(&logits);
        assert_eq!(distribution.mode(), Tensor::of_slice(&[1_i64, 0]));
    }

    #[test]
    fn sample_deterministic_support() {
        let logits = Tensor::of_slice(&[
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
            0.0,
            0.0,
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
        ])
        .reshape(&[2, 3]);
        let distribution = Categorical::new(&logits);
        let sample = distribution.sample();
        assert_eq!(sample.size(), [2]);
        assert_eq!(sample, Tensor::of_slice(&[2_i64, 0]));
    }

    #[test]
    fn sample_in_range() {
        let logits = Tensor::zeros(&[4, 5, 7], (Kind::Float, Device::Cpu));
        let sample = Categorical::new(&logits).sample();
        assert_eq!(sample.size(), [4, 5]);
        assert!(bool::from(sample.ge(0).all()));
        assert!(bool::from(sample.lt(7).all()));
    }

    #[test]
    fn probs_sum_to_one() {
        let logits = Tensor::rand(&[3, 6], (Kind::Float, Device::Cpu));
        let sums = Categorical::new(&logits)
            .probs()
            .sum_dim_intlist(&[-1], false, Kind::Float);
        assert_isclose(&sums, &Tensor::ones(&[3], (Kind::Float, Device::Cpu)));
    }
}
