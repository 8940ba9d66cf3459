//! Long Short-Term Memory
use super::{BuildModule, Module};
use crate::torch::initializers::Initializer;
use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

/// Configuration for [`Lstm`]
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    /// Number of stacked layers; each has size equal to the output size when built.
    pub num_layers: usize,
    /// Dropout probability applied to the outputs of each layer except the last.
    ///
    /// Only active in training mode.
    pub dropout: f64,
    /// Initializer for the input-to-hidden weights.
    pub input_weights_init: Initializer,
    /// Initializer for the hidden-to-hidden weights.
    pub hidden_weights_init: Initializer,
    /// Initializer for the biases, if the layers have biases.
    pub bias_init: Option<Initializer>,
}

/// Follows the Tensorflow (Keras) strategy:
/// Glorot uniform input weights, orthogonal hidden weights and zero biases.
///
/// The gate weights form one large `[4 * hidden_dim, in_dim]` matrix;
/// fan-out is not corrected for the number of gates.
impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            num_layers: 1,
            dropout: 0.0,
            input_weights_init: Initializer::default(),
            hidden_weights_init: Initializer::Orthogonal,
            bias_init: Some(Initializer::Zeros),
        }
    }
}

impl BuildModule for LstmConfig {
    type Module = Lstm;

    fn build_module(&self, in_dim: usize, out_dim: usize, device: Device) -> Self::Module {
        Lstm::new(in_dim, out_dim, device, self)
    }
}

/// Recurrent state of a multi-layer [`Lstm`].
///
/// Owned by the caller and threaded from one call to the next.
#[derive(Debug, PartialEq)]
pub struct LstmState {
    /// Hidden state of each layer; `[NUM_LAYERS, BATCH_SIZE, HIDDEN_DIM]`
    pub hidden: Tensor,
    /// Cell state of each layer; `[NUM_LAYERS, BATCH_SIZE, HIDDEN_DIM]`
    pub cell: Tensor,
}

impl LstmState {
    #[must_use]
    pub fn shallow_clone(&self) -> Self {
        Self {
            hidden: self.hidden.shallow_clone(),
            cell: self.cell.shallow_clone(),
        }
    }

    /// Batch size of the state.
    #[must_use]
    pub fn batch_size(&self) -> i64 {
        self.hidden.size()[1]
    }
}

/// Multi-layer batch-first Long Short-Term Memory module.
#[derive(Debug, PartialEq)]
pub struct Lstm {
    /// Per layer: `weight_ih`, `weight_hh` and, if `has_biases`, `bias_ih`, `bias_hh`.
    flat_weights: Vec<Tensor>,
    has_biases: bool,
    num_layers: usize,
    hidden_size: i64,
    dropout: f64,
}

/// LSTMs have 4 gates: input, forget, cell and output.
const NUM_GATES: usize = 4;

impl Lstm {
    #[must_use]
    pub fn new(in_dim: usize, out_dim: usize, device: Device, config: &LstmConfig) -> Self {
        let gates_size = NUM_GATES * out_dim;
        let mut flat_weights = Vec::new();
        for layer in 0..config.num_layers {
            let layer_in_dim = if layer == 0 { in_dim } else { out_dim };
            flat_weights.push(
                config
                    .input_weights_init
                    .tensor(&[gates_size, layer_in_dim])
                    .device(device)
                    .build(),
            );
            flat_weights.push(
                config
                    .hidden_weights_init
                    .tensor(&[gates_size, out_dim])
                    .device(device)
                    .build(),
            );
            if let Some(bias_init) = config.bias_init {
                flat_weights.push(bias_init.tensor(&[gates_size]).device(device).build());
                flat_weights.push(bias_init.tensor(&[gates_size]).device(device).build());
            }
        }
        Self {
            flat_weights,
            has_biases: config.bias_init.is_some(),
            num_layers: config.num_layers,
            hidden_size: out_dim as i64,
            dropout: config.dropout,
        }
    }

    #[must_use]
    pub const fn num_layers(&self) -> usize {
        self.num_layers
    }

    #[must_use]
    pub const fn hidden_size(&self) -> usize {
        self.hidden_size as usize
    }

    /// Size of the input features expected by the first layer.
    #[must_use]
    pub fn in_dim(&self) -> usize {
        self.flat_weights[0].size()[1] as usize
    }

    /// All-zero state for the start of a new batch of sequences.
    #[must_use]
    pub fn initial_state(&self, batch_size: i64) -> LstmState {
        let device = self.flat_weights[0].device();
        let hidden = Tensor::zeros(
            &[self.num_layers as i64, batch_size, self.hidden_size],
            (Kind::Float, device),
        );
        let cell = hidden.zeros_like();
        LstmState { hidden, cell }
    }

    /// Apply the network over a batch of sequences starting from the given state.
    ///
    /// # Args
    /// * `inputs` - Batched input sequences. An f32 tensor `[BATCH_SIZE, SEQ_LEN, IN_DIM]`.
    /// * `state` - Initial recurrent state.
    /// * `train` - Whether to apply dropout between layers.
    ///
    /// # Returns
    /// * Output sequences `[BATCH_SIZE, SEQ_LEN, HIDDEN_DIM]` from the last layer.
    /// * Recurrent state after the final step.
    pub fn seq_init(&self, inputs: &Tensor, state: &LstmState, train: bool) -> (Tensor, LstmState) {
        assert_eq!(
            inputs.dim(),
            3,
            "Input must have 3 dimensions: [BATCH_SIZE, SEQ_LEN, NUM_FEATURES]"
        );
        let hx = [state.hidden.shallow_clone(), state.cell.shallow_clone()];
        let (output, hidden, cell) = inputs.lstm(
            &hx,
            self.flat_weights.as_slice(),
            self.has_biases,
            self.num_layers as i64,
            self.dropout,
            train,
            false, // bidirectional
            true,  // batch_first
        );
        (output, LstmState { hidden, cell })
    }

    /// Apply the network starting from an all-zero state.
    pub fn seq(&self, inputs: &Tensor, train: bool) -> (Tensor, LstmState) {
        let state = self.initial_state(inputs.size()[0]);
        self.seq_init(inputs, &state, train)
    }
}

impl Module for Lstm {
    fn shallow_clone(&self) -> Self
    where
        Self: Sized,
    {
        Self {
            flat_weights: self.flat_weights.iter().map(Tensor::shallow_clone).collect(),
            ..*self
        }
    }

    fn clone_to_device(&self, device: Device) -> Self
    where
        Self: Sized,
    {
        Self {
            flat_weights: self
                .flat_weights
                .iter()
                .map(|t| t.to_device(device))
                .collect(),
            ..*self
        }
    }

    #[inline]
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.flat_weights.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::assert_allclose;
    use super::*;
    use rstest::{fixture, rstest};
    use tch::IndexOp;

    #[fixture]
    fn lstm() -> (Lstm, usize, usize) {
        let in_dim: usize = 3;
        let out_dim: usize = 2;
        let config = LstmConfig {
            num_layers: 2,
            ..LstmConfig::default()
        };
        (config.build_module(in_dim, out_dim, Device::Cpu), in_dim, out_dim)
    }

    #[rstest]
    fn seq_shape(lstm: (Lstm, usize, usize)) {
        let (lstm, in_dim, out_dim) = lstm;
        let inputs = Tensor::rand(&[4, 5, in_dim as i64], (Kind::Float, Device::Cpu));
        let (output, state) = lstm.seq(&inputs, false);
        assert_eq!(output.size(), [4, 5, out_dim as i64]);
        assert_eq!(state.hidden.size(), [2, 4, out_dim as i64]);
        assert_eq!(state.cell.size(), [2, 4, out_dim as i64]);
        assert_eq!(state.batch_size(), 4);
    }

    #[rstest]
    fn final_hidden_is_last_output(lstm: (Lstm, usize, usize)) {
        let (lstm, in_dim, _) = lstm;
        let inputs = Tensor::rand(&[2, 4, in_dim as i64], (Kind::Float, Device::Cpu));
        let (output, state) = lstm.seq(&inputs, false);
        assert_allclose(&output.i((.., 3, ..)), &state.hidden.i(1));
    }

    #[rstest]
    fn seq_matches_iter_steps(lstm: (Lstm, usize, usize)) {
        let (lstm, in_dim, _) = lstm;
        let _no_grad_guard = tch::no_grad_guard();
        let inputs = Tensor::rand(&[3, 4, in_dim as i64], (Kind::Float, Device::Cpu));
        let (seq_output, seq_state) = lstm.seq(&inputs, false);

        let mut state = lstm.initial_state(3);
        for t in 0..4 {
            let (step_output, new_state) = lstm.seq_init(&inputs.i((.., t..t + 1, ..)), &state, false);
            assert_allclose(&step_output.squeeze_dim(1), &seq_output.i((.., t, ..)));
            state = new_state;
        }
        assert_allclose(&state.hidden, &seq_state.hidden);
        assert_allclose(&state.cell, &seq_state.cell);
    }

    #[rstest]
    fn gradients_reach_all_weights(lstm: (Lstm, usize, usize)) {
        let (lstm, in_dim, _) = lstm;
        let inputs = Tensor::rand(&[2, 3, in_dim as i64], (Kind::Float, Device::Cpu));
        let (output, _) = lstm.seq(&inputs, true);
        output.sum(Kind::Float).backward();
        for variable in lstm.trainable_variables() {
            assert!(variable.grad().defined());
        }
    }

    #[rstest]
    fn variables_count(lstm: (Lstm, usize, usize)) {
        let (lstm, _, _) = lstm;
        assert_eq!(lstm.variables().count(), 8);
        assert_eq!(lstm.trainable_variables().count(), 8);
    }

    #[test]
    fn variables_count_nobias() {
        let config = LstmConfig {
            bias_init: None,
            ..LstmConfig::default()
        };
        let lstm = config.build_module(3, 2, Device::Cpu);
        assert_eq!(lstm.variables().count(), 2);
        assert_eq!(lstm.in_dim(), 3);
        assert_eq!(lstm.hidden_size(), 2);
    }

    #[rstest]
    fn clone_to_same_device(lstm: (Lstm, usize, usize)) {
        let (lstm, in_dim, _) = lstm;
        let _no_grad_guard = tch::no_grad_guard();
        let copy = lstm.clone_to_device(Device::Cpu);
        let inputs = Tensor::rand(&[1, 2, in_dim as i64], (Kind::Float, Device::Cpu));
        assert_allclose(&copy.seq(&inputs, false).0, &lstm.seq(&inputs, false).0);
    }
}
