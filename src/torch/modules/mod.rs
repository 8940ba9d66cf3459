//! Torch modules that own their parameter tensors.
mod embedding;
mod linear;
mod lstm;

pub use embedding::{Embedding, EmbeddingConfig};
pub use linear::{Linear, LinearConfig};
pub use lstm::{Lstm, LstmConfig, LstmState};

use tch::{Device, Tensor};

/// A neural network module.
///
/// Modules own their parameters as plain tensors rather than registering them in a
/// [`tch::nn::VarStore`]. An optimizer is built from [`Module::trainable_variables`].
pub trait Module {
    /// Create a clone of this module sharing the same variables (tensors).
    #[must_use]
    fn shallow_clone(&self) -> Self
    where
        Self: Sized;

    /// Create a clone of this module on the given device.
    ///
    /// A shallow clone is returned if the module is already on that device.
    #[must_use]
    fn clone_to_device(&self, device: Device) -> Self
    where
        Self: Sized;

    /// Iterator over all variables (tensors) of the module.
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_>;

    /// Iterator over the variables that are updated by training.
    fn trainable_variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.variables().filter(|t| t.requires_grad()))
    }
}

/// A module that maps an input tensor to an output tensor.
pub trait FeedForwardModule: Module {
    /// Apply the module to a batch of inputs.
    fn forward(&self, input: &Tensor) -> Tensor;
}

/// Build a [`Module`] with the given input and output dimensions.
pub trait BuildModule {
    type Module: Module;

    fn build_module(&self, in_dim: usize, out_dim: usize, device: Device) -> Self::Module;
}
