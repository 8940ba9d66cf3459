//! Linear layer
use super::{BuildModule, FeedForwardModule, Module};
use crate::torch::initializers::Initializer;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{Device, Tensor};

/// Configuration for the [`Linear`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    /// Initializer for the kernel (weight) matrix.
    pub kernel_init: Initializer,
    /// Initializer for the bias vector, if one exists.
    pub bias_init: Option<Initializer>,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            kernel_init: Initializer::default(),
            bias_init: Some(Initializer::default()),
        }
    }
}

impl BuildModule for LinearConfig {
    type Module = Linear;

    fn build_module(&self, in_dim: usize, out_dim: usize, device: Device) -> Self::Module {
        Linear::new(in_dim, out_dim, device, self)
    }
}

/// Linear fully-connected layer module.
#[derive(Debug, PartialEq)]
pub struct Linear {
    /// Weights; `[out_dim, in_dim]`
    kernel: Tensor,
    /// `[out_dim]`
    bias: Option<Tensor>,
}

impl Linear {
    #[must_use]
    pub fn new(in_dim: usize, out_dim: usize, device: Device, config: &LinearConfig) -> Self {
        // Total fan_in is the weights in_dim + 1 for the bias.
        let fan_in = in_dim + 1;
        Self {
            kernel: config
                .kernel_init
                .tensor(&[out_dim, in_dim])
                .device(device)
                .fan_in(fan_in)
                .build(),
            bias: config
                .bias_init
                .map(|init| init.tensor(&[out_dim]).device(device).fan_in(fan_in).build()),
        }
    }

    /// Number of output features.
    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.kernel.size()[0] as usize
    }
}

impl Module for Linear {
    fn shallow_clone(&self) -> Self
    where
        Self: Sized,
    {
        Self {
            kernel: self.kernel.shallow_clone(),
            bias: self.bias.as_ref().map(Tensor::shallow_clone),
        }
    }

    fn clone_to_device(&self, device: Device) -> Self
    where
        Self: Sized,
    {
        Self {
            kernel: self.kernel.to_device(device),
            bias: self.bias.as_ref().map(|b| b.to_device(device)),
        }
    }

    #[inline]
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(iter::once(&self.kernel).chain(self.bias.iter()))
    }
}

impl FeedForwardModule for Linear {
    /// Applies to the last dimension of `input`; any leading dimensions are batch dimensions.
    #[inline]
    fn forward(&self, input: &Tensor) -> Tensor {
        input.linear(&self.kernel, self.bias.as_ref())
    }
}
