//! Parameter initializers
#![allow(clippy::use_self)] // false positive with serde derives
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tch::{Device, Kind, Tensor};
use thiserror::Error;

/// How a parameter tensor is initialized.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Zeros,
    /// Zero-mean uniform distribution with the given variance.
    Uniform(VarianceScale),
    /// Zero-mean normal distribution with the given variance.
    Normal(VarianceScale),
    /// Random orthogonal matrix. Used for recurrent weights.
    Orthogonal,
}

/// Xavier uniform: `Unif(±√(6 / (fan_in + fan_out)))`.
impl Default for Initializer {
    fn default() -> Self {
        Self::Uniform(VarianceScale::FanAvg)
    }
}

/// Element variance of a randomly initialized tensor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarianceScale {
    /// Fixed variance.
    Constant(f64),
    /// `1 / fan_in`
    FanIn,
    /// `2 / (fan_in + fan_out)`
    FanAvg,
}

impl VarianceScale {
    fn variance(self, fan_in: usize, fan_out: usize) -> f64 {
        match self {
            Self::Constant(v) => v,
            Self::FanIn => (fan_in as f64).recip(),
            Self::FanAvg => 2.0 / (fan_in + fan_out) as f64,
        }
    }
}

impl Initializer {
    /// Start building a parameter tensor of the given shape.
    #[must_use]
    #[inline]
    pub const fn tensor<'a>(&'a self, shape: &'a [usize]) -> TensorBuilder<'a> {
        TensorBuilder {
            initializer: self,
            shape,
            fan_in: None,
            requires_grad: true,
            kind: Kind::Float,
            device: Device::Cpu,
        }
    }
}

/// Builder of an initialized parameter tensor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TensorBuilder<'a> {
    initializer: &'a Initializer,
    /// `[out, in, ..]`
    shape: &'a [usize],
    fan_in: Option<usize>,
    requires_grad: bool,
    kind: Kind,
    device: Device,
}

impl<'a> TensorBuilder<'a> {
    /// Override the number of input features.
    ///
    /// By default it is `shape[1]` (or 1 for vectors).
    /// A layer's weights and bias share the fan-in `in_dim + 1`.
    #[must_use]
    #[inline]
    pub const fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = Some(fan_in);
        self
    }

    #[must_use]
    #[inline]
    pub const fn requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Set a floating-point data type. Defaults to `Kind::Float`.
    #[inline]
    pub const fn kind(mut self, kind: Kind) -> Result<Self, InitializeTensorError> {
        match kind {
            Kind::Half | Kind::Float | Kind::Double | Kind::BFloat16 => {
                self.kind = kind;
                Ok(self)
            }
            _ => Err(InitializeTensorError::InvalidKind(kind)),
        }
    }

    #[must_use]
    #[inline]
    pub const fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn build(&self) -> Tensor {
        let options = (self.kind, self.device);
        let shape: SmallVec<[i64; 4]> = self.shape.iter().map(|&d| d as i64).collect();
        let fan_in = self
            .fan_in
            .unwrap_or_else(|| self.shape.get(1).copied().unwrap_or(1));
        let fan_out = self.shape.first().copied().unwrap_or(1);

        let _no_grad = tch::no_grad_guard();
        let tensor = match self.initializer {
            Initializer::Zeros => Tensor::zeros(&shape, options),
            Initializer::Uniform(scale) => {
                let bound = (3.0 * scale.variance(fan_in, fan_out)).sqrt();
                Tensor::empty(&shape, options).uniform_(-bound, bound)
            }
            Initializer::Normal(scale) => {
                let std = scale.variance(fan_in, fan_out).sqrt();
                Tensor::empty(&shape, options).normal_(0.0, std)
            }
            Initializer::Orthogonal => orthogonal(&shape, options),
        };
        tensor.set_requires_grad(self.requires_grad)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InitializeTensorError {
    #[error("unsupported kind {0:?}; expected a floating-point type")]
    InvalidKind(Kind),
}

/// Orthogonal `[rows, cols]` matrix from the QR decomposition of a standard normal sample.
fn orthogonal(shape: &[i64], options: (Kind, Device)) -> Tensor {
    assert_eq!(shape.len(), 2, "orthogonal initialization requires a matrix");
    let (rows, cols) = (shape[0], shape[1]);
    let wide = rows < cols;

    let sample = Tensor::empty(&[rows.max(cols), rows.min(cols)], options).normal_(0.0, 1.0);
    let (q, r) = sample.linalg_qr("reduced");
    // Fix column signs so q is uniformly distributed
    let q = q * r.diag(0).sign();
    if wide {
        q.tr().contiguous()
    } else {
        q
    }
}
