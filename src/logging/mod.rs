//! Logging statistics from training and sampling
mod display;
mod summary;
mod tensorboard;

pub use display::{DisplayBackend, DisplayLogger};
pub use summary::{Summary, SummaryLogger, SummaryWriter};
pub use tensorboard::{TensorBoardBackend, TensorBoardLogger};

use thiserror::Error;

/// A value that can be logged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogValue {
    /// A scalar value. Aggregate by taking means.
    Scalar(f64),
    /// Increment a counter by the given amount.
    CounterIncrement(u64),
    /// A sample from a distribution over `0 .. size`.
    Index { value: usize, size: usize },
}

impl LogValue {
    /// The name of this variant
    const fn variant_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "Scalar",
            Self::CounterIncrement(_) => "CounterIncrement",
            Self::Index { .. } => "Index",
        }
    }
}

impl From<f64> for LogValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for LogValue {
    #[inline]
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

/// Error logging a value under some name.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    #[error("incompatible value type; previously {prev} now {now}")]
    IncompatibleValue {
        prev: &'static str,
        now: &'static str,
    },
    #[error("incompatible index size; previously {prev} now {now}")]
    IncompatibleIndexSize { prev: usize, now: usize },
    #[error("index {value} out of range for size {size}")]
    IndexOutOfRange { value: usize, size: usize },
}

/// Log statistics.
pub trait StatsLogger {
    /// Log a value under the given name.
    ///
    /// # Returns
    /// May return an error if the logged value is structurally incompatible
    /// with previous values logged under the same name.
    fn log(&mut self, name: &'static str, value: LogValue) -> Result<(), LogError>;

    /// Write out any pending summaries.
    fn flush(&mut self);

    /// Log a scalar value, ignoring structural errors.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) {
        let _ = self.log(name, LogValue::Scalar(value));
    }

    /// Increment a counter, ignoring structural errors.
    #[inline]
    fn log_counter_increment(&mut self, name: &'static str, increment: u64) {
        let _ = self.log(name, LogValue::CounterIncrement(increment));
    }

    /// Log an index sample, ignoring structural errors.
    #[inline]
    fn log_index(&mut self, name: &'static str, value: usize, size: usize) {
        let _ = self.log(name, LogValue::Index { value, size });
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn log(&mut self, _: &'static str, _: LogValue) -> Result<(), LogError> {
        Ok(())
    }

    #[inline]
    fn flush(&mut self) {}
}

impl<L: StatsLogger + ?Sized> StatsLogger for &mut L {
    #[inline]
    fn log(&mut self, name: &'static str, value: LogValue) -> Result<(), LogError> {
        (**self).log(name, value)
    }

    #[inline]
    fn flush(&mut self) {
        (**self).flush()
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for Box<L> {
    #[inline]
    fn log(&mut self, name: &'static str, value: LogValue) -> Result<(), LogError> {
        (**self).log(name, value)
    }

    #[inline]
    fn flush(&mut self) {
        (**self).flush()
    }
}
