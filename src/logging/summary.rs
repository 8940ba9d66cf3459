//! Aggregate logged values into periodic summaries.
use super::{LogError, LogValue, StatsLogger};
use crate::utils::stats::OnlineMeanVariance;
use std::collections::{btree_map::Entry, BTreeMap};
use std::time::{Duration, Instant};

/// Write out summaries to a backend.
pub trait SummaryWriter {
    /// Write summaries covering a period of length `elapsed`.
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'static str, &'a Summary)>;
}

/// Logs statistics by summarizing all values logged under the same name within a time period.
///
/// Summaries are written out once `flush_period` has elapsed since the last write,
/// on explicit [`StatsLogger::flush`], and when the logger is dropped.
#[derive(Debug)]
pub struct SummaryLogger<W: SummaryWriter> {
    writer: W,
    flush_period: Duration,

    // A binary tree is used so that names are written in sorted order
    summaries: BTreeMap<&'static str, Node>,

    /// Start time of the current period.
    period_start: Instant,
}

impl<W: SummaryWriter> SummaryLogger<W> {
    pub fn new(writer: W, flush_period: Duration) -> Self {
        Self {
            writer,
            flush_period,
            summaries: BTreeMap::new(),
            period_start: Instant::now(),
        }
    }

    /// The current (unflushed) summary for a name.
    pub fn summary(&self, name: &str) -> Option<&Summary> {
        self.summaries
            .get(name)
            .filter(|node| node.dirty)
            .map(|node| &node.summary)
    }
}

impl<W: SummaryWriter> StatsLogger for SummaryLogger<W> {
    fn log(&mut self, name: &'static str, value: LogValue) -> Result<(), LogError> {
        match self.summaries.entry(name) {
            Entry::Vacant(e) => {
                e.insert(Node::new(Summary::try_from(value)?));
            }
            Entry::Occupied(e) => e.into_mut().push(value)?,
        }
        if self.period_start.elapsed() >= self.flush_period {
            self.flush();
        }
        Ok(())
    }

    fn flush(&mut self) {
        if self.summaries.values().any(|node| node.dirty) {
            self.writer.write_summaries(
                self.summaries
                    .iter()
                    .filter(|(_, node)| node.dirty)
                    .map(|(name, node)| (*name, &node.summary)),
                self.period_start.elapsed(),
            );
        }

        for node in self.summaries.values_mut() {
            node.reset();
        }
        self.period_start = Instant::now();
    }
}

/// Flush when dropped
impl<W: SummaryWriter> Drop for SummaryLogger<W> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    summary: Summary,
    /// Whether the summary has been updated in this period
    dirty: bool,
}

impl Node {
    const fn new(summary: Summary) -> Self {
        Self {
            summary,
            dirty: true,
        }
    }

    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        self.summary.push(value)?;
        self.dirty = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.summary.reset()
    }
}

/// Summary of the values logged under one name.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Counter { increment: u64, initial_value: u64 },
    Scalar { stats: OnlineMeanVariance<f64> },
    Index { counts: Vec<usize> },
}

impl TryFrom<LogValue> for Summary {
    type Error = LogError;

    fn try_from(value: LogValue) -> Result<Self, Self::Error> {
        Ok(match value {
            LogValue::CounterIncrement(i) => Self::Counter {
                increment: i,
                initial_value: 0,
            },
            LogValue::Scalar(v) => {
                let mut stats = OnlineMeanVariance::new();
                stats.push(v);
                Self::Scalar { stats }
            }
            LogValue::Index { value, size } => {
                if value >= size {
                    return Err(LogError::IndexOutOfRange { value, size });
                }
                let mut counts = vec![0; size];
                counts[value] += 1;
                Self::Index { counts }
            }
        })
    }
}

impl Summary {
    /// Add a value to the summary.
    ///
    /// Returns an error and does not insert the value if it is incompatible with the summary.
    fn push(&mut self, value: LogValue) -> Result<(), LogError> {
        match (self, value) {
            (Self::Counter { increment, .. }, LogValue::CounterIncrement(i)) => *increment += i,
            (Self::Scalar { stats }, LogValue::Scalar(v)) => stats.push(v),
            (Self::Index { counts }, LogValue::Index { value, size }) => {
                if counts.len() != size {
                    return Err(LogError::IncompatibleIndexSize {
                        prev: counts.len(),
                        now: size,
                    });
                }
                if value >= size {
                    return Err(LogError::IndexOutOfRange { value, size });
                }
                counts[value] += 1;
            }
            (summary, value) => {
                return Err(LogError::IncompatibleValue {
                    prev: summary.value_variant_name(),
                    now: value.variant_name(),
                })
            }
        }
        Ok(())
    }

    /// Reset for the start of the next period. Counters keep their running total.
    fn reset(&mut self) {
        match self {
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0
            }
            Self::Scalar { stats } => *stats = OnlineMeanVariance::new(),
            Self::Index { counts } => counts.iter_mut().for_each(|c| *c = 0),
        }
    }

    /// The name of the associated [`LogValue`] variant
    const fn value_variant_name(&self) -> &'static str {
        match self {
            Self::Counter { .. } => "CounterIncrement",
            Self::Scalar { .. } => "Scalar",
            Self::Index { .. } => "Index",
        }
    }
}
