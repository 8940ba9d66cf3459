//! Tensorboard logger
use super::summary::{Summary, SummaryLogger, SummaryWriter};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tensorboard_rs::summary_writer::SummaryWriter as TbSummaryWriter;

/// Logger that saves periodic summaries to a tensorboard event file.
pub type TensorBoardLogger = SummaryLogger<TensorBoardBackend>;

impl TensorBoardLogger {
    /// Write summaries into `log_dir` at most once per `flush_period`.
    #[inline]
    pub fn with_log_dir<P: AsRef<Path>>(log_dir: P, flush_period: Duration) -> Self {
        Self::new(TensorBoardBackend::new(log_dir), flush_period)
    }
}

/// Logging backend that saves summaries to a tensorboard file.
pub struct TensorBoardBackend {
    writer: TbSummaryWriter,
    summary_index: usize,
}

impl fmt::Debug for TensorBoardBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TensorBoardBackend")
            .field("summary_index", &self.summary_index)
            .finish()
    }
}

impl TensorBoardBackend {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        Self {
            writer: TbSummaryWriter::new(log_dir),
            summary_index: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_summary(&mut self, tag: &str, summary: &Summary) {
        match summary {
            Summary::Counter {
                increment,
                initial_value,
            } => self.writer.add_scalar(
                tag,
                (initial_value + increment) as f32,
                self.summary_index,
            ),
            Summary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    self.writer.add_scalar(tag, mean as f32, self.summary_index)
                }
            }
            Summary::Index { counts } => {
                // Histogram with bucket boundaries half way between each integer.
                let bucket_counts: Vec<f64> = counts.iter().map(|&n| n as f64).collect();
                self.writer.add_histogram_raw(
                    tag,
                    -0.5,                                                         // min
                    counts.len() as f64 - 0.5,                                    // max
                    bucket_counts.iter().sum(),                                   // num
                    counts.iter().enumerate().map(|(i, n)| (i * n) as f64).sum(), // sum
                    counts
                        .iter()
                        .enumerate()
                        .map(|(i, n)| (i * i * n) as f64)
                        .sum(), // sum_squares
                    &(0..counts.len())
                        .map(|i| i as f64 + 0.5)
                        .collect::<Vec<_>>(), // bucket_limits
                    &bucket_counts,
                    self.summary_index,
                )
            }
        }
    }
}

impl SummaryWriter for TensorBoardBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, _: Duration)
    where
        I: Iterator<Item = (&'static str, &'a Summary)>,
    {
        for (name, summary) in summaries {
            self.write_summary(name, summary);
        }
        self.summary_index += 1;
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::StatsLogger;
    use std::env;
    use std::fs;

    #[test]
    fn writes_event_file() {
        let log_dir = env::temp_dir().join(format!("progseq-tb-{}", std::process::id()));
        {
            let mut logger = TensorBoardLogger::with_log_dir(&log_dir, Duration::from_secs(3600));
            logger.log_scalar("loss/cross_entropy", 1.5);
            logger.log_index("sample/token", 2, 4);
            logger.log_counter_increment("sample/count", 3);
        }
        let num_files = fs::read_dir(&log_dir).map(Iterator::count).unwrap_or(0);
        assert!(num_files > 0);
        let _ = fs::remove_dir_all(&log_dir);
    }
}
