//! Command-line logger
use super::summary::{Summary, SummaryLogger, SummaryWriter};
use crate::utils::fmt::{DisplayFn, PrettyPrint};
use std::fmt;
use std::time::Duration;
use yansi::Paint;

/// Logger that displays periodic summaries to standard output.
pub type DisplayLogger = SummaryLogger<DisplayBackend>;

impl DisplayLogger {
    /// Display summaries at most once per `display_period`.
    #[inline]
    pub fn with_period(display_period: Duration) -> Self {
        Self::new(DisplayBackend, display_period)
    }
}

impl Default for DisplayLogger {
    fn default() -> Self {
        Self::with_period(Duration::from_secs(5))
    }
}

/// Logging backend that displays summaries to standard output.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayBackend;

impl SummaryWriter for DisplayBackend {
    fn write_summaries<'a, I>(&mut self, summaries: I, elapsed: Duration)
    where
        I: Iterator<Item = (&'static str, &'a Summary)>,
    {
        println!(
            "{}",
            Paint::fixed(8, format!("--- {:.1?} ---", elapsed))
        );
        for (name, summary) in summaries {
            println!("{:<24} {}", Paint::fixed(35, name), DisplaySummary(summary));
        }
    }
}

#[derive(Debug)]
struct DisplaySummary<'a>(&'a Summary);

impl<'a> fmt::Display for DisplaySummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Summary::Counter {
                increment,
                initial_value,
            } => write!(
                f,
                "{}  (+{})",
                initial_value + increment,
                Paint::fixed(253, increment)
            ),
            Summary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.3}", PrettyPrint(mean))?;
                }
                match stats.stddev() {
                    Some(stddev) if stats.count() > 1 => write!(
                        f,
                        " {}",
                        Paint::fixed(
                            8,
                            DisplayFn(|f| write!(f, "(σ {:.3})", PrettyPrint(stddev)))
                        )
                    ),
                    _ => Ok(()),
                }
            }
            Summary::Index { counts } => {
                let n: usize = counts.iter().sum();
                write!(f, "(n {})  [", n)?;
                for (i, c) in counts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", c * 100 / n.max(1))?;
                }
                write!(f, "]%")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::stats::OnlineMeanVariance;

    #[test]
    fn display_index_percentages() {
        Paint::disable();
        let summary = Summary::Index {
            counts: vec![1, 3, 0],
        };
        assert_eq!(format!("{}", DisplaySummary(&summary)), "(n 4)  [25 75 0]%");
    }

    #[test]
    fn display_scalar_mean() {
        Paint::disable();
        let summary = Summary::Scalar {
            stats: [2.0].into_iter().collect::<OnlineMeanVariance<f64>>(),
        };
        assert_eq!(format!("{}", DisplaySummary(&summary)), "2.000");
    }

    #[test]
    fn display_counter() {
        Paint::disable();
        let summary = Summary::Counter {
            increment: 2,
            initial_value: 5,
        };
        assert_eq!(format!("{}", DisplaySummary(&summary)), "7  (+2)");
    }
}
