//! CSV export of sweep reports
//!
//! Aggregate reports are written as
//! `Noise Factor, Expectation Value, Standard Deviation`; all-values reports
//! as `Noise Factor, Measurement 1, …, Measurement N`. Failed factors keep
//! their row, with the factor followed by empty cells.

use crate::error::Result;
use crate::sweep::{ExperimentResult, FactorOutcome, RunSeries, SweepReport};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column headers of the aggregate CSV
pub const AGGREGATE_HEADER: [&str; 3] = ["Noise Factor", "Expectation Value", "Standard Deviation"];

/// Reports that can be exported as CSV
pub trait CsvReport {
    /// Header row followed by one row per factor
    fn rows(&self) -> Vec<Vec<String>>;

    /// Write the CSV to any writer
    fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        for row in self.rows() {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Render the CSV into a string
    fn to_csv(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write the CSV to `path`, replacing any existing file
    fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_to(file)?;
        tracing::info!(path = %path.as_ref().display(), "results written");
        Ok(())
    }
}

impl CsvReport for SweepReport<ExperimentResult> {
    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> =
            vec![AGGREGATE_HEADER.iter().map(|h| h.to_string()).collect()];
        for outcome in &self.outcomes {
            rows.push(match outcome {
                FactorOutcome::Completed(r) => vec![
                    r.scale_factor.to_string(),
                    r.expectation_value.to_string(),
                    r.std_dev.to_string(),
                ],
                FactorOutcome::Failed { scale_factor, .. } => {
                    vec![scale_factor.to_string(), String::new(), String::new()]
                }
            });
        }
        rows
    }
}

impl CsvReport for SweepReport<RunSeries> {
    fn rows(&self) -> Vec<Vec<String>> {
        let width = self
            .completed()
            .map(|series| series.values.len())
            .max()
            .unwrap_or(0);

        let mut header = vec!["Noise Factor".to_string()];
        header.extend((1..=width).map(|i| format!("Measurement {}", i)));

        let mut rows = vec![header];
        for outcome in &self.outcomes {
            rows.push(match outcome {
                FactorOutcome::Completed(series) => std::iter::once(series.scale_factor.to_string())
                    .chain(series.values.iter().map(|v| v.to_string()))
                    .collect(),
                FactorOutcome::Failed { scale_factor, .. } => std::iter::once(scale_factor.to_string())
                    .chain(std::iter::repeat(String::new()).take(width))
                    .collect(),
            });
        }
        rows
    }
}
