//! # Result records
//!
//! A run is written as tab-separated lines, one per worker plus one `ALL`
//! line holding the mean of the finite per-worker averages:
//!
//! ```text
//! busy-wait-both	6	0	1.234
//! busy-wait-both	6	1	INF
//! busy-wait-both	6	ALL	1.234
//! ```
//!
//! [`ReportWriter`] owns the output for the whole benchmark and is the only
//! thing that touches it.

use std::fmt;
use std::io::{self, BufWriter, Write};

use crate::{Average, RunReport};

/// Worker column of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// A single worker.
    Worker(usize),
    /// The cross-worker mean.
    All,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Worker(id) => write!(f, "{id}"),
            Column::All => f.write_str("ALL"),
        }
    }
}

/// One output line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    /// Strategy name.
    pub strategy: &'a str,
    /// Ring size.
    pub workers: usize,
    /// Worker index or `ALL`.
    pub column: Column,
    /// Average wait in milliseconds, or `INF`.
    pub average: Average,
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.strategy, self.workers, self.column, self.average
        )
    }
}

impl RunReport {
    /// The run's records: every worker in order, then the `ALL` row.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        let record = move |column, average| Record {
            strategy: self.strategy,
            workers: self.workers,
            column,
            average,
        };
        self.summary
            .per_worker
            .iter()
            .enumerate()
            .map(move |(id, avg)| record(Column::Worker(id), *avg))
            .chain(std::iter::once(record(Column::All, self.summary.overall)))
    }
}

/// Buffered sink for result records.
pub struct ReportWriter<W: Write> {
    out: BufWriter<W>,
    lines: usize,
}

impl<W: Write> ReportWriter<W> {
    /// Wraps `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            lines: 0,
        }
    }

    /// Appends every record of `report`.
    pub fn write_run(&mut self, report: &RunReport) -> io::Result<()> {
        for record in report.records() {
            writeln!(self.out, "{record}")?;
            self.lines += 1;
        }
        Ok(())
    }

    /// Lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.out.into_inner().map_err(io::IntoInnerError::into_error)
    }
}
