//! Run records and their sinks.
//!
//! Every run produces one [`RunRecord`] (`workers,n,size_mb,iterations,elapsed_ms`) that is
//! appended to a CSV file, plus a human-readable [`BlockReport`] per worker. The CSV carries
//! bare records unless a header line is asked for. Failing to write
//! either is an [`RelaxError::OutputWriteFailure`]: the numbers have already been computed,
//! so callers log it and carry on.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use faer::Mat;

use crate::config::RelaxOptions;
use crate::context::RelaxOutcome;
use crate::error::RelaxError;

pub const CSV_HEADER: &str = "workers,n,size_mb,iterations,elapsed_ms";

/// One CSV line per run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRecord {
    pub worker_count: usize,
    pub n: usize,
    pub size_mb: usize,
    pub iterations: usize,
    pub elapsed_ms: u128,
}

impl RunRecord {
    pub fn new(worker_count: usize, options: &RelaxOptions, outcome: &RelaxOutcome) -> Self {
        RunRecord {
            worker_count,
            n: options.n,
            size_mb: options.layout.size_mb(options.n),
            iterations: outcome.stats.generations,
            elapsed_ms: outcome.stats.elapsed.as_millis(),
        }
    }
}

impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.worker_count, self.n, self.size_mb, self.iterations, self.elapsed_ms
        )
    }
}

/// Appends run records to `<dir>/<name>.csv`.
pub struct CsvSink {
    path: PathBuf,
    file: File,
}

impl CsvSink {
    /// Opens (creating if needed) the CSV file. With `header`, an empty file first gets
    /// [`CSV_HEADER`].
    pub fn open(dir: impl AsRef<Path>, name: &str, header: bool) -> Result<Self, RelaxError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.csv"));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if header && file.metadata()?.len() == 0 {
            writeln!(file, "{CSV_HEADER}")?;
        }
        Ok(CsvSink { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &RunRecord) -> Result<(), RelaxError> {
        writeln!(self.file, "{record}")?;
        self.file.flush()?;
        Ok(())
    }
}

/// Human-readable summary of one worker's run.
#[derive(Clone, Debug)]
pub struct BlockReport {
    pub rank: usize,
    pub world: usize,
    pub n: usize,
    /// Values in the local block, halo rows included.
    pub block: usize,
    pub size_mb: usize,
    pub heat: f64,
    pub eps: f64,
    pub iterations: usize,
    pub elapsed_ms: u128,
}

impl BlockReport {
    pub fn new(world: usize, options: &RelaxOptions, outcome: &RelaxOutcome) -> Self {
        BlockReport {
            rank: outcome.partition.rank,
            world,
            n: options.n,
            block: outcome.block.len(),
            size_mb: outcome.block.len() * std::mem::size_of::<f64>() / (1024 * 1024),
            heat: options.heat,
            eps: options.eps,
            iterations: outcome.stats.generations,
            elapsed_ms: outcome.stats.elapsed.as_millis(),
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), RelaxError> {
        writeln!(out, "{self}")?;
        Ok(())
    }
}

impl fmt::Display for BlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rank      : {}", self.rank)?;
        writeln!(f, "World     : {}", self.world)?;
        writeln!(f, "N         : {}", self.n)?;
        writeln!(f, "Block     : {}", self.block)?;
        writeln!(f, "Size      : {}MB", self.size_mb)?;
        writeln!(f, "Heat      : {:.6}", self.heat)?;
        writeln!(f, "Epsilon   : {:.6}", self.eps)?;
        writeln!(f, "Iterations: {}", self.iterations)?;
        write!(f, "Time      : {}ms", self.elapsed_ms)
    }
}

/// Prints a gathered grid row by row, `| v v v |`, two decimals per value.
pub fn write_grid<W: Write>(out: &mut W, grid: &Mat<f64>) -> Result<(), RelaxError> {
    for i in 0..grid.nrows() {
        write!(out, "|")?;
        for j in 0..grid.ncols() {
            write!(out, " {:6.2}", grid[(i, j)])?;
        }
        writeln!(out, " |")?;
    }
    Ok(())
}
