//! relaxa - run relaxation experiment sweeps over a worker group.
//!
//! # Examples
//!
//! ```bash
//! # 4 worker threads, sizes 100..=500, 3 repeats each, records appended to Evaluation/threads.csv
//! relaxa --workers 4 --steps 5 --repeats 3
//!
//! # one worker per MPI process, 1-D line layout
//! mpiexec -n 8 relaxa --backend mpi --layout line --n 1000000 --steps 10
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relaxa::config::{ExecutionMode, Layout, RelaxOptions, SweepOptions};
use relaxa::context::{gather_grid, run_relaxation};
use relaxa::error::RelaxError;
use relaxa::parallel::{run_threads, Comm, UniverseComm};
use relaxa::report::{write_grid, BlockReport, CsvSink, RunRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// One worker per thread in this process
    Threads,
    /// One worker per MPI process (needs the `mpi` feature)
    Mpi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Plane,
    Line,
}

/// Distributed stencil relaxation benchmark
#[derive(Parser, Debug)]
#[command(name = "relaxa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Messaging backend
    #[arg(long, value_enum, default_value = "threads")]
    backend: Backend,

    /// Worker threads (threads backend only; MPI takes the world size)
    #[arg(
        short,
        long,
        default_value_t = 4,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    workers: usize,

    /// Grid layout
    #[arg(long, value_enum, default_value = "plane")]
    layout: LayoutArg,

    /// Base problem size; step i runs with n * i
    #[arg(short, long, default_value_t = 100)]
    n: usize,

    /// Heat value seeded at the source cell
    #[arg(long)]
    heat: Option<f64>,

    /// Convergence epsilon
    #[arg(long)]
    eps: Option<f64>,

    /// Number of sweep steps
    #[arg(long, default_value_t = 1)]
    steps: usize,

    /// Runs per problem size
    #[arg(long, default_value_t = 1)]
    repeats: usize,

    /// Stop unconverged runs after this many generations
    #[arg(long)]
    max_generations: Option<usize>,

    /// Relax each worker's rows on a thread pool
    #[arg(long)]
    parallel_kernel: bool,

    /// Threads per worker for --parallel-kernel (default: cores / workers)
    #[arg(long, requires = "parallel_kernel")]
    kernel_threads: Option<usize>,

    /// Directory receiving the CSV records
    #[arg(long, default_value = "Evaluation")]
    out_dir: PathBuf,

    /// CSV file name (without extension); defaults to the backend name
    #[arg(long)]
    name: Option<String>,

    /// Start a new CSV file with a column header line
    #[arg(long)]
    header: bool,

    /// Skip the per-worker report block printed after every run
    #[arg(long)]
    no_report: bool,

    /// Print the final grid after every run (small n only)
    #[arg(long)]
    dump_grid: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> RelaxOptions {
        let base = match self.layout {
            LayoutArg::Plane => RelaxOptions { layout: Layout::Plane, ..Default::default() },
            LayoutArg::Line => RelaxOptions::line(self.n),
        };
        RelaxOptions {
            n: self.n,
            heat: self.heat.unwrap_or(base.heat),
            eps: self.eps.unwrap_or(base.eps),
            execution: if self.parallel_kernel {
                ExecutionMode::Parallel { threads: self.kernel_threads }
            } else {
                ExecutionMode::Serial
            },
            max_generations: self.max_generations,
            ..base
        }
    }

    fn sweep(&self) -> SweepOptions {
        SweepOptions { base_n: self.n, steps: self.steps, repeats: self.repeats }
    }

    fn csv_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| match self.backend {
            Backend::Threads => "threads".to_string(),
            Backend::Mpi => "mpi".to_string(),
        })
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Recoverable output failures are logged; anything else stops the sweep.
fn tolerate(result: Result<(), RelaxError>, what: &str) -> Result<(), RelaxError> {
    match result {
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "{what} failed; continuing");
            Ok(())
        }
        other => other,
    }
}

/// Runs the whole sweep on one worker. Collective over `comm`.
fn sweep<C: Comm>(comm: &C, cli: &Cli) -> Result<(), RelaxError> {
    let template = cli.options();
    let mut sink = if comm.rank() == 0 {
        match CsvSink::open(&cli.out_dir, &cli.csv_name(), cli.header) {
            Ok(sink) => {
                info!(path = %sink.path().display(), "appending records");
                Some(sink)
            }
            Err(e) => {
                warn!(error = %e, "cannot open csv sink; records go to the log only");
                None
            }
        }
    } else {
        None
    };

    for n in cli.sweep().sizes() {
        let options = template.with_n(n);
        let outcome = run_relaxation(comm, &options)?;
        if !cli.no_report {
            let report = BlockReport::new(comm.size(), &options, &outcome);
            tolerate(report.write_to(&mut std::io::stdout().lock()), "report")?;
        }
        if cli.dump_grid {
            if let Some(grid) = gather_grid(comm, &outcome)? {
                tolerate(write_grid(&mut std::io::stdout().lock(), &grid), "grid dump")?;
            }
        }
        if comm.rank() == 0 {
            let record = RunRecord::new(comm.size(), &options, &outcome);
            info!(%record, "run complete");
            if let Some(sink) = sink.as_mut() {
                tolerate(sink.append(&record), "csv append")?;
            }
        }
        // keep unrelated runs' traffic apart
        comm.barrier()?;
    }
    if comm.rank() == 0 {
        tolerate(std::io::stdout().flush().map_err(RelaxError::from), "flush")?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.backend {
        Backend::Threads => {
            let results =
                run_threads(cli.workers, |comm| sweep(&UniverseComm::Threads(comm), &cli));
            let mut status = ExitCode::SUCCESS;
            for (rank, result) in results.into_iter().enumerate() {
                if let Err(e) = result {
                    error!(rank, error = %e, "worker failed");
                    status = ExitCode::FAILURE;
                }
            }
            status
        }
        #[cfg(feature = "mpi")]
        Backend::Mpi => {
            let comm = match relaxa::parallel::MpiComm::new() {
                Ok(comm) => UniverseComm::Mpi(comm),
                Err(e) => {
                    error!(error = %e, "MPI initialisation failed");
                    return ExitCode::FAILURE;
                }
            };
            match sweep(&comm, &cli) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(rank = comm.rank(), error = %e, "worker failed");
                    if let UniverseComm::Mpi(mpi) = &comm {
                        // a lone failing rank would leave its peers blocked forever
                        mpi.abort(1);
                    }
                    ExitCode::FAILURE
                }
            }
        }
        #[cfg(not(feature = "mpi"))]
        Backend::Mpi => {
            error!("this build has no MPI support; rebuild with `--features mpi`");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_are_rejected() {
        assert!(Cli::try_parse_from(["relaxa", "--workers", "0"]).is_err());
        let cli = Cli::try_parse_from(["relaxa", "--workers", "1"]).unwrap();
        assert_eq!(cli.workers, 1);
    }

    #[test]
    fn report_is_on_and_header_off_by_default() {
        let cli = Cli::try_parse_from(["relaxa"]).unwrap();
        assert!(!cli.no_report);
        assert!(!cli.header);
        assert!(!cli.dump_grid);
    }

    #[test]
    fn only_output_failures_are_tolerated() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(tolerate(Err(RelaxError::from(io)), "report").is_ok());
        let link = RelaxError::CommunicationFailure("peer gone".to_string());
        assert!(matches!(
            tolerate(Err(link), "grid dump"),
            Err(RelaxError::CommunicationFailure(_))
        ));
    }
}
