use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crew_planner::error::SolveError;
use crew_planner::protocol::{self, BuildGroupsRequest, ErrorReport, LegSolveRequest};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Which request type stdin carries, one JSON document per line
    #[arg(long, value_enum, default_value_t = Mode::SolveLeg)]
    mode: Mode,
    /// Seed for leg solves; overrides the request options
    #[arg(long, env = "CREW_PLANNER_SEED")]
    seed: Option<u64>,
    /// Seconds per leg; overrides the request options
    #[arg(long)]
    time_limit: Option<u64>,
    /// Worker threads for candidate expansion
    #[arg(long, default_value_t = 8)]
    workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    BuildGroups,
    SolveLeg,
}

enum Failure {
    Malformed(ErrorReport),
    Solve(ErrorReport),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(Failure::Malformed(report))) => fail(&report, 2),
        Ok(Some(Failure::Solve(report))) => fail(&report, 1),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<Option<Failure>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cli.workers)
        .build()
        .context("failed to start worker pool")?;

    pool.install(|| {
        let stdin = io::stdin();
        let mut stdout = io::stdout().lock();

        for line in stdin.lock().lines() {
            let line = line.context("failed to read request")?;
            if line.trim().is_empty() {
                continue;
            }

            let outcome = match cli.mode {
                Mode::BuildGroups => handle_build_groups(&line),
                Mode::SolveLeg => handle_solve_leg(cli, &line),
            };
            match outcome {
                Ok(response) => {
                    serde_json::to_writer(&mut stdout, &response).context("failed to encode response")?;
                    writeln!(stdout)?;
                    stdout.flush()?;
                }
                Err(failure) => return Ok(Some(failure)),
            }
        }

        Ok(None)
    })
}

fn handle_build_groups(line: &str) -> Result<serde_json::Value, Failure> {
    let request: BuildGroupsRequest = parse(line)?;
    let response = protocol::build_groups(&request).map_err(solve_failure)?;
    encode(&response)
}

fn handle_solve_leg(cli: &Cli, line: &str) -> Result<serde_json::Value, Failure> {
    let mut request: LegSolveRequest = parse(line)?;
    if cli.seed.is_some() {
        request.options.seed = cli.seed;
    }
    if let Some(limit) = cli.time_limit {
        request.options.time_limit_secs = limit;
    }

    let response = protocol::solve_leg(&request).map_err(solve_failure)?;
    encode(&response)
}

fn parse<T: serde::de::DeserializeOwned>(line: &str) -> Result<T, Failure> {
    serde_json::from_str(line).map_err(|err| Failure::Malformed(ErrorReport::malformed(err.to_string())))
}

fn encode<T: Serialize>(response: &T) -> Result<serde_json::Value, Failure> {
    serde_json::to_value(response).map_err(|err| Failure::Malformed(ErrorReport::malformed(err.to_string())))
}

/// Request errors are the caller's input, everything else a solve failure.
fn solve_failure(err: SolveError<String>) -> Failure {
    let report = ErrorReport::from(&err);
    match err {
        SolveError::InvalidRequest(_) => Failure::Malformed(report),
        _ => Failure::Solve(report),
    }
}

fn fail(report: &ErrorReport, code: u8) -> ExitCode {
    match serde_json::to_string(report) {
        Ok(json) => eprintln!("{json}"),
        Err(err) => tracing::error!(%err, "failed to encode error report"),
    }
    ExitCode::from(code)
}
