use std::io::ErrorKind;
use std::process;

use clap::Parser;
use cli::{Args, Command};
use error::{Co2setError, Co2setResult};
use jemallocator::Jemalloc;
use polars::error::PolarsError;
use project::Project;
use rayon::ThreadPoolBuilder;

pub(crate) mod prelude {
    pub(crate) use crate::config::{Config, Runtime};
    pub(crate) use crate::error::{
        bail, Co2setError, Co2setResult,
    };
    pub(crate) use crate::progress::ProgressBarBuilder;
    pub(crate) use crate::project::Project;
}

mod aliases;
mod cli;
mod codebook;
mod commands;
mod config;
mod derive;
mod error;
mod export;
mod merge;
mod progress;
mod project;
mod source;
mod unit;
mod utils;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn num_threads(args: &Args) -> usize {
    if let Some(num_threads) = args.num_jobs {
        return num_threads;
    }

    if let Ok(config) = Project::discover().and_then(|p| p.config()) {
        if let Some(runtime) = config.runtime {
            if let Some(num_threads) = runtime.num_jobs {
                return num_threads;
            }
        }
    }

    0
}

fn run(args: Args) -> Co2setResult<()> {
    match args.cmd {
        Command::Build(cmd) => cmd.execute(),
        Command::Check(cmd) => cmd.execute(),
        Command::Completions(cmd) => cmd.execute(),
        Command::Config(cmd) => cmd.execute(),
        Command::Entities(cmd) => cmd.execute(),
        Command::Init(cmd) => cmd.execute(),
        Command::Sources(cmd) => cmd.execute(),
        Command::Version(cmd) => cmd.execute(),
    }
}

fn main() {
    let args = Args::parse();

    ThreadPoolBuilder::new()
        .num_threads(num_threads(&args))
        .build_global()
        .unwrap();

    match run(args) {
        Ok(()) => process::exit(0),
        Err(Co2setError::IO(e))
            if e.kind() == ErrorKind::BrokenPipe =>
        {
            process::exit(0)
        }
        Err(Co2setError::Polars(PolarsError::IO {
            error, ..
        })) if error.kind() == ErrorKind::BrokenPipe => {
            process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
