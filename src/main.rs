use clap::Parser;
use scrape::html::ByteSource;
use scrape::run::{CliOptions, Error, OsFacade};
use std::io;
use std::io::{stdin, stdout, Read};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

struct RealOs;

impl ByteSource for RealOs {
    fn read_stdin(&self) -> io::Result<Vec<u8>> {
        let mut contents = Vec::new();
        stdin().read_to_end(&mut contents)?;
        Ok(contents)
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[doc(hidden)]
impl OsFacade for RealOs {
    fn stdout(&mut self) -> impl io::Write {
        stdout().lock()
    }

    fn write_error(&mut self, err: Error) {
        eprint!("{err}")
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SCRAPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match CliOptions::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here too.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging();

    if scrape::run::run(&cli.into(), &mut RealOs) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
