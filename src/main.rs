use clap::Parser;
use pivotrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    pivotrader::logging::init_logging();
    run(Cli::parse())
}
