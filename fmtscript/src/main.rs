use std::process::ExitCode;

use clap::Parser;
use log::{debug, LevelFilter};

use fmtscript::cli::{self, CliArgs};
use fmtscript::Format;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .init();

    let config = match cli::resolve_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fmtscript: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("config: {config:?}");

    let store = cli::build_store(&args.args);
    let result = Format::compile_with(&args.format, &config).and_then(|f| f.render(&store));
    match result {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
