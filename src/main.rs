use anyhow::Result;
use blockmerge::pipeline::print_run_summary;
use blockmerge::utils::{setup_logging, validate_args};
use blockmerge::{init_default_config, run, Args};
use clap::Parser;
use tracing::error;

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    if args.init {
        return init_default_config();
    }

    validate_args(&args)?;

    let config = args.config()?;
    let paths = args.paths();

    match run(&config, &paths) {
        Ok(outcome) => {
            print_run_summary(&outcome.stats);
            Ok(())
        }
        Err(e) => {
            error!(action = "failed", component = "pipeline", error = ?e, "Block list build failed");
            std::process::exit(1);
        }
    }
}
