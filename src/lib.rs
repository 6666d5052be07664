pub mod args;
pub mod churn;
pub mod config;
pub mod exclusion;
pub mod fetch;
pub mod history;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod ranker;
pub mod reducer;
pub mod registry;
pub mod state;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use config::{init_default_config, Config, Source};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use pipeline::{run, run_with_fetcher, RunOutcome, RunPaths};
pub use ranker::FinalList;
pub use registry::{DomainRecord, Registry};
pub use stats::RunStats;
