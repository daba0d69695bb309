//! CLI entry point: parse configuration, validate it, run the dispatcher to
//! completion, and report the end-of-run summary.

use ratelimited_dispatch::dispatcher::Dispatcher;
use ratelimited_dispatch::Config;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging_level))
        .init();

    if let Err(err) = config.validate() {
        error!("{err}");
        std::process::exit(1);
    }

    let dispatcher = match Dispatcher::new(config).await {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            error!("failed to start dispatcher: {err}");
            std::process::exit(1);
        }
    };

    // A non-zero count of failed *requests* is not a dispatcher failure —
    // per-request outcomes are reported in the summary log line and the
    // results file, not the process exit code. Only a fatal error (a
    // malformed input line, an I/O failure) aborts the run early.
    if let Err(err) = dispatcher.run().await {
        error!("dispatcher aborted: {err}");
        std::process::exit(1);
    }
}
