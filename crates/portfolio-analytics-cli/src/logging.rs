// Stderr tracing setup; stdout stays reserved for command output
use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding an `EnvFilter` directive, e.g. `PFA_LOG=debug`.
pub const LOG_ENV: &str = "PFA_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

pub fn init_logging(verbose: bool) {
    let directive = filter_directive(env::var(LOG_ENV).ok(), verbose);
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let console_layer = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter);

    // The host may already have installed a subscriber
    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}

fn filter_directive(from_env: Option<String>, verbose: bool) -> String {
    let base = from_env
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string());
    if verbose {
        format!("{},portfolio_analytics_core=debug,pfa=debug", base)
    } else {
        base
    }
}
