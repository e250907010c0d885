use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "lazarus_live=error";

/// Installs the global subscriber. Output goes to stderr so it never mixes
/// with the interactive session on stdout. `RUST_LOG` overrides the filter;
/// `--verbose` raises the crate to `debug`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "lazarus_live=debug" } else { DEFAULT_FILTER };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
