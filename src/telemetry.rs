//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `rag_harness` logs at `info`, or
/// `debug` when `verbose` is true. A second call is a no-op.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "rag_harness=debug,rag_harness_core=debug"
    } else {
        "rag_harness=info,rag_harness_core=info"
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false);
        init_tracing(true);
        tracing::info!("still logging");
    }
}
