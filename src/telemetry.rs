//! Logging setup
//!
//! The engines log through `tracing`. Hosts that already install a
//! subscriber need nothing from here; others can call [`init_tracing`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "cosmosdb_persistence=info";

/// Install a formatted subscriber filtered by `RUST_LOG`
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing();
        assert!(!init_tracing());
    }
}
