//! # Telemetry
//!
//! Structured logging for hosts embedding the checkout screen.
//!
//! ```text
//! RUST_LOG unset  ─► "info,pos_terminal=debug"
//! RUST_LOG=trace  ─► every frame the decoder rejects is logged too
//! ```

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,pos_terminal=debug";

/// Installs the global fmt subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place and return false.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        assert!(!init_tracing());
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
