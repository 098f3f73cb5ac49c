//! Shared tracing setup for integration tests.
//!
//! Installs a thread-local fmt subscriber writing through the test
//! harness's capture, so dispatch logs show up next to failing assertions.

use tracing_subscriber::EnvFilter;

pub struct TestTracing {
    _guard: tracing::subscriber::DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("wireroute=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self { _guard: guard }
    }
}
