pub mod builders;
pub mod fake_executor;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing once for the whole test binary.
///
/// Uses `with_test_writer()`, so output is captured per test and the harness
/// only prints it for failing tests (or under `-- --nocapture`). Levels come
/// from the environment, e.g. `RUST_LOG=workdag=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound a scheduler future with a 5-second deadline.
///
/// Wave execution must always terminate (every wave barrier resolves once
/// its operations finish), so a hang here is a scheduler bug, not a slow
/// test.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("scheduler future did not finish within 5 seconds")
}
