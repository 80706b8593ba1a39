//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use jetdb::{JetFormat, MemPageStore, PageStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static TRACING: Once = Once::new();

/// Routes `tracing` output to the test writer. Set `RUST_LOG=jetdb=trace` to
/// see page splits and cursor restores.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "jetdb=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// In-memory store with 1 KiB pages so that trees grow deep quickly.
pub fn small_store() -> Arc<dyn PageStore> {
    Arc::new(MemPageStore::new(JetFormat::with_page_size(1024).unwrap()))
}
