//! Shared test harness for integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use tempfile::TempDir;

use shopsync_service::crypto::hmac_sha256_hex;
use shopsync_service::{
    create_router, AppState, EventProcessor, QueueWorker, ServiceConfig,
};
use shopsync_store::RocksStore;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// A fully wired service over a temp store, plus direct store access for
/// assertions and a worker handle to drain the queue deterministically.
pub struct TestHarness {
    pub server: TestServer,
    pub store: Arc<RocksStore>,
    worker: QueueWorker,
    _data_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_source_url(None)
    }

    /// Point the commerce client at a stub server (wiremock).
    pub fn with_source_url(source_base_url: Option<String>) -> Self {
        let data_dir = TempDir::new().expect("temp dir");
        let config = ServiceConfig {
            data_dir: data_dir.path().to_string_lossy().into_owned(),
            webhook_secret: Some(WEBHOOK_SECRET.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            source_base_url,
            ..ServiceConfig::default()
        };

        let store = Arc::new(RocksStore::open(data_dir.path()).expect("open store"));
        let state = AppState::new(Arc::clone(&store), config).expect("app state");

        let worker = QueueWorker::new(
            Arc::clone(&state.store),
            EventProcessor::new(Arc::clone(&state.store)),
            state.queue.notify_handle(),
            Duration::from_millis(50),
        );

        let server = TestServer::new(create_router(state)).expect("test server");

        Self {
            server,
            store,
            worker,
            _data_dir: data_dir,
        }
    }

    /// Process everything currently in the queue.
    pub async fn drain_queue(&self) {
        self.worker.drain_due().await.expect("drain queue");
    }

    /// Sign a webhook body the way the source platform does.
    pub fn sign(body: &str) -> String {
        hmac_sha256_hex(WEBHOOK_SECRET, body)
    }
}
