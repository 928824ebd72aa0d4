#![allow(dead_code)]

use podlink::client::RequestService;
use podlink::{AttachedStream, Attachment, ExecClient, ExecConfig};
use podlink_test_utils::StubEngine;
use std::sync::Arc;
use tokio::io::DuplexStream;

/// Container every test targets unless it scripts its own.
pub const CONTAINER: &str = "box1";

/// Stub engine plus a client wired to it.
pub struct TestContext {
    pub engine: Arc<StubEngine>,
    pub client: ExecClient,
}

/// Route client tracing to the test writer. Silent unless RUST_LOG is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_test_writer()
        .try_init();
}

pub fn running_engine() -> TestContext {
    init_tracing();
    let engine = Arc::new(StubEngine::with_running(CONTAINER));
    let svc: Arc<dyn RequestService> = engine.clone();
    let client = ExecClient::new(svc);
    TestContext { engine, client }
}

impl TestContext {
    pub async fn create(&self, config: &ExecConfig) -> String {
        self.client
            .create(CONTAINER, config)
            .await
            .expect("exec create failed")
    }

    /// Create, attach interactively, and hand back the simulated peer.
    pub async fn attach_interactive(
        &self,
        config: &ExecConfig,
    ) -> (String, AttachedStream, DuplexStream) {
        let exec_id = self.create(config).await;
        let attachment = self
            .client
            .attach(&exec_id, config.mode())
            .await
            .expect("attach failed");

        let stream = match attachment {
            Attachment::Interactive(stream) => stream,
            Attachment::Detached => panic!("expected interactive attachment"),
        };
        let peer = self.engine.take_peer().expect("no peer after upgrade");
        (exec_id, stream, peer)
    }
}
