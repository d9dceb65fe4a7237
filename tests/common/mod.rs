//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use route_mock_server::config::ReloadEvent;
use route_mock_server::lifecycle::startup::build_dispatcher;
use route_mock_server::{HttpServer, ServerConfig, Shutdown};

/// Secret used by every test server.
pub const SECRET: &str = "integration-test-secret";

/// A running server plus the files it was started from.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub shutdown: Shutdown,
    pub reload_tx: mpsc::UnboundedSender<ReloadEvent>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn routes_file(&self) -> PathBuf {
        self.dir.path().join("routes.json")
    }

    pub fn template_root(&self) -> PathBuf {
        self.dir.path().join("responses")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Write `templates` under `responses/` and `routes` as `routes.json` in a
/// fresh temp dir, then start a server on an ephemeral port.
pub async fn start_server(routes: &str, templates: &[(&str, &str)]) -> TestServer {
    start_server_with(routes, templates, |_| {}).await
}

pub async fn start_server_with(
    routes: &str,
    templates: &[(&str, &str)],
    configure: impl FnOnce(&mut ServerConfig),
) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("responses");
    for (name, body) in templates {
        write_file(&root.join(name), body);
    }
    write_file(&dir.path().join("routes.json"), routes);

    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.routes.file = dir.path().join("routes.json").display().to_string();
    config.templates.root = root.display().to_string();
    config.auth.secret = SECRET.into();
    config.cors.allowed_origins = vec!["http://app.example".into()];
    configure(&mut config);

    let dispatcher = build_dispatcher(&config).unwrap();
    let server = HttpServer::new(config, dispatcher);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, reload_rx, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        dir,
        shutdown,
        reload_tx,
        client,
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..40 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
