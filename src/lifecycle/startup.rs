//! Startup orchestration.
//!
//! Order: metrics, route table, templates, auth gate, watchers, signals,
//! then the listener last so traffic only arrives once everything is ready.
//! Any error before the listener is bound is fatal.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::loader::{load_routes, ConfigError};
use crate::config::schema::{ServerConfig, PLACEHOLDER_SECRET};
use crate::config::watcher::ReloadWatcher;
use crate::dispatch::Dispatcher;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handlers;
use crate::observability::metrics;
use crate::routing::{RouteDefinition, RouteTable, RouteTableError};
use crate::security::BearerJwtGate;
use crate::templates::{DirectorySource, TemplateStore};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("initial route table rejected: {0}")]
    Routes(#[from] RouteTableError),

    #[error("cannot load templates from {root}: {source}")]
    Templates {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid address {0:?}")]
    Address(String),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("file watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Initial definitions from the routes file. A missing file starts an empty
/// table that the admin API can fill.
pub fn initial_routes(path: &Path) -> Result<Vec<RouteDefinition>, StartupError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Routes file not found, starting with an empty table");
        return Ok(Vec::new());
    }
    Ok(load_routes(path)?)
}

/// Build the route table, template store and auth gate from config.
pub fn build_dispatcher(config: &ServerConfig) -> Result<Dispatcher, StartupError> {
    let definitions = initial_routes(Path::new(&config.routes.file))?;
    // A delay at or past the request timeout could never be answered.
    let routes = RouteTable::with_max_delay(Duration::from_secs(config.timeouts.request_secs));
    routes.replace(definitions)?;
    metrics::record_table_version(routes.version());

    let root = PathBuf::from(&config.templates.root);
    let templates = TemplateStore::load(
        DirectorySource::new(&root),
        config.templates.default_content_type.clone(),
    )
    .map_err(|source| StartupError::Templates {
        root: root.clone(),
        source,
    })?;
    let failures = templates.failures();
    for (name, reason) in &failures {
        tracing::warn!(template = %name, reason = %reason, "Template failed to load");
    }

    tracing::info!(
        routes = routes.snapshot().len(),
        templates = templates.len(),
        template_failures = failures.len(),
        "Mock state initialized"
    );

    if config.auth.secret == PLACEHOLDER_SECRET {
        tracing::warn!("auth.secret is the built-in placeholder; set a real secret outside local testing");
    }
    let gate = BearerJwtGate::new(config.auth.secret.as_bytes());

    Ok(Dispatcher::new(Arc::new(routes), Arc::new(templates), Arc::new(gate)))
}

/// Start every subsystem and serve until a shutdown signal arrives.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let dispatcher = build_dispatcher(&config)?;
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();

    // Kept alive until the server returns.
    let _watcher = if config.routes.watch || config.templates.watch {
        let mut watcher = ReloadWatcher::new(reload_tx.clone());
        if config.routes.watch {
            watcher = watcher.routes_file(&config.routes.file);
        }
        if config.templates.watch {
            watcher = watcher.template_root(&config.templates.root);
        }
        Some(watcher.run()?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handlers(
        shutdown.clone(),
        reload_tx,
        Some(PathBuf::from(&config.routes.file)),
    );

    let bind_address = config.listener.bind_address.clone();
    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config, dispatcher);

    let result = match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address
                .parse()
                .map_err(|_| StartupError::Address(bind_address.clone()))?;
            server.run_tls(addr, &tls, reload_rx, shutdown.subscribe()).await
        }
        None => {
            let listener = TcpListener::bind(&bind_address)
                .await
                .map_err(|source| StartupError::Bind {
                    addr: bind_address.clone(),
                    source,
                })?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, reload_rx, shutdown.subscribe()).await
        }
    };

    signals.abort();
    result.map_err(StartupError::from)
}
