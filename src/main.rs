//! Route mock server
//!
//! Serves canned responses for configured routes so front ends and API
//! clients can be developed against a stand-in backend.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    MOCK SERVER                        │
//!                     │                                                      │
//!   Client Request    │  ┌─────────┐    ┌────────────┐    ┌──────────────┐   │
//!   ──────────────────┼─▶│  http   │───▶│ dispatcher │───▶│ route table  │   │
//!                     │  │ server  │    │            │    │  (snapshot)  │   │
//!                     │  └─────────┘    └─────┬──────┘    └──────────────┘   │
//!                     │                       │ auth gate → delay → match    │
//!                     │                       ▼                              │
//!   Client Response   │  ┌─────────┐    ┌────────────┐                       │
//!   ◀─────────────────┼──│response │◀───│ templates  │                       │
//!                     │  └─────────┘    └────────────┘                       │
//!                     │                                                      │
//!                     │  admin API · token issuer · watchers · signals       │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use route_mock_server::config::loader::load_config;
use route_mock_server::config::validation::validate_config;
use route_mock_server::lifecycle::startup;
use route_mock_server::observability::logging;
use route_mock_server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "route-mock-server", version)]
#[command(about = "Configurable HTTP mock server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override routes.file
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Override templates.root
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Override observability.log_level
    #[arg(long)]
    log_level: Option<String>,

    /// Check config, routes and templates, then exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(routes) = &self.routes {
            config.routes.file = routes.display().to_string();
        }
        if let Some(templates) = &self.templates {
            config.templates.root = templates.display().to_string();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    args.apply(&mut config);

    if let Err(errors) = validate_config(&config) {
        for error in errors {
            eprintln!("Invalid configuration: {error}");
        }
        return ExitCode::FAILURE;
    }

    logging::init(&config.observability.log_level, config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "route-mock-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes_file = %config.routes.file,
        template_root = %config.templates.root,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if args.validate {
        return match startup::build_dispatcher(&config) {
            Ok(dispatcher) => {
                println!(
                    "OK: {} routes, {} templates ({} failed)",
                    dispatcher.routes().snapshot().len(),
                    dispatcher.templates().len(),
                    dispatcher.templates().failures().len()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Validation failed: {e}");
                if let startup::StartupError::Routes(routes) = &e {
                    for error in routes.errors() {
                        eprintln!("  {error}");
                    }
                }
                ExitCode::FAILURE
            }
        };
    }

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
