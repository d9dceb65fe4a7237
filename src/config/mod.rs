//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!
//! routes file (JSON)
//!     → loader.rs (load_routes / save_routes)
//!     → RouteTable::replace
//!
//! On change (watcher.rs) or SIGHUP:
//!     → ReloadEvent over an mpsc channel
//!     → server applies routes / rescans templates
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only routes and templates hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_routes, save_routes, ConfigError};
pub use schema::{ListenerConfig, ServerConfig, TlsConfig};
pub use watcher::{ReloadEvent, ReloadWatcher};
