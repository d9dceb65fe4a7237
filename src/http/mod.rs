//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers, request ID)
//!     → /token, /api/*, /admin/* handlers
//!     → fallback: request.rs (buffer body) → dispatcher
//!     → response.rs (template + diagnostics headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{X_MOCK_TABLE_VERSION, X_MOCK_TEMPLATE};
pub use server::{AppState, HttpServer};
