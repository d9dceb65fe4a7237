//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin policy, preflight)
//!     → [route matched by dispatcher]
//!     → auth.rs (gate check, only for routes flagged `auth`)
//!         → jwt.rs (HS256 bearer verification)
//! ```
//!
//! # Design Decisions
//! - Fail closed: any credential problem rejects the request
//! - Stateless: no sessions, every request is checked on its own
//! - Pluggable: the gate is a trait object

pub mod auth;
pub mod cors;
pub mod jwt;

pub use auth::{AllowAll, AuthError, AuthGate, BearerJwtGate, DenyAll};
