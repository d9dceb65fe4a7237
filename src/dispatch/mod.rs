//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! MockRequest
//!     → dispatcher.rs (snapshot, route, auth, delay, match, resolve)
//!     → Rendered | DispatchError
//!     → http layer (response, status, diagnostics headers)
//! ```

pub mod dispatcher;
pub mod error;
pub mod request;

pub use dispatcher::{Dispatcher, Rendered, Stage};
pub use error::DispatchError;
pub use request::{BodyError, MockRequest};
