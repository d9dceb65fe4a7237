//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, query, body)
//!     → router.rs (snapshot, first structural match in stored order)
//!     → matcher.rs (method + path pattern, parameter capture)
//!     → selection.rs (match rule → template name)
//!
//! Table Replacement (admin save, file reload):
//!     RouteDefinition[]
//!     → validation.rs (collect all errors, compile patterns and rules)
//!     → atomic swap of Arc<RouteSnapshot>, version + 1
//! ```
//!
//! # Design Decisions
//! - Routes compiled on replace, immutable once published
//! - No regex in hot path (segment matching only)
//! - Deterministic: same snapshot and input always select the same route
//! - First match wins (stored order)

pub mod definition;
pub mod matcher;
pub mod router;
pub mod selection;
pub mod validation;

pub use definition::{MatchDefinition, MatchSource, RouteDefinition};
pub use matcher::{PathParams, PathPattern};
pub use router::{Route, RouteMatch, RouteSnapshot, RouteTable, RouteTableError};
pub use selection::{Attributes, MatchRule, SelectedBy, Selection, Selector};
pub use validation::{ValidationError, ValidationIssue};
