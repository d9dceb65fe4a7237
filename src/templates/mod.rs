//! Response template subsystem.
//!
//! # Data Flow
//! ```text
//! content root (files, or any TemplateSource)
//!     → source.rs (list names, read bytes)
//!     → store.rs (parse sidecars, build catalog, atomic swap)
//!     → resolve(name) on the serving path
//! ```

pub mod source;
pub mod store;

pub use source::{DirectorySource, MemorySource, TemplateSource};
pub use store::{ReloadReport, Template, TemplateError, TemplateStore, META_SUFFIX};
