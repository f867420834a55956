/// Core Module
///
/// Shared infrastructure of the contacts store: backend capabilities, the
/// database access layer and error handling.

pub mod backend;
pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use backend::{Backend, Capabilities, Dialect, IsolationSyntax};
pub use error::{Result, StoreError};
