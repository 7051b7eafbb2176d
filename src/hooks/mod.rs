// Commit hook registry and the types that flow through it

pub mod error;
pub mod registry;

// Re-export core types
pub use error::*;
pub use registry::*;
