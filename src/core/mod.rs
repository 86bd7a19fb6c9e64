/*!
 * Core Module
 * Fundamental types, limits, error handling and low-level primitives
 */

pub mod data_structures;
pub mod errors;
pub mod guard;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
pub use types::*;
