//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod dashboard;
pub mod drift;
pub mod entries;
pub mod health;
pub mod reports;

// Re-export all handlers for use in router
pub use dashboard::*;
pub use drift::*;
pub use entries::*;
pub use health::*;
pub use reports::*;
