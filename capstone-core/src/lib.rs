//! Capstone Core - Entity Types and Workflow Rules
//!
//! Data structures, error types and the pure rules of the thesis topic
//! workflow. All other crates depend on this. Nothing here performs I/O;
//! storage and collaborators are reached through traits.

mod collaborators;
mod config;
mod entities;
mod enums;
mod error;
mod identity;
mod lifecycle;
mod milestone;

pub use collaborators::*;
pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use lifecycle::*;
pub use milestone::*;
