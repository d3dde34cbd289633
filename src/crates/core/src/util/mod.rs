//! Utility layer - shared types and errors

pub mod errors;
pub mod types;
pub mod text;

pub use errors::*;
pub use types::*;
