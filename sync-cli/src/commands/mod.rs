//! CLI command implementations.

pub mod cursor;
pub mod filter;
pub mod replay;
