//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`inspect`] - Load a capabilities document and describe the source
//! - [`tile`] - Fetch a single height tile

pub mod common;
pub mod inspect;
pub mod tile;
