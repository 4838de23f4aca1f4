//! Shared test utilities for the WFS paging workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Request documents and KVP parameter sets
//! - GeoJSON layer generators and on-disk layer directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod layers;

pub use fixtures::*;
pub use layers::*;
