//! # autoreduce testkit
//!
//! Test utilities for autoreduce.
//!
//! This crate provides:
//! - Fixtures: the orders definition, document builders, a recording
//!   result writer, and reopenable indexes in memory or a temp directory
//! - Property-based test generators using proptest
//! - A model-checked integration harness
//!
//! ## Usage
//!
//! ```rust
//! use autoreduce_testkit::prelude::*;
//!
//! with_orders_index(|index| {
//!     index.apply([put("orders/1", order("A", 10))]).unwrap();
//!     assert_eq!(index.map_entry_count(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
