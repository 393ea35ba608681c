//! Test fixtures for simheap development.
//!
//! Provides ready-made registries and graph builders so tests across
//! the workspace exercise the same shapes: the stress-test record with
//! an array of every value type, and a linked `Node` chain.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{NodeFixture, StressFixture, ARRAY_FIELDS, NEXT, TEST_TYPE_FIELDS};
