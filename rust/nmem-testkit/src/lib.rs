//! Test utilities for the nmem crates.
//!
//! - [`CountingRuntime`]: a native runtime that counts allocations and frees per heap,
//!   and can be told to fail allocations.
//! - [`PressureGauge`]: a memory pressure sink that keeps the running balance.
//! - [`data_gen`]: byte patterns for stream and array tests.

pub mod data_gen;
pub mod runtime;

pub use runtime::{CountingRuntime, PressureGauge};
