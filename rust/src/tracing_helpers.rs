//! Logging macros for the tree engine.
//!
//! With the `tracing` feature (on by default) these forward to the `tracing`
//! crate. Without it they expand to nothing, so hot paths such as splits and
//! merges carry no logging cost.
//!
//! ```bash
//! # Structural events from a test run
//! RUST_LOG=pbtree=trace cargo test --test tree_proptests
//!
//! # No logging code at all
//! cargo build --release --no-default-features
//! ```

#![allow(unused_macros, unused_imports)]

/// Trace-level logging for per-node structural events.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

/// Debug-level logging for whole-tree operations.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// Warn-level logging for rejected input and ignored requests.
#[cfg(feature = "tracing")]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_log {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_log;
pub(crate) use trace_log;
pub(crate) use warn_log;
