//! Concrete MessageSink implementations
//!
//! - **BroadcastSink**: in-process fan-out bus for local consumers

pub mod broadcast;

pub use broadcast::{BroadcastSink, DEFAULT_BUS_CAPACITY};
