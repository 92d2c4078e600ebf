//! # Echo Probe - Round-Trip Connectivity Check
//!
//! ## Purpose
//!
//! Sends one echo request from the device to the hub, then listens on every
//! partition of the hub's event stream for the same payload coming back.
//! The probe succeeds as soon as any partition sees it; every other partition
//! stops at its next poll step.
//!
//! ## Integration Points
//!
//! - **Upstream**: [`sender`] publishes the request over HTTP, AMQP or MQTT
//! - **Downstream**: [`network::AmqpConnector`] opens one filtered receiver
//!   link per partition
//! - **Local bus**: notices for request, reply, rejection, timeout and the
//!   final summary go to a [`message_sink::MessageSink`]
//!
//! ## Architecture Role
//!
//! ```text
//! EchoProbe ─send─▶ EchoSender
//!     │
//!     └─▶ EchoCoordinator ─spawn N─▶ PartitionPoller ─▶ ReceiverLink
//!                │                        │
//!                │                        └─▶ classify ─▶ CompletionSignal
//!                └─ join all, aggregate ─▶ ProbeReport
//! ```

pub mod classifier;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod notice;
pub mod outcome;
pub mod partition;
pub mod poller;
pub mod probe;
pub mod sender;
pub mod signal;
pub mod test_utils;

pub use classifier::{classify, Classification, Disposition};
pub use coordinator::EchoCoordinator;
pub use error::{ProbeError, Result};
pub use filter::{build_filter, FilterWindow};
pub use outcome::{Outcome, PartitionReport, ProbeReport};
pub use partition::PartitionContext;
pub use poller::{PartitionPoller, PollerSettings, PollerState};
pub use probe::EchoProbe;
pub use sender::{sender_for, DeviceConnectionString, EchoRequest, EchoSender};
pub use signal::CompletionSignal;
