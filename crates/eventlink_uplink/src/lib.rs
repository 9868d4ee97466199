//! # EventLink Uplink
//!
//! Delivery of logged events over an intermittent radio link.
//!
//! This crate provides:
//! - [`Transport`] - the uplink collaborator, with [`MockTransport`] and a
//!   lossy [`LoopbackTransport`]
//! - [`PayloadCodec`] - compact uplink frames for each event type
//! - [`DeliveryLoop`] - the peek, send, pull cycle that drains an event log
//! - [`Scheduler`] - timer threads posting [`Task`]s to the main loop
//! - [`DeviceConfig`] - intervals and uplink settings
//!
//! ## Delivery Model
//!
//! Events are delivered **at least once**, strictly oldest first:
//! 1. Peek the oldest event
//! 2. Send its frame
//! 3. Pull it from the log only after the send was confirmed
//!
//! A failed send leaves the event at the head of the log; the next cycle
//! retries it. Nothing is ever skipped by the delivery side.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod delivery;
mod error;
mod indicator;
mod schedule;
mod transport;

pub use codec::{hex, PayloadCodec, TAG_FRAME};
pub use config::{DeviceConfig, UplinkMode};
pub use delivery::{CycleOutcome, DeliveryLoop, DeliveryStats};
pub use error::{UplinkError, UplinkResult};
pub use indicator::{Indicator, IndicatorState, NoopIndicator, RecordingIndicator};
pub use schedule::{Scheduler, Task};
pub use transport::{LoopbackTransport, MockReply, MockTransport, Transport};
