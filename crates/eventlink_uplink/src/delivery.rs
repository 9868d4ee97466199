//! The delivery loop.

use crate::codec::PayloadCodec;
use crate::config::DeviceConfig;
use crate::error::{UplinkError, UplinkResult};
use crate::indicator::{Indicator, IndicatorState};
use crate::transport::Transport;
use eventlink_core::{Clock, EventLog, EventRecord, PullOutcome};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a single delivery cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The log was empty.
    Idle,
    /// The oldest event could not be decoded; it stays in the log.
    Unreadable,
    /// The event was sent and pulled from the log.
    Delivered {
        /// Event ID.
        id: u16,
    },
    /// The event has no uplink frame and was pulled without sending.
    Discarded {
        /// Event ID.
        id: u16,
    },
    /// The send failed; the event stays at the head of the log.
    Retrying {
        /// Event ID.
        id: u16,
        /// Why the send failed.
        reason: String,
    },
    /// The event was sent, but another consumer moved the read cursor, so
    /// it was not pulled.
    Superseded {
        /// Event ID.
        id: u16,
    },
    /// The event log failed.
    Error {
        /// Error message.
        reason: String,
    },
}

impl CycleOutcome {
    /// Returns true if an event left the log in this cycle.
    pub fn removed_event(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Delivered { .. } | CycleOutcome::Discarded { .. }
        )
    }
}

/// Running totals across delivery cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Cycles run.
    pub cycles: u64,
    /// Cycles that found the log empty.
    pub idle: u64,
    /// Events sent and pulled.
    pub delivered: u64,
    /// Events pulled without a frame.
    pub discarded: u64,
    /// Failed send attempts.
    pub failed_sends: u64,
    /// Sent events left in place because the cursor moved.
    pub superseded: u64,
    /// Cycles that could not decode the oldest event.
    pub unreadable: u64,
    /// Event log failures.
    pub errors: u64,
    /// Times an event ID skipped ahead of the previous one.
    pub sequence_gaps: u64,
    /// ID of the last delivered event.
    pub last_delivered_id: Option<u16>,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SequenceState {
    /// ID of the last frame the transport accepted.
    last_sent: Option<u16>,
    /// ID last compared against `last_sent`.
    last_checked: Option<u16>,
}

enum Published {
    Sent,
    NoFrame,
}

/// Drains an [`EventLog`] to a [`Transport`], oldest event first.
///
/// Each cycle peeks the oldest event, sends its frame and pulls the event
/// only after the transport confirmed the send. The event stays in the log
/// on any failure and is retried on the next cycle, indefinitely.
pub struct DeliveryLoop<T: Transport, I: Indicator> {
    config: DeviceConfig,
    log: Arc<EventLog>,
    transport: Arc<T>,
    indicator: Arc<I>,
    codec: PayloadCodec,
    sequence: Mutex<SequenceState>,
    stats: RwLock<DeliveryStats>,
}

impl<T: Transport, I: Indicator> DeliveryLoop<T, I> {
    /// Creates a delivery loop.
    pub fn new(
        config: DeviceConfig,
        log: Arc<EventLog>,
        transport: Arc<T>,
        indicator: Arc<I>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            log,
            transport,
            indicator,
            codec: PayloadCodec::new(clock),
            sequence: Mutex::new(SequenceState::default()),
            stats: RwLock::new(DeliveryStats::default()),
        }
    }

    /// Gets the running totals.
    pub fn stats(&self) -> DeliveryStats {
        self.stats.read().clone()
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Delay before the next cycle: the send interval plus random jitter.
    pub fn next_delay(&self) -> Duration {
        self.config.delivery_delay(rand::thread_rng().gen())
    }

    /// Runs cycles forever, sleeping [`DeliveryLoop::next_delay`] before
    /// each.
    pub fn run(&self) -> ! {
        info!(interval = ?self.config.send_interval, "delivery loop started");
        loop {
            std::thread::sleep(self.next_delay());
            self.run_cycle();
        }
    }

    /// Attempts to deliver the oldest event once.
    pub fn run_cycle(&self) -> CycleOutcome {
        let outcome = match self.try_cycle() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "delivery cycle failed");
                CycleOutcome::Error {
                    reason: e.to_string(),
                }
            }
        };
        self.record(&outcome);
        outcome
    }

    fn try_cycle(&self) -> UplinkResult<CycleOutcome> {
        if !self.log.has_events() {
            debug!("no pending events");
            return Ok(CycleOutcome::Idle);
        }

        let position = self.log.read_position();
        let Some(event) = self.log.peek_next_event()? else {
            error!("unable to peek next event");
            return Ok(CycleOutcome::Unreadable);
        };
        let id = event.id;
        debug!(id, command = event.command, "publishing event");

        let published = match self.publish(&event) {
            Ok(published) => published,
            Err(e) => {
                warn!(id, error = %e, "unable to publish event");
                return Ok(CycleOutcome::Retrying {
                    id,
                    reason: e.to_string(),
                });
            }
        };

        match self.log.pull_next_event_at(position, id)? {
            PullOutcome::Pulled(_) => {}
            PullOutcome::Moved => {
                warn!(id, "read cursor moved during send, not pulling");
                return Ok(CycleOutcome::Superseded { id });
            }
            PullOutcome::Unreadable => {
                error!(id, "unable to pull next event to mark it as sent");
                return Ok(CycleOutcome::Unreadable);
            }
        }

        Ok(match published {
            Published::Sent => {
                debug!(id, "event delivered");
                CycleOutcome::Delivered { id }
            }
            Published::NoFrame => CycleOutcome::Discarded { id },
        })
    }

    fn publish(&self, event: &EventRecord) -> UplinkResult<Published> {
        let Some(frame) = self.codec.encode(event) else {
            warn!(
                id = event.id,
                command = event.command,
                "event has no uplink frame, ignored"
            );
            return Ok(Published::NoFrame);
        };

        let result = self.send(event.id, &frame);
        let state = match result {
            Ok(()) => IndicatorState::Ok,
            Err(_) => IndicatorState::Error,
        };
        self.indicator.set(state);
        result.map(|()| Published::Sent)
    }

    fn send(&self, id: u16, frame: &[u8]) -> UplinkResult<()> {
        if !self.transport.is_joined() {
            return Err(UplinkError::NotJoined);
        }
        self.check_sequence(id);
        debug!(id, len = frame.len(), "sending frame");
        if self.transport.send(frame)? {
            self.sequence.lock().last_sent = Some(id);
            Ok(())
        } else {
            Err(UplinkError::transport_retryable("frame not sent"))
        }
    }

    /// Warns when `id` skips ahead of the last successfully sent ID;
    /// evicted events leave such gaps. Retries of the same event are only
    /// reported once.
    fn check_sequence(&self, id: u16) {
        let mut sequence = self.sequence.lock();
        if sequence.last_checked == Some(id) {
            return;
        }
        sequence.last_checked = Some(id);
        if let Some(last) = sequence.last_sent {
            if u32::from(id) > u32::from(last) + 1 {
                warn!(last, current = id, "event IDs are not in sequence");
                self.stats.write().sequence_gaps += 1;
            }
        }
    }

    fn record(&self, outcome: &CycleOutcome) {
        let mut stats = self.stats.write();
        stats.cycles += 1;
        match outcome {
            CycleOutcome::Idle => stats.idle += 1,
            CycleOutcome::Unreadable => stats.unreadable += 1,
            CycleOutcome::Delivered { id } => {
                stats.delivered += 1;
                stats.last_delivered_id = Some(*id);
            }
            CycleOutcome::Discarded { .. } => stats.discarded += 1,
            CycleOutcome::Retrying { reason, .. } => {
                stats.failed_sends += 1;
                stats.last_error = Some(reason.clone());
            }
            CycleOutcome::Superseded { .. } => stats.superseded += 1,
            CycleOutcome::Error { reason } => {
                stats.errors += 1;
                stats.last_error = Some(reason.clone());
            }
        }
    }
}
