//! Uplink transport abstraction.

use crate::error::{UplinkError, UplinkResult};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// An uplink that carries event frames off the device.
///
/// This trait abstracts the radio, allowing for different implementations
/// (LoRaWAN, loopback for simulation, mock for testing).
pub trait Transport: Send + Sync {
    /// Sends one frame.
    ///
    /// Returns `Ok(true)` once the frame was handed to the network and
    /// `Ok(false)` if it was not sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio failed.
    fn send(&self, payload: &[u8]) -> UplinkResult<bool>;

    /// Checks if the device has joined the network.
    fn is_joined(&self) -> bool;
}

/// Scripted result of a [`MockTransport`] send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReply {
    /// The frame was sent.
    Sent,
    /// The frame was not sent.
    NotSent,
    /// The radio reported a retryable error.
    Error,
}

/// A mock transport for testing.
///
/// Replies are taken from a queue; once it is empty every send succeeds.
#[derive(Debug)]
pub struct MockTransport {
    joined: AtomicBool,
    replies: Mutex<VecDeque<MockReply>>,
    sent: Mutex<Vec<Vec<u8>>>,
    attempts: Mutex<usize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a joined mock transport.
    pub fn new() -> Self {
        Self {
            joined: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
        }
    }

    /// Sets the joined state.
    pub fn set_joined(&self, joined: bool) {
        self.joined.store(joined, Ordering::SeqCst);
    }

    /// Queues replies for the next sends.
    pub fn push_replies(&self, replies: impl IntoIterator<Item = MockReply>) {
        self.replies.lock().extend(replies);
    }

    /// Frames that were sent successfully, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Number of send calls, successful or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

impl Transport for MockTransport {
    fn send(&self, payload: &[u8]) -> UplinkResult<bool> {
        *self.attempts.lock() += 1;
        if !self.is_joined() {
            return Err(UplinkError::NotJoined);
        }
        match self.replies.lock().pop_front().unwrap_or(MockReply::Sent) {
            MockReply::Sent => {
                self.sent.lock().push(payload.to_vec());
                Ok(true)
            }
            MockReply::NotSent => Ok(false),
            MockReply::Error => Err(UplinkError::transport_retryable("mock radio failure")),
        }
    }

    fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }
}

/// An in-process uplink that drops a fraction of frames.
///
/// Used by the simulator to exercise retries without a radio.
#[derive(Debug)]
pub struct LoopbackTransport {
    loss: f64,
    rng: Mutex<StdRng>,
    delivered: Mutex<Vec<Vec<u8>>>,
    dropped: Mutex<u64>,
}

impl LoopbackTransport {
    /// Creates a loopback that loses each frame with probability `loss`.
    pub fn new(loss: f64) -> Self {
        Self::with_rng(loss, StdRng::from_entropy())
    }

    /// Creates a loopback with a reproducible loss pattern.
    pub fn with_seed(loss: f64, seed: u64) -> Self {
        Self::with_rng(loss, StdRng::seed_from_u64(seed))
    }

    fn with_rng(loss: f64, rng: StdRng) -> Self {
        Self {
            loss: loss.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
            delivered: Mutex::new(Vec::new()),
            dropped: Mutex::new(0),
        }
    }

    /// Frames that reached the other end, in order.
    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.delivered.lock().clone()
    }

    /// Number of frames lost.
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock()
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, payload: &[u8]) -> UplinkResult<bool> {
        if self.rng.lock().gen::<f64>() < self.loss {
            *self.dropped.lock() += 1;
            return Err(UplinkError::transport_retryable("frame lost"));
        }
        self.delivered.lock().push(payload.to_vec());
        Ok(true)
    }

    fn is_joined(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_join_state() {
        let transport = MockTransport::new();
        assert!(transport.is_joined());

        transport.set_joined(false);
        assert!(!transport.is_joined());
        assert!(matches!(transport.send(b"x"), Err(UplinkError::NotJoined)));
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn mock_transport_scripted_replies() {
        let transport = MockTransport::new();
        transport.push_replies([MockReply::NotSent, MockReply::Error]);

        assert!(!transport.send(b"a").unwrap());
        assert!(transport.send(b"b").is_err());
        assert!(transport.send(b"c").unwrap());
        assert_eq!(transport.sent(), vec![b"c".to_vec()]);
        assert_eq!(transport.attempts(), 3);
    }

    #[test]
    fn loopback_without_loss_delivers_everything() {
        let transport = LoopbackTransport::with_seed(0.0, 7);
        for i in 0..10u8 {
            assert!(transport.send(&[i]).unwrap());
        }
        assert_eq!(transport.delivered().len(), 10);
        assert_eq!(transport.dropped(), 0);
    }

    #[test]
    fn loopback_total_loss_drops_everything() {
        let transport = LoopbackTransport::with_seed(1.0, 7);
        for i in 0..10u8 {
            assert!(transport.send(&[i]).is_err());
        }
        assert!(transport.delivered().is_empty());
        assert_eq!(transport.dropped(), 10);
    }
}
