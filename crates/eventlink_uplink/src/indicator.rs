//! Status indicator collaborator.

use parking_lot::Mutex;

/// Device status shown to the user, typically as an LED color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// Indicator off.
    Off,
    /// Booting.
    Starting,
    /// Last operation succeeded.
    Ok,
    /// Attention needed, e.g. clock sync in progress.
    Warn,
    /// Last operation failed.
    Error,
}

/// Something that can display an [`IndicatorState`].
pub trait Indicator: Send + Sync {
    /// Shows `state`.
    fn set(&self, state: IndicatorState);
}

/// An indicator that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl Indicator for NoopIndicator {
    fn set(&self, _state: IndicatorState) {}
}

/// An indicator that remembers every state it was set to.
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    states: Mutex<Vec<IndicatorState>>,
}

impl RecordingIndicator {
    /// Creates an indicator with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// All states set so far, oldest first.
    pub fn history(&self) -> Vec<IndicatorState> {
        self.states.lock().clone()
    }

    /// The most recent state.
    pub fn current(&self) -> Option<IndicatorState> {
        self.states.lock().last().copied()
    }
}

impl Indicator for RecordingIndicator {
    fn set(&self, state: IndicatorState) {
        self.states.lock().push(state);
    }
}
