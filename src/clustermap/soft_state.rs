use std::time::Duration;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clustermap::hardware_state::HardwareState;

/// The [SoftStateDetector] turns reported timeouts and responses for a single resource (a data
///  node or a disk) into an *effective* availability. There are no timers: the effective state
///  is calculated from the stored state and the current time whenever it is queried.
///
/// The hard state becomes unavailable after `error_threshold` consecutive timeouts, and a single
///  response makes it available again. While the hard state is unavailable, the resource is
///  reported as available once `retry_backoff` has passed since the most recent timeout, so that
///  callers retry it optimistically.
///
/// ## Fragile after recovery
///
/// Expiry of the backoff does not touch the hard state or the error counter. A resource that was
///  tripped stays fragile until it actually responds: a single timeout after the backoff expired
///  makes it unavailable again, without accumulating `error_threshold` timeouts first.
#[derive(Debug)]
pub struct SoftStateDetector {
    error_threshold: u32,
    retry_backoff: Duration,
    state: Mutex<DetectorState>,
}

#[derive(Debug, Clone, Copy)]
struct DetectorState {
    error_count: u32,
    last_error_time: Option<Instant>,
    hard_state: HardwareState,
}
impl DetectorState {
    fn effective_state(&self, retry_backoff: Duration) -> HardwareState {
        match (self.hard_state, self.last_error_time) {
            (HardwareState::Available, _) => HardwareState::Available,
            (HardwareState::Unavailable, Some(t)) if t.elapsed() >= retry_backoff => HardwareState::Available,
            // declared unavailable without any reported timeout: stays down until a response
            (HardwareState::Unavailable, _) => HardwareState::Unavailable,
        }
    }
}

/// change of the effective state caused by a single reported event
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StateChange {
    pub old_state: HardwareState,
    pub new_state: HardwareState,
}

impl SoftStateDetector {
    pub fn new(declared_state: HardwareState, error_threshold: u32, retry_backoff: Duration) -> SoftStateDetector {
        let error_threshold = if error_threshold == 0 {
            warn!("error threshold of 0 is not meaningful - using 1 instead");
            1
        }
        else {
            error_threshold
        };

        SoftStateDetector {
            error_threshold,
            retry_backoff,
            state: Mutex::new(DetectorState {
                error_count: 0,
                last_error_time: None,
                hard_state: declared_state,
            }),
        }
    }

    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn on_timeout(&self) -> Option<StateChange> {
        self.update(|state, error_threshold| {
            state.error_count = state.error_count.saturating_add(1);

            if state.hard_state == HardwareState::Unavailable || state.error_count >= error_threshold {
                state.hard_state = HardwareState::Unavailable;
                state.last_error_time = Some(Instant::now());
            }
        })
    }

    pub fn on_response(&self) -> Option<StateChange> {
        self.update(|state, _| {
            state.error_count = 0;
            state.hard_state = HardwareState::Available;
        })
    }

    pub fn effective_state(&self) -> HardwareState {
        self.state.lock().effective_state(self.retry_backoff)
    }

    /// the state as last set explicitly, ignoring backoff expiry
    pub fn hard_state(&self) -> HardwareState {
        self.state.lock().hard_state
    }

    pub fn error_count(&self) -> u32 {
        self.state.lock().error_count
    }

    fn update(&self, f: impl FnOnce(&mut DetectorState, u32)) -> Option<StateChange> {
        let mut state = self.state.lock();
        let old_state = state.effective_state(self.retry_backoff);
        f(&mut *state, self.error_threshold);
        let new_state = state.effective_state(self.retry_backoff);

        if old_state == new_state {
            return None;
        }
        debug!("effective state changed from {} to {} (error count {})", old_state, new_state, state.error_count);
        Some(StateChange { old_state, new_state })
    }
}
