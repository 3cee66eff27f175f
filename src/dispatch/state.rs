//! Retry/fallback state machine.
//!
//! ```text
//! PENDING ──next──▶ TRYING(i) ──failed──▶ RETRY(i+1) ──next──▶ TRYING(i+1)
//!                      │                      │
//!                      ├──succeeded──▶ SUCCESS└──(out of candidates or attempts)──▶ EXHAUSTED
//!                      └──aborted────▶ ABORTED
//! ```
//!
//! SUCCESS, EXHAUSTED and ABORTED are terminal and absorb every event.

/// Dispatch progress for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    /// Working on the candidate at this index
    Trying { candidate: usize },
    /// The previous candidate failed; this index is next in line
    Retry { next: usize },
    Success,
    Exhausted,
    /// Stopped by cancellation, deadline or rejected input
    Aborted,
}

/// Inputs that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Move on to the next candidate, given how many attempts were dispatched so far
    Next { attempts_made: usize },
    /// A result is available (from a provider or the cache)
    Succeeded,
    /// The current candidate produced no result
    Failed,
    /// Stop without a result
    Aborted,
}

/// Limits the machine checks before handing out another candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub candidates: usize,
    pub max_attempts: usize,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Success | DispatchState::Exhausted | DispatchState::Aborted
        )
    }

    /// Apply `event` and return the next state.
    pub fn on(self, event: DispatchEvent, bounds: &Bounds) -> DispatchState {
        if self.is_terminal() {
            return self;
        }

        match (self, event) {
            (_, DispatchEvent::Succeeded) => DispatchState::Success,
            (_, DispatchEvent::Aborted) => DispatchState::Aborted,
            (DispatchState::Trying { candidate }, DispatchEvent::Failed) => DispatchState::Retry {
                next: candidate + 1,
            },
            (DispatchState::Pending, DispatchEvent::Next { attempts_made }) => {
                Self::advance(0, attempts_made, bounds)
            }
            (DispatchState::Retry { next }, DispatchEvent::Next { attempts_made }) => {
                Self::advance(next, attempts_made, bounds)
            }
            // Failing outside TRYING or advancing while TRYING changes nothing
            (state, _) => state,
        }
    }

    fn advance(next: usize, attempts_made: usize, bounds: &Bounds) -> DispatchState {
        if next < bounds.candidates && attempts_made < bounds.max_attempts {
            DispatchState::Trying { candidate: next }
        } else {
            DispatchState::Exhausted
        }
    }
}
