//! Timed reaction trial: a random delay, a go signal, then one measured input.
//!
//! The phase and the arming generation share a single atomic word. The delay
//! timer runs as a detached tokio task and may only move the word from
//! `Armed(n)` to `Signaled(n)`; every other transition happens on the owning
//! side through `&mut self`. A timer belonging to an earlier arming, or one
//! racing an early input, therefore loses its compare-and-swap and does nothing.

use std::{
    fmt,
    ops::RangeInclusive,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::Rng;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle, time::Instant};
use tracing::{debug, trace};

use crate::state::{
    clock::{Clock, MonotonicClock},
    events::{EventHub, TrialEvent},
    player::{PlayerRecord, RecordError},
};

/// Shortest delay before the signal, in whole seconds.
pub const DEFAULT_MIN_DELAY_SECS: u64 = 2;
/// Longest delay before the signal, in whole seconds.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 10;

const PHASE_BITS: u32 = 3;
const PHASE_MASK: u64 = (1 << PHASE_BITS) - 1;

/// Phases a trial moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrialPhase {
    /// No trial has been started since the last reset.
    Idle = 0,
    /// Waiting for the randomized delay to elapse.
    Armed = 1,
    /// The go signal fired; the next input is measured.
    Signaled = 2,
    /// Input arrived before the signal.
    Failed = 3,
    /// Input after the signal was measured and recorded.
    Completed = 4,
}

impl TrialPhase {
    fn from_bits(bits: u64) -> Self {
        match bits & PHASE_MASK {
            1 => TrialPhase::Armed,
            2 => TrialPhase::Signaled,
            3 => TrialPhase::Failed,
            4 => TrialPhase::Completed,
            _ => TrialPhase::Idle,
        }
    }

    /// Whether a new trial may be armed from this phase.
    pub fn can_arm(self) -> bool {
        matches!(
            self,
            TrialPhase::Idle | TrialPhase::Failed | TrialPhase::Completed
        )
    }

    /// Whether a trial is in flight (armed or awaiting input).
    pub fn is_running(self) -> bool {
        matches!(self, TrialPhase::Armed | TrialPhase::Signaled)
    }
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrialPhase::Idle => "idle",
            TrialPhase::Armed => "armed",
            TrialPhase::Signaled => "signaled",
            TrialPhase::Failed => "failed",
            TrialPhase::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Identifies one arming of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialId(u64);

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returned by [`TrialEngine::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTrial {
    /// Arming the timer belongs to.
    pub trial: TrialId,
    /// Whole seconds until the signal fires.
    pub delay_secs: u64,
}

/// Result of a measured input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    /// Trial the input completed.
    pub trial: TrialId,
    /// Seconds between the signal and the input.
    pub elapsed_secs: f64,
    /// Whether the player's best time improved.
    pub is_new_best: bool,
}

/// Errors returned by [`TrialEngine`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    /// The operation is not legal in the current phase.
    #[error("cannot {operation} while the trial is {phase}")]
    InvalidState {
        /// Phase observed when the call was rejected.
        phase: TrialPhase,
        /// Rejected operation.
        operation: &'static str,
    },
    /// The measured time was refused by the player record.
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl TrialError {
    fn invalid(phase: TrialPhase, operation: &'static str) -> Self {
        TrialError::InvalidState { phase, operation }
    }
}

/// Packed `(generation, phase)` value stored in the engine's atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseWord(u64);

impl PhaseWord {
    fn new(generation: u64, phase: TrialPhase) -> Self {
        Self((generation << PHASE_BITS) | phase as u64)
    }

    fn phase(self) -> TrialPhase {
        TrialPhase::from_bits(self.0)
    }

    fn generation(self) -> u64 {
        self.0 >> PHASE_BITS
    }

    fn with_phase(self, phase: TrialPhase) -> Self {
        Self::new(self.generation(), phase)
    }
}

/// State reachable from the timer task.
struct TrialShared {
    word: AtomicU64,
    signal_at: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
    events: EventHub,
}

impl TrialShared {
    fn load(&self) -> PhaseWord {
        PhaseWord(self.word.load(Ordering::Acquire))
    }

    /// Compare-and-swap `from` to `from` with phase `to`; on failure returns the current word.
    fn transition(&self, from: PhaseWord, to: TrialPhase) -> Result<PhaseWord, PhaseWord> {
        let next = from.with_phase(to);
        self.word
            .compare_exchange(from.0, next.0, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| next)
            .map_err(PhaseWord)
    }

    /// Timer callback: signal `trial` if it is still armed.
    fn fire_signal(&self, trial: TrialId) -> bool {
        // Held across the swap so a reader that sees `Signaled` also sees the timestamp.
        let mut signal_at = self.signal_at.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();

        match self.transition(PhaseWord::new(trial.0, TrialPhase::Armed), TrialPhase::Signaled) {
            Ok(_) => {
                *signal_at = Some(now);
                debug!(%trial, "trial signaled");
                // Still under the lock: `reset` cannot report `Reset` ahead of this event.
                self.events.broadcast(TrialEvent::Signaled);
                true
            }
            Err(current) => {
                trace!(
                    %trial,
                    current_generation = current.generation(),
                    current_phase = %current.phase(),
                    "stale trial timer ignored"
                );
                false
            }
        }
    }

    fn signal_at(&self) -> Option<Instant> {
        *self.signal_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_signal(&self) {
        *self.signal_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// State machine governing one reaction-time trial at a time.
///
/// [`arm`](Self::arm) spawns the delay timer on the current tokio runtime, so
/// it must be called from within one.
pub struct TrialEngine {
    shared: Arc<TrialShared>,
    delay_secs: RangeInclusive<u64>,
    scheduled_delay: Option<u64>,
    timer: Option<JoinHandle<()>>,
}

impl TrialEngine {
    /// Build an engine drawing delays from `delay_secs` (bounds are reordered if reversed).
    pub fn new(clock: Arc<dyn Clock>, delay_secs: RangeInclusive<u64>, events: EventHub) -> Self {
        let (start, end) = delay_secs.into_inner();
        Self {
            shared: Arc::new(TrialShared {
                word: AtomicU64::new(PhaseWord::new(0, TrialPhase::Idle).0),
                signal_at: Mutex::new(None),
                clock,
                events,
            }),
            delay_secs: start.min(end)..=start.max(end),
            scheduled_delay: None,
            timer: None,
        }
    }

    /// Engine on the monotonic clock with its own event hub.
    pub fn with_delay_range(delay_secs: RangeInclusive<u64>) -> Self {
        Self::new(Arc::new(MonotonicClock), delay_secs, EventHub::default())
    }

    /// Current phase.
    pub fn phase(&self) -> TrialPhase {
        self.shared.load().phase()
    }

    /// Delay drawn by the last [`arm`](Self::arm), cleared by [`reset`](Self::reset).
    pub fn scheduled_delay(&self) -> Option<u64> {
        self.scheduled_delay
    }

    /// Inclusive range delays are drawn from.
    pub fn delay_range(&self) -> &RangeInclusive<u64> {
        &self.delay_secs
    }

    /// Receive every subsequent [`TrialEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<TrialEvent> {
        self.shared.events.subscribe()
    }

    /// Start a trial: draw a delay and schedule the signal. Returns immediately.
    pub fn arm(&mut self) -> Result<ArmedTrial, TrialError> {
        let current = self.shared.load();
        if !current.phase().can_arm() {
            return Err(TrialError::invalid(current.phase(), "arm"));
        }

        self.cancel_timer();
        self.shared.clear_signal();

        let delay_secs = rand::rng().random_range(self.delay_secs.clone());
        let armed = PhaseWord::new(current.generation().wrapping_add(1), TrialPhase::Armed);
        let trial = TrialId(armed.generation());
        self.shared.word.store(armed.0, Ordering::Release);
        self.scheduled_delay = Some(delay_secs);

        let shared = Arc::clone(&self.shared);
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            shared.fire_signal(trial);
        }));

        debug!(%trial, delay_secs, "trial armed");
        self.shared.events.broadcast(TrialEvent::Armed { delay_secs });
        Ok(ArmedTrial { trial, delay_secs })
    }

    /// Input arrived before the signal: fail the trial and cancel its timer.
    pub fn register_early_input(&mut self) -> Result<(), TrialError> {
        let current = self.shared.load();
        if current.phase() != TrialPhase::Armed {
            return Err(TrialError::invalid(current.phase(), "register early input"));
        }

        match self.shared.transition(current, TrialPhase::Failed) {
            Ok(_) => {
                self.cancel_timer();
                debug!(trial = %TrialId(current.generation()), "trial failed on early input");
                self.shared.events.broadcast(TrialEvent::Failed);
                Ok(())
            }
            // The timer won the race.
            Err(now) => Err(TrialError::invalid(now.phase(), "register early input")),
        }
    }

    /// Measure the input against the signal and record it on `record`.
    pub fn register_input(&mut self, record: &mut PlayerRecord) -> Result<TrialOutcome, TrialError> {
        let current = self.shared.load();
        if current.phase() != TrialPhase::Signaled {
            return Err(TrialError::invalid(current.phase(), "register input"));
        }
        let now = self.shared.clock.now();
        let Some(signal_at) = self.shared.signal_at() else {
            return Err(TrialError::invalid(current.phase(), "register input"));
        };

        self.shared
            .transition(current, TrialPhase::Completed)
            .map_err(|now| TrialError::invalid(now.phase(), "register input"))?;
        self.timer = None;

        let elapsed_secs = now.saturating_duration_since(signal_at).as_secs_f64();
        let is_new_best = record.record_result(elapsed_secs)?;
        let trial = TrialId(current.generation());

        debug!(
            %trial,
            player = record.name(),
            elapsed_secs,
            is_new_best,
            "trial completed"
        );
        self.shared.events.broadcast(TrialEvent::Completed {
            elapsed_secs,
            is_new_best,
        });
        Ok(TrialOutcome {
            trial,
            elapsed_secs,
            is_new_best,
        })
    }

    /// Abandon any trial and return to idle. A pending timer becomes a no-op.
    pub fn reset(&mut self) {
        self.cancel_timer();
        let current = self.shared.load();
        let idle = PhaseWord::new(current.generation().wrapping_add(1), TrialPhase::Idle);
        let previous = PhaseWord(self.shared.word.swap(idle.0, Ordering::AcqRel));
        // Waits out a timer that signaled just before the swap.
        self.shared.clear_signal();
        self.scheduled_delay = None;

        if previous.phase() != TrialPhase::Idle {
            debug!(from = %previous.phase(), "trial reset");
            self.shared.events.broadcast(TrialEvent::Reset);
        }
    }

    /// Fire the current arming's signal immediately, as its timer would.
    #[cfg(test)]
    pub(crate) fn fire_signal_now(&self) -> bool {
        let current = self.shared.load();
        self.shared.fire_signal(TrialId(current.generation()))
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Default for TrialEngine {
    fn default() -> Self {
        Self::with_delay_range(DEFAULT_MIN_DELAY_SECS..=DEFAULT_MAX_DELAY_SECS)
    }
}

impl Drop for TrialEngine {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
