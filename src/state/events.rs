use tokio::sync::broadcast;

/// Notifications raised by the trial engine for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    /// A trial started; the signal follows after `delay_secs`.
    Armed {
        /// Whole seconds until the signal.
        delay_secs: u64,
    },
    /// The go signal fired; input is now measured.
    Signaled,
    /// Input arrived before the signal.
    Failed,
    /// Input after the signal was measured.
    Completed {
        /// Seconds between the signal and the input.
        elapsed_secs: f64,
        /// Whether the player's best time improved.
        is_new_best: bool,
    },
    /// The running trial was abandoned.
    Reset,
}

/// Simple broadcast hub fanning trial events out to every observer.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<TrialEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrialEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: TrialEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(16)
    }
}
