//! Command surface offered to the presentation layer.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    dao::player_store::PlayerRepository,
    error::ServiceError,
    state::{
        events::TrialEvent,
        player::{PlayerRecord, PlayerStore},
        trial::{ArmedTrial, TrialEngine, TrialError, TrialOutcome, TrialPhase},
    },
};

/// What a [`Session::submit_input`] call amounted to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmitOutcome {
    /// Input arrived before the signal; the trial failed.
    TooEarly,
    /// Input after the signal was measured and recorded.
    Completed(TrialOutcome),
}

/// Selected player, the player collection and the trial engine driving them.
pub struct Session {
    store: PlayerStore,
    repository: Arc<dyn PlayerRepository>,
    engine: TrialEngine,
    selected: Option<String>,
}

impl Session {
    /// Wrap a loaded store; no player is selected yet.
    pub fn new(
        store: PlayerStore,
        repository: Arc<dyn PlayerRepository>,
        engine: TrialEngine,
    ) -> Self {
        Self {
            store,
            repository,
            engine,
            selected: None,
        }
    }

    /// Currently selected player.
    pub fn selected_player(&self) -> Option<&PlayerRecord> {
        self.selected.as_deref().and_then(|name| self.store.find(name))
    }

    /// All players in listing order.
    pub fn players(&self) -> impl ExactSizeIterator<Item = &PlayerRecord> {
        self.store.list()
    }

    /// The underlying player collection.
    pub fn store(&self) -> &PlayerStore {
        &self.store
    }

    /// Phase of the trial engine.
    pub fn phase(&self) -> TrialPhase {
        self.engine.phase()
    }

    /// Receive every subsequent [`TrialEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<TrialEvent> {
        self.engine.subscribe()
    }

    /// Arm a new trial for the selected player.
    pub fn start_trial(&mut self) -> Result<ArmedTrial, ServiceError> {
        let Some(name) = self.selected.as_deref() else {
            return Err(ServiceError::InvalidState(
                "select a player before starting a trial".into(),
            ));
        };
        if !self.store.contains(name) {
            return Err(ServiceError::NotFound(format!("player `{name}` not found")));
        }

        Ok(self.engine.arm()?)
    }

    /// Forward user input to the engine: early input fails an armed trial,
    /// input after the signal is measured against the selected player.
    pub fn submit_input(&mut self) -> Result<SubmitOutcome, ServiceError> {
        match self.engine.register_early_input() {
            Ok(()) => return Ok(SubmitOutcome::TooEarly),
            // The signal already fired, possibly while this input was in flight.
            Err(TrialError::InvalidState {
                phase: TrialPhase::Signaled,
                ..
            }) => {}
            Err(TrialError::InvalidState { phase, .. }) => {
                return Err(TrialError::InvalidState {
                    phase,
                    operation: "submit input",
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        let Some(name) = self.selected.as_deref() else {
            return Err(ServiceError::InvalidState("no player is selected".into()));
        };
        let Some(record) = self.store.find_mut(name) else {
            return Err(ServiceError::NotFound(format!("player `{name}` not found")));
        };

        let outcome = self.engine.register_input(record)?;
        Ok(SubmitOutcome::Completed(outcome))
    }

    /// Make `name` the active player, abandoning any running trial.
    pub fn select_player(&mut self, name: &str) -> Result<&PlayerRecord, ServiceError> {
        if !self.store.contains(name) {
            return Err(ServiceError::NotFound(format!("player `{name}` not found")));
        }

        self.engine.reset();
        self.selected = Some(name.to_owned());
        info!(player = name, "player selected");
        self.selected_player()
            .ok_or_else(|| ServiceError::NotFound(format!("player `{name}` not found")))
    }

    /// Add a player, returning its name.
    pub fn add_player(&mut self, name: &str) -> Result<String, ServiceError> {
        self.ensure_no_trial_running("add a player")?;
        let record = self.store.add(name)?;
        info!(player = record.name(), "player added");
        Ok(record.name().to_owned())
    }

    /// Remove a player; removing the selected player clears the selection.
    pub fn remove_player(&mut self, name: &str) -> Result<PlayerRecord, ServiceError> {
        self.ensure_no_trial_running("remove a player")?;
        let removed = self.store.remove(name)?;
        if self.selected.as_deref() == Some(name) {
            self.selected = None;
            self.engine.reset();
        }
        info!(player = name, "player removed");
        Ok(removed)
    }

    /// Rename a player; the selection follows a renamed selected player.
    pub fn rename_player(&mut self, old: &str, new: &str) -> Result<(), ServiceError> {
        self.ensure_no_trial_running("rename a player")?;
        self.store.rename(old, new)?;
        if self.selected.as_deref() == Some(old) {
            self.selected = Some(new.to_owned());
        }
        info!(from = old, to = new, "player renamed");
        Ok(())
    }

    /// Abandon the running trial, if any.
    pub fn abort_trial(&mut self) {
        self.engine.reset();
    }

    /// Persist every player. A failure leaves the in-memory state untouched.
    pub async fn save(&self) -> Result<(), ServiceError> {
        self.store
            .save(self.repository.as_ref())
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to save players; recent results may be lost");
                ServiceError::from(err)
            })
    }

    /// Abandon any trial and make a final save attempt.
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        self.engine.reset();
        info!(count = self.store.len(), "shutting down session");
        self.save().await
    }

    fn ensure_no_trial_running(&self, operation: &str) -> Result<(), ServiceError> {
        let phase = self.engine.phase();
        if phase.is_running() {
            return Err(ServiceError::InvalidState(format!(
                "cannot {operation} while the trial is {phase}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::player_store::MemoryPlayerStore,
        state::player::DEFAULT_PLAYER_NAME,
    };
    use std::time::Duration;

    fn session_with(repository: &MemoryPlayerStore) -> Session {
        Session::new(
            PlayerStore::seeded(DEFAULT_PLAYER_NAME),
            Arc::new(repository.clone()),
            TrialEngine::with_delay_range(2..=2),
        )
    }

    async fn wait_for_signal(events: &mut broadcast::Receiver<TrialEvent>) {
        while events.recv().await.unwrap() != TrialEvent::Signaled {}
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_a_selected_player() {
        let mut session = session_with(&MemoryPlayerStore::new());
        assert!(session.selected_player().is_none());
        assert!(matches!(
            session.start_trial(),
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(session.phase(), TrialPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn measured_input_updates_the_selected_player() {
        let mut session = session_with(&MemoryPlayerStore::new());
        let mut events = session.subscribe();
        session.select_player(DEFAULT_PLAYER_NAME).unwrap();

        let armed = session.start_trial().unwrap();
        assert_eq!(armed.delay_secs, 2);
        wait_for_signal(&mut events).await;
        tokio::time::advance(Duration::from_millis(180)).await;

        let SubmitOutcome::Completed(outcome) = session.submit_input().unwrap() else {
            panic!("expected a measured input");
        };
        assert!(outcome.is_new_best);

        let player = session.selected_player().unwrap();
        assert_eq!(player.attempts(), 1);
        assert_eq!(player.best_time(), Some(outcome.elapsed_secs));
        assert_eq!(session.phase(), TrialPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn input_racing_the_signal_is_measured_not_failed() {
        let mut session = session_with(&MemoryPlayerStore::new());
        session.select_player(DEFAULT_PLAYER_NAME).unwrap();
        session.start_trial().unwrap();

        // The timer wins just before the input is handled.
        assert!(session.engine.fire_signal_now());
        let outcome = session.submit_input().unwrap();

        let SubmitOutcome::Completed(outcome) = outcome else {
            panic!("expected a measured input, got {outcome:?}");
        };
        assert_eq!(outcome.elapsed_secs, 0.0);
        assert_eq!(session.phase(), TrialPhase::Completed);
        assert_eq!(session.selected_player().unwrap().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn early_input_fails_without_touching_the_player() {
        let mut session = session_with(&MemoryPlayerStore::new());
        session.select_player(DEFAULT_PLAYER_NAME).unwrap();
        session.start_trial().unwrap();

        assert_eq!(session.submit_input().unwrap(), SubmitOutcome::TooEarly);
        assert_eq!(session.phase(), TrialPhase::Failed);
        assert_eq!(session.selected_player().unwrap().attempts(), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(session.phase(), TrialPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn input_without_a_trial_is_rejected() {
        let mut session = session_with(&MemoryPlayerStore::new());
        session.select_player(DEFAULT_PLAYER_NAME).unwrap();
        assert!(matches!(
            session.submit_input(),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_resets_a_running_trial() {
        let mut session = session_with(&MemoryPlayerStore::new());
        session.add_player("Ada").unwrap();
        session.select_player(DEFAULT_PLAYER_NAME).unwrap();
        session.start_trial().unwrap();

        let selected = session.select_player("Ada").unwrap();
        assert_eq!(selected.name(), "Ada");
        assert_eq!(session.phase(), TrialPhase::Idle);

        assert!(matches!(
            session.select_player("Ghost"),
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(session.selected_player().unwrap().name(), "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn player_management_waits_for_the_trial() {
        let mut session = session_with(&MemoryPlayerStore::new());
        session.select_player(DEFAULT_PLAYER_NAME).unwrap();
        session.start_trial().unwrap();

        assert!(matches!(
            session.add_player("Ada"),
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            session.rename_player(DEFAULT_PLAYER_NAME, "Ada"),
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            session.remove_player(DEFAULT_PLAYER_NAME),
            Err(ServiceError::InvalidState(_))
        ));

        session.abort_trial();
        assert_eq!(session.add_player("Ada").unwrap(), "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_names_are_reported() {
        let mut session = session_with(&MemoryPlayerStore::new());
        assert!(matches!(
            session.add_player(DEFAULT_PLAYER_NAME),
            Err(ServiceError::DuplicateName(_))
        ));
        session.add_player("Ada").unwrap();
        assert!(matches!(
            session.rename_player("Ada", DEFAULT_PLAYER_NAME),
            Err(ServiceError::DuplicateName(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn selection_follows_rename_and_clears_on_remove() {
        let mut session = session_with(&MemoryPlayerStore::new());
        session.add_player("Ada").unwrap();
        session.select_player("Ada").unwrap();

        assert!(matches!(
            session.rename_player("Ada", " Ada L. "),
            Err(ServiceError::InvalidInput(_))
        ));
        session.rename_player("Ada", "Ada L.").unwrap();
        assert_eq!(session.selected_player().unwrap().name(), "Ada L.");

        session.remove_player("Ada L.").unwrap();
        assert!(session.selected_player().is_none());
        assert!(matches!(
            session.remove_player("Ada L."),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_saves_the_players() {
        let repository = MemoryPlayerStore::new();
        let mut session = session_with(&repository);
        session.add_player("Ada").unwrap();
        session.select_player("Ada").unwrap();
        session.start_trial().unwrap();

        session.shutdown().await.unwrap();

        assert_eq!(session.phase(), TrialPhase::Idle);
        let saved = repository.snapshot().await.unwrap();
        let names: Vec<_> = saved.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, [DEFAULT_PLAYER_NAME, "Ada"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_surfaced_but_not_fatal() {
        let repository = MemoryPlayerStore::new();
        repository.set_fail_writes(true);
        let mut session = session_with(&repository);
        session.add_player("Ada").unwrap();

        assert!(matches!(
            session.save().await,
            Err(ServiceError::Storage(_))
        ));
        assert_eq!(session.players().len(), 2);

        repository.set_fail_writes(false);
        session.save().await.unwrap();
        assert_eq!(repository.snapshot().await.unwrap().len(), 2);
    }
}
