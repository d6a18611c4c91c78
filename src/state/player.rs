use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    dao::{
        models::PlayerEntity,
        player_store::PlayerRepository,
        storage::{StorageError, StorageResult},
    },
    validation::validate_player_name,
};

/// Name given to the player seeded into an empty store.
pub const DEFAULT_PLAYER_NAME: &str = "Anonymous";

/// Rejected trial result.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RecordError {
    /// Elapsed time was negative, NaN or infinite.
    #[error("elapsed time must be a finite, non-negative number of seconds (got {0})")]
    InvalidElapsed(f64),
}

/// Errors returned by [`PlayerStore`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerStoreError {
    /// Another record already uses this name.
    #[error("a player named `{0}` already exists")]
    DuplicateName(String),
    /// No record has this name.
    #[error("no player named `{0}`")]
    NotFound(String),
    /// The requested name failed validation.
    #[error("invalid player name: {0}")]
    InvalidName(String),
}

/// Profile of a single player: display name, best reaction time and completed attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    name: String,
    best_time: Option<f64>,
    attempts: u32,
}

impl PlayerRecord {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            best_time: None,
            attempts: 0,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fastest completed trial in seconds.
    pub fn best_time(&self) -> Option<f64> {
        self.best_time
    }

    /// Number of completed trials.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one completed trial and keep the faster of the stored and new time.
    ///
    /// Returns `Ok(true)` when `elapsed_secs` became the new best time.
    pub fn record_result(&mut self, elapsed_secs: f64) -> Result<bool, RecordError> {
        debug_assert!(
            elapsed_secs.is_finite() && elapsed_secs >= 0.0,
            "elapsed time {elapsed_secs} cannot come out of a monotonic clock"
        );
        if !elapsed_secs.is_finite() || elapsed_secs < 0.0 {
            return Err(RecordError::InvalidElapsed(elapsed_secs));
        }

        self.attempts = self.attempts.saturating_add(1);
        match self.best_time {
            Some(best) if elapsed_secs >= best => Ok(false),
            _ => {
                self.best_time = Some(elapsed_secs);
                Ok(true)
            }
        }
    }
}

impl From<PlayerEntity> for PlayerRecord {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            best_time: value.best_time,
            attempts: value.attempts,
        }
    }
}

impl From<&PlayerRecord> for PlayerEntity {
    fn from(value: &PlayerRecord) -> Self {
        Self {
            name: value.name.clone(),
            best_time: value.best_time,
            attempts: value.attempts,
        }
    }
}

/// Result of [`PlayerStore::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedStore {
    /// Store ready for use; seeded with the default player when nothing was restored.
    pub store: PlayerStore,
    /// Whether the records came from storage.
    pub restored: bool,
}

/// Insertion-ordered collection of player records keyed by exact name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStore {
    players: IndexMap<String, PlayerRecord>,
}

impl PlayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a single fresh record named `default_player`.
    pub fn seeded(default_player: &str) -> Self {
        let mut store = Self::new();
        if let Err(err) = store.add(default_player) {
            warn!(player = default_player, error = %err, "could not seed default player");
        }
        store
    }

    /// Build a store from persisted entities, rejecting documents that break record invariants.
    ///
    /// A repeated name keeps its first occurrence.
    pub fn from_entities(entities: Vec<PlayerEntity>) -> StorageResult<Self> {
        let mut players = IndexMap::with_capacity(entities.len());
        for entity in entities {
            entity.check().map_err(StorageError::invalid_content)?;
            if players.contains_key(&entity.name) {
                warn!(player = %entity.name, "duplicate player in storage; keeping the first");
                continue;
            }
            players.insert(entity.name.clone(), PlayerRecord::from(entity));
        }
        Ok(Self { players })
    }

    /// Persistable copy of every record in listing order.
    pub fn to_entities(&self) -> Vec<PlayerEntity> {
        self.players.values().map(PlayerEntity::from).collect()
    }

    /// Insert a fresh record under exactly `name`.
    pub fn add(&mut self, name: &str) -> Result<&PlayerRecord, PlayerStoreError> {
        validate_player_name(name)
            .map_err(|err| PlayerStoreError::InvalidName(err.to_string()))?;
        if self.players.contains_key(name) {
            return Err(PlayerStoreError::DuplicateName(name.to_owned()));
        }

        let record = self
            .players
            .entry(name.to_owned())
            .or_insert_with(|| PlayerRecord::new(name.to_owned()));
        Ok(&*record)
    }

    /// Delete the record with exactly this name.
    pub fn remove(&mut self, name: &str) -> Result<PlayerRecord, PlayerStoreError> {
        self.players
            .shift_remove(name)
            .ok_or_else(|| PlayerStoreError::NotFound(name.to_owned()))
    }

    /// Exact-match lookup.
    pub fn find(&self, name: &str) -> Option<&PlayerRecord> {
        self.players.get(name)
    }

    /// Exact-match mutable lookup.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut PlayerRecord> {
        self.players.get_mut(name)
    }

    /// Whether a record with exactly this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    /// Rename a record in place, keeping its listing position and statistics.
    ///
    /// Renaming a record to its current name always succeeds.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), PlayerStoreError> {
        let Some(index) = self.players.get_index_of(old) else {
            return Err(PlayerStoreError::NotFound(old.to_owned()));
        };
        if new == old {
            return Ok(());
        }
        validate_player_name(new)
            .map_err(|err| PlayerStoreError::InvalidName(err.to_string()))?;
        if self.players.contains_key(new) {
            return Err(PlayerStoreError::DuplicateName(new.to_owned()));
        }

        let Some((_, mut record)) = self.players.shift_remove_index(index) else {
            return Err(PlayerStoreError::NotFound(old.to_owned()));
        };
        record.name = new.to_owned();
        self.players.shift_insert(index, new.to_owned(), record);
        Ok(())
    }

    /// Records in insertion order.
    pub fn list(&self) -> impl ExactSizeIterator<Item = &PlayerRecord> {
        self.players.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Load the collection from `repository`, falling back to a store seeded with
    /// `default_player` when nothing is stored or the stored data is unusable.
    pub async fn load(repository: &dyn PlayerRepository, default_player: &str) -> LoadedStore {
        let loaded = match repository.read().await {
            Ok(Some(entities)) => Self::from_entities(entities),
            Ok(None) => {
                info!("no stored players found; starting with the default player");
                return Self::fallback(default_player);
            }
            Err(err) => Err(err),
        };

        match loaded {
            Ok(store) => {
                info!(count = store.len(), "restored players from storage");
                LoadedStore {
                    store,
                    restored: true,
                }
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "stored players could not be loaded; starting with the default player"
                );
                Self::fallback(default_player)
            }
        }
    }

    /// Persist the whole collection through `repository`.
    pub async fn save(&self, repository: &dyn PlayerRepository) -> StorageResult<()> {
        repository.write(self.to_entities()).await?;
        info!(count = self.len(), "players saved");
        Ok(())
    }

    fn fallback(default_player: &str) -> LoadedStore {
        LoadedStore {
            store: Self::seeded(default_player),
            restored: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::player_store::MemoryPlayerStore;

    fn names(store: &PlayerStore) -> Vec<&str> {
        store.list().map(PlayerRecord::name).collect()
    }

    #[test]
    fn added_player_starts_without_results() {
        let mut store = PlayerStore::new();
        store.add("Ada").unwrap();

        let record = store.find("Ada").unwrap();
        assert_eq!(record.attempts(), 0);
        assert_eq!(record.best_time(), None);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut store = PlayerStore::new();
        assert!(store.add("X").is_ok());
        assert_eq!(
            store.add("X").unwrap_err(),
            PlayerStoreError::DuplicateName("X".into())
        );
        assert_eq!(store.list().filter(|p| p.name() == "X").count(), 1);
    }

    #[test]
    fn names_are_exact_and_case_sensitive() {
        let mut store = PlayerStore::new();
        store.add("Ada Lovelace").unwrap();
        assert!(store.find("Ada Lovelace").is_some());
        assert!(store.find("ada lovelace").is_none());
        assert!(store.add("ada lovelace").is_ok());
        assert!(matches!(
            store.add("   "),
            Err(PlayerStoreError::InvalidName(_))
        ));
    }

    #[test]
    fn names_with_surrounding_whitespace_are_rejected_not_rewritten() {
        let mut store = PlayerStore::new();
        store.add("Ada").unwrap();

        assert!(matches!(
            store.add(" Ada"),
            Err(PlayerStoreError::InvalidName(_))
        ));
        assert!(store.find(" Ada").is_none());
        assert!(matches!(
            store.rename("Ada", "Ada "),
            Err(PlayerStoreError::InvalidName(_))
        ));
        assert_eq!(names(&store), ["Ada"]);
    }

    #[test]
    fn record_result_keeps_the_fastest_time() {
        let mut record = PlayerRecord::new("Ada".into());

        assert_eq!(record.record_result(5.0), Ok(true));
        assert_eq!(record.best_time(), Some(5.0));
        assert_eq!(record.attempts(), 1);

        assert_eq!(record.record_result(6.0), Ok(false));
        assert_eq!(record.best_time(), Some(5.0));
        assert_eq!(record.attempts(), 2);

        assert_eq!(record.record_result(4.0), Ok(true));
        assert_eq!(record.best_time(), Some(4.0));
        assert_eq!(record.attempts(), 3);
    }

    #[test]
    fn equal_time_is_not_a_new_best() {
        let mut record = PlayerRecord::new("Ada".into());
        record.record_result(0.25).unwrap();
        assert_eq!(record.record_result(0.25), Ok(false));
        assert_eq!(record.attempts(), 2);
    }

    #[test]
    fn remove_reports_missing_players() {
        let mut store = PlayerStore::seeded(DEFAULT_PLAYER_NAME);
        assert_eq!(
            store.remove("Ghost").unwrap_err(),
            PlayerStoreError::NotFound("Ghost".into())
        );
        assert_eq!(store.remove(DEFAULT_PLAYER_NAME).unwrap().name(), "Anonymous");
        assert!(store.is_empty());
    }

    #[test]
    fn remove_preserves_order_of_the_rest() {
        let mut store = PlayerStore::new();
        for name in ["A", "B", "C", "D"] {
            store.add(name).unwrap();
        }
        store.remove("B").unwrap();
        assert_eq!(names(&store), ["A", "C", "D"]);
    }

    #[test]
    fn rename_keeps_position_and_statistics() {
        let mut store = PlayerStore::new();
        for name in ["A", "B", "C"] {
            store.add(name).unwrap();
        }
        store.find_mut("B").unwrap().record_result(0.3).unwrap();

        store.rename("B", "Bea").unwrap();

        assert_eq!(names(&store), ["A", "Bea", "C"]);
        let renamed = store.find("Bea").unwrap();
        assert_eq!(renamed.best_time(), Some(0.3));
        assert_eq!(renamed.attempts(), 1);
        assert!(store.find("B").is_none());
    }

    #[test]
    fn rename_rules() {
        let mut store = PlayerStore::new();
        store.add("A").unwrap();
        store.add("B").unwrap();

        store.rename("A", "A").unwrap();
        assert_eq!(
            store.rename("A", "B").unwrap_err(),
            PlayerStoreError::DuplicateName("B".into())
        );
        assert_eq!(
            store.rename("Ghost", "C").unwrap_err(),
            PlayerStoreError::NotFound("Ghost".into())
        );
        assert!(matches!(
            store.rename("A", " "),
            Err(PlayerStoreError::InvalidName(_))
        ));
        assert_eq!(names(&store), ["A", "B"]);
    }

    #[tokio::test]
    async fn load_without_storage_seeds_the_default_player() {
        let repository = MemoryPlayerStore::new();
        let LoadedStore { store, restored } =
            PlayerStore::load(&repository, DEFAULT_PLAYER_NAME).await;

        assert!(!restored);
        assert_eq!(store.len(), 1);
        let only = store.find("Anonymous").unwrap();
        assert_eq!(only.best_time(), None);
        assert_eq!(only.attempts(), 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_in_order() {
        let repository = MemoryPlayerStore::new();
        let mut store = PlayerStore::new();
        for name in ["Zoe", "Anonymous", "Ada", "Bob"] {
            store.add(name).unwrap();
        }
        for elapsed in [0.5, 0.4, 0.6] {
            store.find_mut("Zoe").unwrap().record_result(elapsed).unwrap();
        }
        store.find_mut("Ada").unwrap().record_result(0.198).unwrap();

        store.save(&repository).await.unwrap();
        let loaded = PlayerStore::load(&repository, DEFAULT_PLAYER_NAME).await;

        assert!(loaded.restored);
        assert_eq!(loaded.store, store);
        assert_eq!(names(&loaded.store), ["Zoe", "Anonymous", "Ada", "Bob"]);
    }

    #[tokio::test]
    async fn invalid_stored_records_fall_back_to_defaults() {
        let repository = MemoryPlayerStore::with_players(vec![PlayerEntity {
            name: "Ada".into(),
            best_time: Some(-3.0),
            attempts: 1,
        }]);

        let loaded = PlayerStore::load(&repository, DEFAULT_PLAYER_NAME).await;

        assert!(!loaded.restored);
        assert_eq!(names(&loaded.store), ["Anonymous"]);
    }

    #[test]
    fn duplicate_stored_names_keep_the_first() {
        let store = PlayerStore::from_entities(vec![
            PlayerEntity {
                name: "Ada".into(),
                best_time: Some(0.3),
                attempts: 2,
            },
            PlayerEntity {
                name: "Ada".into(),
                best_time: None,
                attempts: 0,
            },
        ])
        .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.find("Ada").unwrap().attempts(), 2);
    }

    #[tokio::test]
    async fn failed_save_is_reported() {
        let repository = MemoryPlayerStore::new();
        repository.set_fail_writes(true);

        let store = PlayerStore::seeded(DEFAULT_PLAYER_NAME);
        assert!(store.save(&repository).await.is_err());
        assert!(repository.snapshot().await.is_none());
    }
}
