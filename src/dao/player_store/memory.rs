//! Volatile player repository used by tests and by the driver when persistence is disabled.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::dao::{
    models::PlayerEntity,
    player_store::PlayerRepository,
    storage::{StorageError, StorageResult},
};

/// Player repository keeping the last written collection in memory.
#[derive(Clone, Default)]
pub struct MemoryPlayerStore {
    slot: Arc<Mutex<Option<Vec<PlayerEntity>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryPlayerStore {
    /// Create an empty store, as if nothing had ever been saved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `players`.
    pub fn with_players(players: Vec<PlayerEntity>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(players))),
            fail_writes: Arc::default(),
        }
    }

    /// Make subsequent writes fail (or succeed again) to exercise save error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Copy of the last successfully written collection.
    pub async fn snapshot(&self) -> Option<Vec<PlayerEntity>> {
        self.slot.lock().await.clone()
    }
}

impl PlayerRepository for MemoryPlayerStore {
    fn read(&self) -> BoxFuture<'static, StorageResult<Option<Vec<PlayerEntity>>>> {
        let slot = Arc::clone(&self.slot);
        Box::pin(async move { Ok(slot.lock().await.clone()) })
    }

    fn write(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let slot = Arc::clone(&self.slot);
        let fail = self.fail_writes.load(Ordering::Relaxed);
        Box::pin(async move {
            if fail {
                return Err(StorageError::unavailable(
                    "memory store rejected the write".into(),
                    io::Error::other("write disabled"),
                ));
            }
            *slot.lock().await = Some(players);
            Ok(())
        })
    }
}
