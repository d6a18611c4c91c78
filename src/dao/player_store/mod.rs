pub mod file;
pub mod memory;

use crate::dao::models::PlayerEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use file::FilePlayerStore;
pub use memory::MemoryPlayerStore;

/// Abstraction over the persistence layer for the player collection.
///
/// The whole collection is read and written as one blob; `read` resolves to
/// `Ok(None)` when nothing has been stored yet.
pub trait PlayerRepository: Send + Sync {
    /// Fetch the stored collection, if any.
    fn read(&self) -> BoxFuture<'static, StorageResult<Option<Vec<PlayerEntity>>>>;
    /// Replace the stored collection.
    fn write(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>>;
}
