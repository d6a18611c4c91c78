/// Database model definitions.
pub mod models;
/// Player profile persistence backends.
pub mod player_store;
/// Storage abstraction layer for persistence operations.
pub mod storage;
