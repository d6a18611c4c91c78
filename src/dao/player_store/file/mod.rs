mod config;
mod error;
mod models;
mod store;

pub use config::{FileStoreConfig, STORE_PATH_ENV};
pub use error::{FileResult, FileStoreError};
pub use store::FilePlayerStore;
