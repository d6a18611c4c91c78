use std::{io::ErrorKind, path::Path, sync::Arc};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::debug;

use crate::dao::{models::PlayerEntity, player_store::PlayerRepository, storage::StorageResult};

use super::{
    config::FileStoreConfig,
    error::{FileResult, FileStoreError},
    models::{DOCUMENT_VERSION, PlayerDocument},
};

/// Player repository persisting the collection as a single JSON document.
#[derive(Clone)]
pub struct FilePlayerStore {
    config: Arc<FileStoreConfig>,
}

impl FilePlayerStore {
    /// Repository backed by the file described in `config`.
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    async fn read_document(&self) -> FileResult<Option<PlayerDocument>> {
        let path = &self.config.path;
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FileStoreError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };

        let document: PlayerDocument =
            serde_json::from_str(&contents).map_err(|source| FileStoreError::Decode {
                path: path.clone(),
                source,
            })?;

        if document.version != DOCUMENT_VERSION {
            return Err(FileStoreError::UnsupportedVersion {
                path: path.clone(),
                version: document.version,
            });
        }

        Ok(Some(document))
    }

    async fn write_document(&self, document: &PlayerDocument) -> FileResult<()> {
        let path = &self.config.path;
        let encoded = serde_json::to_string_pretty(document)
            .map_err(|source| FileStoreError::Encode { source })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| FileStoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let temp_path = self.config.temp_path();
        fs::write(&temp_path, encoded)
            .await
            .map_err(|source| FileStoreError::Write {
                path: temp_path.clone(),
                source,
            })?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|source| FileStoreError::Rename {
                path: path.clone(),
                source,
            })?;

        debug!(
            path = %path.display(),
            count = document.players.len(),
            "player file written"
        );
        Ok(())
    }
}

impl PlayerRepository for FilePlayerStore {
    fn read(&self) -> BoxFuture<'static, StorageResult<Option<Vec<PlayerEntity>>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.read_document().await?;
            Ok(document.map(|doc| doc.players))
        })
    }

    fn write(&self, players: Vec<PlayerEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = PlayerDocument::from_entities(players);
            store.write_document(&document).await.map_err(Into::into)
        })
    }
}
