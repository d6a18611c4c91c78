use std::{env, path::PathBuf};

/// Environment variable overriding the configured store location.
pub const STORE_PATH_ENV: &str = "REFLEX_STORE_PATH";

/// Runtime configuration describing where the player file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    pub path: PathBuf,
}

impl FileStoreConfig {
    /// Construct a configuration pointing at an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the path from [`STORE_PATH_ENV`] when set, otherwise `fallback`.
    pub fn from_env_or(fallback: impl Into<PathBuf>) -> Self {
        let path = env::var_os(STORE_PATH_ENV)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| fallback.into());
        Self { path }
    }

    /// Sibling path used for the write-then-rename step.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_sits_next_to_the_store() {
        let config = FileStoreConfig::new("data/players.json");
        assert_eq!(config.temp_path(), PathBuf::from("data/players.json.tmp"));
    }
}
