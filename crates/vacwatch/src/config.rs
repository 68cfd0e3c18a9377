//! Runtime configuration: data directory, state file paths and the bot token.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable (and `.env` key) holding the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Value shipped in sample `.env` files; never a real token.
pub const TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

const FILTERS_FILE: &str = "filters.json";
const SEEN_FILE: &str = "seen_vacancies.json";
const ENV_FILE: &str = ".env";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no bot token: pass --token, set TELEGRAM_BOT_TOKEN, or add it to {}", .env_file.display())]
    MissingToken { env_file: PathBuf },

    #[error("bot token is still the placeholder value")]
    PlaceholderToken,
}

/// Where vacwatch keeps its state.
#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn filters(&self) -> PathBuf {
        self.data_dir.join(FILTERS_FILE)
    }

    pub fn seen(&self) -> PathBuf {
        self.data_dir.join(SEEN_FILE)
    }

    pub fn env_file(&self) -> PathBuf {
        self.data_dir.join(ENV_FILE)
    }
}

/// Platform data directory for vacwatch, or the working directory when the
/// platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("vacwatch"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Pick the bot token: the flag (which clap already fills from the
/// environment) wins, then the `.env` file in the data directory.
pub fn resolve_token(flag: Option<String>, paths: &Paths) -> Result<String, ConfigError> {
    let env_file = paths.env_file();
    let token = flag
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| read_env_value(&env_file, TOKEN_ENV));

    match token {
        None => Err(ConfigError::MissingToken { env_file }),
        Some(t) if t == TOKEN_PLACEHOLDER => Err(ConfigError::PlaceholderToken),
        Some(t) => Ok(t),
    }
}

/// Look up `key` in a dotenv file without touching the process environment.
fn read_env_value(path: &Path, key: &str) -> Option<String> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no env file");
            return None;
        }
    };

    for entry in entries {
        match entry {
            Ok((name, value)) if name == key => {
                let value = value.trim();
                return (!value.is_empty()).then(|| value.to_string());
            }
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed env file");
                return None;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn flag_wins_over_env_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "TELEGRAM_BOT_TOKEN=from-file\n").unwrap();
        let paths = Paths::new(dir.path());

        let token = resolve_token(Some("from-flag".to_string()), &paths).unwrap();

        assert_eq!(token, "from-flag");
    }

    #[test]
    fn env_file_is_the_fallback() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "# bot settings\nOTHER=1\nexport TELEGRAM_BOT_TOKEN=\"123:abc\"\n",
        )
        .unwrap();
        let paths = Paths::new(dir.path());

        assert_eq!(resolve_token(None, &paths).unwrap(), "123:abc");
        assert_eq!(resolve_token(Some("  ".to_string()), &paths).unwrap(), "123:abc");
    }

    #[test]
    fn missing_token_names_the_env_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        let err = resolve_token(None, &paths).unwrap_err();

        assert!(matches!(err, ConfigError::MissingToken { .. }));
        assert!(err.to_string().contains(".env"));
    }

    #[test]
    fn placeholder_token_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "TELEGRAM_BOT_TOKEN='YOUR_BOT_TOKEN_HERE'\n").unwrap();
        let paths = Paths::new(dir.path());

        assert!(matches!(
            resolve_token(None, &paths),
            Err(ConfigError::PlaceholderToken)
        ));
        assert!(matches!(
            resolve_token(Some(TOKEN_PLACEHOLDER.to_string()), &paths),
            Err(ConfigError::PlaceholderToken)
        ));
    }

    #[test]
    fn empty_value_in_env_file_counts_as_missing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "TELEGRAM_BOT_TOKEN=\n").unwrap();
        let paths = Paths::new(dir.path());

        assert!(matches!(
            resolve_token(None, &paths),
            Err(ConfigError::MissingToken { .. })
        ));
    }

    #[test]
    fn state_files_live_in_the_data_dir() {
        let paths = Paths::new("/var/lib/vacwatch");
        assert_eq!(paths.filters(), PathBuf::from("/var/lib/vacwatch/filters.json"));
        assert_eq!(paths.seen(), PathBuf::from("/var/lib/vacwatch/seen_vacancies.json"));
    }
}
