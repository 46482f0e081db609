use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::models::{AuthError, Credentials};

/// JSON-backed credential vault at `~/.local/share/{app}/auth.json`.
///
/// Grounded on `auth/storage.py`'s `SecureAuthStorage`: write the whole
/// provider -> credentials map back on every save, `0600` permissions after
/// every write, and a malformed file is treated as an empty store rather
/// than a hard error (spec.md §4.2).
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(app_name: &str) -> Self {
        let base = dirs_home().join(".local").join("share").join(app_name);
        Self {
            path: base.join("auth.json"),
        }
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save(&self, provider: &str, creds: &Credentials) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut data = self.load_all()?;
        data.insert(provider.to_string(), creds.clone());

        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.path, json)?;
        set_owner_only(&self.path)?;

        debug!(provider, "saved credentials");
        Ok(())
    }

    pub fn load(&self, provider: &str) -> Result<Option<Credentials>, AuthError> {
        let data = self.load_all()?;
        Ok(data.get(provider).cloned())
    }

    pub fn remove(&self, provider: &str) -> Result<(), AuthError> {
        let mut data = self.load_all()?;
        data.remove(provider);
        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.path, json)?;
        set_owner_only(&self.path)?;
        Ok(())
    }

    fn load_all(&self) -> Result<HashMap<String, Credentials>, AuthError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        // Malformed JSON is treated as an empty store, not an error.
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), AuthError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), AuthError> {
    Ok(())
}

fn dirs_home() -> PathBuf {
    dirs_next_home().unwrap_or_else(|| PathBuf::from("."))
}

fn dirs_next_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_oauth_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::at_path(dir.path().join("auth.json"));

        let creds = Credentials::OAuth {
            refresh: "r".into(),
            access: "a".into(),
            expires: 123,
        };
        store.save("anthropic", &creds).unwrap();

        let loaded = store.load("anthropic").unwrap();
        assert_eq!(loaded, Some(creds));
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::at_path(dir.path().join("nope").join("auth.json"));
        assert_eq!(store.load("anthropic").unwrap(), None);
    }

    #[test]
    fn malformed_json_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = AuthStore::at_path(path);
        assert_eq!(store.load("anthropic").unwrap(), None);
    }

    #[test]
    fn remove_drops_only_named_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::at_path(dir.path().join("auth.json"));
        store
            .save("anthropic", &Credentials::Api { key: "k".into() })
            .unwrap();
        store
            .save("other", &Credentials::Api { key: "k2".into() })
            .unwrap();
        store.remove("anthropic").unwrap();
        assert_eq!(store.load("anthropic").unwrap(), None);
        assert!(store.load("other").unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let store = AuthStore::at_path(path.clone());
        store
            .save("anthropic", &Credentials::Api { key: "k".into() })
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
