//! Saved service accounts.
//!
//! Accounts live in an INI file, by default `$HOME/.qiskit/tergiterc`, with
//! one section per account:
//!
//! ```ini
//! [service local]
//! url = http://localhost:8002
//! token = ...
//! ```
//!
//! Keys other than `url` and `token` are kept as extras.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::{debug, warn};

use crate::error::{HalError, HalResult};

const SECTION_PREFIX: &str = "service";

/// Connection details of one service.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// Name the account is saved under.
    pub service_name: String,
    /// Service base URL.
    pub url: String,
    /// Bearer token, for services that require one.
    pub token: Option<String>,
    /// Additional keys stored with the account.
    pub extras: BTreeMap<String, String>,
}

impl fmt::Debug for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountInfo")
            .field("service_name", &self.service_name)
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("extras", &self.extras)
            .finish()
    }
}

impl AccountInfo {
    pub fn new(service_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            url: url.into(),
            token: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    fn section(&self) -> String {
        format!("{SECTION_PREFIX} {}", self.service_name)
    }
}

/// The default account file location.
pub fn default_rc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".qiskit").join("tergiterc"))
}

/// Reads and writes the account file.
#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by the default location.
    pub fn default_location() -> HalResult<Self> {
        default_rc_path()
            .map(Self::new)
            .ok_or_else(|| HalError::Configuration("cannot determine home directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> HalResult<Option<Ini>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(Ini::load_from_file(&self.path)?))
    }

    /// All valid accounts in the file. A missing file holds no accounts.
    pub fn load(&self) -> HalResult<Vec<AccountInfo>> {
        let Some(ini) = self.read()? else {
            debug!(path = %self.path.display(), "account file does not exist");
            return Ok(Vec::new());
        };

        let mut accounts = Vec::new();
        for (section, props) in ini.iter() {
            let Some(section) = section.map(str::trim) else {
                continue;
            };
            if !section.starts_with(SECTION_PREFIX) {
                continue;
            }
            let Some(service_name) = section
                .split_once(' ')
                .map(|(_, name)| name.trim())
                .filter(|name| !name.is_empty())
            else {
                warn!(section, "Skipping account provider without a service name");
                continue;
            };
            let Some(url) = props.get("url") else {
                warn!(section, "Skipping account provider. Invalid configuration.");
                continue;
            };

            let mut account = AccountInfo::new(service_name, url);
            for (key, value) in props.iter() {
                match key {
                    "url" | "service_name" => {}
                    "token" => account.token = Some(value.to_string()),
                    _ => {
                        account.extras.insert(key.to_string(), value.to_string());
                    }
                }
            }
            accounts.push(account);
        }
        Ok(accounts)
    }

    /// Write `accounts`, replacing saved accounts of the same name and
    /// keeping the others.
    pub fn save(&self, accounts: &[AccountInfo]) -> HalResult<()> {
        if accounts.is_empty() {
            return Err(HalError::Configuration(
                "Cannot save account(s). None given.".into(),
            ));
        }

        let mut ini = self.read()?.unwrap_or_default();
        for account in accounts {
            let section = account.section();
            ini.delete(Some(section.as_str()));
            let mut setter = ini.with_section(Some(section.as_str()));
            setter.set("url", account.url.as_str());
            if let Some(token) = &account.token {
                setter.set("token", token.as_str());
            }
            for (key, value) in &account.extras {
                setter.set(key.as_str(), value.as_str());
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        ini.write_to_file(&self.path)?;
        debug!(path = %self.path.display(), count = accounts.len(), "saved accounts");
        Ok(())
    }

    /// Remove the account saved as `service_name`. Returns whether it existed.
    pub fn delete(&self, service_name: &str) -> HalResult<bool> {
        let Some(mut ini) = self.read()? else {
            return Ok(false);
        };
        let section = format!("{SECTION_PREFIX} {service_name}");
        if ini.delete(Some(section.as_str())).is_none() {
            return Ok(false);
        }
        ini.write_to_file(&self.path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, AccountStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::new(dir.path().join(".qiskit").join("tergiterc"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());
        assert!(!store.delete("local").unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = store();
        let local = AccountInfo::new("local", "http://localhost:8002")
            .with_token("secret")
            .with_extra("project", "qal9000");
        let remote = AccountInfo::new("remote", "https://api.example.org");
        store.save(&[local.clone(), remote.clone()]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec![local, remote]);
    }

    #[test]
    fn test_save_replaces_same_name() {
        let (_dir, store) = store();
        store
            .save(&[AccountInfo::new("local", "http://old")])
            .unwrap();
        store
            .save(&[AccountInfo::new("other", "http://other")])
            .unwrap();
        store
            .save(&[AccountInfo::new("local", "http://new")])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        let local = loaded.iter().find(|a| a.service_name == "local").unwrap();
        assert_eq!(local.url, "http://new");
    }

    #[test]
    fn test_save_nothing_rejected() {
        let (_dir, store) = store();
        let err = store.save(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Cannot save account(s). None given."
        );
    }

    #[test]
    fn test_invalid_sections_skipped() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            "[service good]\nurl = http://good\n\n[service nourl]\ntoken = t\n\n[other]\nurl = http://ignored\n",
        )
        .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].service_name, "good");
        assert!(loaded[0].token.is_none());
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = store();
        store
            .save(&[
                AccountInfo::new("a", "http://a"),
                AccountInfo::new("b", "http://b"),
            ])
            .unwrap();
        assert!(store.delete("a").unwrap());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].service_name, "b");
    }

    #[test]
    fn test_debug_redacts_token() {
        let account = AccountInfo::new("local", "http://x").with_token("secret");
        let debug = format!("{account:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
