//! The credential store capability.
//!
//! The lobby doesn't own user accounts; the surrounding website does. All
//! the engine needs from it is three questions about a name, captured by
//! the [`CredentialStore`] trait. [`MemoryCredentials`] is the store the
//! server ships with, filled from a flat file or a JSON file.
//!
//! # Why a trait?
//!
//! A deployment can answer these questions from a database, a test can
//! answer them from a handful of inserted users, and the engine is
//! written against neither.

use std::collections::HashMap;
use std::path::Path;

use metaserver_protocol::Permission;
use serde::Deserialize;

use crate::CredentialsError;

/// Answers questions about registered users.
///
/// Calls are synchronous and expected to be cheap: the engine asks while
/// handling a command and doesn't yield in between.
pub trait CredentialStore: Send + Sync + 'static {
    /// Whether `name` belongs to a registered user.
    fn is_registered(&self, name: &str) -> bool;

    /// The permission level of `name`; `Unregistered` for unknown users.
    fn permission_for(&self, name: &str) -> Permission;

    /// Whether `password` is correct for `name`. False for unknown users.
    fn verify_password(&self, name: &str, password: &str) -> bool;
}

// ---------------------------------------------------------------------------
// MemoryCredentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Account {
    password: String,
    permission: Permission,
}

/// One account as written in a JSON credential file.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    name: String,
    password: String,
    permission: Permission,
}

/// An in-memory credential store.
///
/// An empty store (the default) knows no users, so every registered login
/// fails and only anonymous logins work.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    accounts: HashMap<String, Account>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        password: impl Into<String>,
        permission: Permission,
    ) {
        self.accounts.insert(
            name.into(),
            Account {
                password: password.into(),
                permission,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Parses the flat format: one `name<TAB>password<TAB>PERMISSION` per
    /// line. Blank lines and lines starting with `#` are skipped.
    ///
    /// ```rust
    /// use metaserver_session::{CredentialStore, MemoryCredentials};
    ///
    /// let store = MemoryCredentials::from_flat(
    ///     "SirVer\t123456\tSUPERUSER\notto\tottoiscool\tREGISTERED\n",
    /// ).unwrap();
    /// assert!(store.verify_password("otto", "ottoiscool"));
    /// ```
    pub fn from_flat(text: &str) -> Result<Self, CredentialsError> {
        let mut store = Self::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |message: String| CredentialsError::Malformed {
                line: index + 1,
                message,
            };

            let columns: Vec<&str> = line.split('\t').collect();
            let [name, password, permission] = columns[..] else {
                return Err(malformed(format!(
                    "expected 3 tab-separated columns, found {}",
                    columns.len()
                )));
            };
            let permission: Permission = permission
                .trim()
                .parse()
                .map_err(|e| malformed(format!("{e}")))?;
            store.insert(name, password, permission);
        }
        Ok(store)
    }

    /// Parses a JSON array of `{ "name", "password", "permission" }`.
    pub fn from_json(text: &str) -> Result<Self, CredentialsError> {
        let records: Vec<AccountRecord> = serde_json::from_str(text)?;
        let mut store = Self::new();
        for record in records {
            store.insert(record.name, record.password, record.permission);
        }
        Ok(store)
    }

    /// Loads a credential file, JSON if the extension is `.json`, flat
    /// otherwise.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            CredentialsError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let store = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_flat(&text)?
        };
        tracing::info!(path = %path.display(), users = store.len(), "credentials loaded");
        Ok(store)
    }
}

impl CredentialStore for MemoryCredentials {
    fn is_registered(&self, name: &str) -> bool {
        self.accounts.contains_key(name)
    }

    fn permission_for(&self, name: &str) -> Permission {
        self.accounts
            .get(name)
            .map_or(Permission::Unregistered, |a| a.permission)
    }

    fn verify_password(&self, name: &str, password: &str) -> bool {
        self.accounts
            .get(name)
            .is_some_and(|a| a.password == password)
    }
}
