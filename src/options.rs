use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The environment variable holding the default account name.
pub const ACCOUNT_ENV: &str = "BLOB_STORAGE_ACCOUNT";

/// The environment variable holding the default account secret key.
pub const ACCESS_KEY_ENV: &str = "BLOB_STORAGE_ACCESS_KEY";

/// Resolved storage account credentials.
///
/// Immutable for the lifetime of the backend instance that was built from
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account: String,
    pub access_key: String,
}

/// Construction options for a storage backend.
///
/// Both fields may be omitted: omitted fields are resolved from the
/// `BLOB_STORAGE_ACCOUNT` and `BLOB_STORAGE_ACCESS_KEY` environment
/// variables at resolution time. Resolution happens once, when the backend
/// is constructed; credentials are never re-read afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageOptions {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(
        account: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            account: Some(account.into()),
            access_key: Some(access_key.into()),
        }
    }

    /// Whether any credential field was set explicitly.
    pub fn has_explicit_credentials(&self) -> bool {
        self.account.is_some() || self.access_key.is_some()
    }

    /// Resolves the effective credentials, falling back to the environment
    /// for any field not set explicitly.
    ///
    /// # Errors
    ///
    /// `Error::Config` if a field is missing from both the options and the
    /// environment, or resolves to an empty string.
    pub fn resolve_credentials(&self) -> Result<AccountCredentials> {
        let account = resolve_field(self.account.as_deref(), ACCOUNT_ENV, "account name")?;
        let access_key =
            resolve_field(self.access_key.as_deref(), ACCESS_KEY_ENV, "account key")?;

        Ok(AccountCredentials {
            account,
            access_key,
        })
    }
}

fn resolve_field(explicit: Option<&str>, env_var: &str, what: &str) -> Result<String> {
    let value = match explicit {
        Some(value) => value.to_owned(),
        None => std::env::var(env_var).map_err(|_| {
            Error::Config(format!("no {} provided and {} is not set", what, env_var))
        })?,
    };

    if value.is_empty() {
        return Err(Error::Config(format!("{} is empty", what)));
    }

    Ok(value)
}
