//! Secret store backends used to obtain the messaging credential.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

#[cfg(feature = "vault-age")]
use std::collections::HashMap;
#[cfg(feature = "vault-age")]
use std::path::{Path, PathBuf};

/// A credential value. Never printed.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Future returned by [`VaultProvider::get_secret`].
pub type SecretFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>>;

/// Pluggable secret retrieval backend.
///
/// `Ok(None)` means the backend works but holds nothing at `path`.
pub trait VaultProvider: Send + Sync {
    fn get_secret(&self, path: &str) -> SecretFuture<'_>;
}

/// Reads secrets from the process environment.
///
/// A secret path maps to a variable name by upper-casing it and replacing
/// every other character with `_`, so `/alerts/slack-token` is read from
/// `ALERTS_SLACK_TOKEN`. Empty values count as missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvVaultProvider;

impl EnvVaultProvider {
    #[must_use]
    pub fn var_name(path: &str) -> String {
        path.trim_matches('/')
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl VaultProvider for EnvVaultProvider {
    fn get_secret(&self, path: &str) -> SecretFuture<'_> {
        let var = Self::var_name(path);
        let value = std::env::var(&var).ok().filter(|v| !v.is_empty());
        tracing::debug!(path, %var, found = value.is_some(), "env secret lookup");
        Box::pin(std::future::ready(Ok(value)))
    }
}

#[cfg(feature = "vault-age")]
#[derive(Debug, thiserror::Error)]
pub enum AgeVaultError {
    #[error("cannot read age identity {}: {source}", path.display())]
    IdentityFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no usable x25519 identity in {}: {reason}", path.display())]
    InvalidIdentity { path: PathBuf, reason: String },

    #[error("cannot read secrets file {}: {source}", path.display())]
    SecretsFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot decrypt {}: {source}", path.display())]
    Decrypt {
        path: PathBuf,
        source: age::DecryptError,
    },

    #[error("{} is not a JSON object of string secrets: {source}", path.display())]
    Payload {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Secrets held encrypted at rest in an age file containing a JSON object
/// keyed by secret path (`{"/alerts/slack-token": "xoxb-..."}`).
///
/// The file is decrypted once when the provider is opened.
#[cfg(feature = "vault-age")]
pub struct AgeVaultProvider {
    origin: PathBuf,
    secrets: HashMap<String, Secret>,
}

#[cfg(feature = "vault-age")]
impl fmt::Debug for AgeVaultProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgeVaultProvider")
            .field("origin", &self.origin)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

#[cfg(feature = "vault-age")]
impl AgeVaultProvider {
    /// Decrypt `vault_path` with the x25519 identity found in `key_path`.
    ///
    /// # Errors
    ///
    /// Returns [`AgeVaultError`] naming the file that could not be read,
    /// parsed or decrypted.
    pub fn open(key_path: &Path, vault_path: &Path) -> Result<Self, AgeVaultError> {
        let identity = read_identity(key_path)?;
        let ciphertext =
            std::fs::read(vault_path).map_err(|source| AgeVaultError::SecretsFile {
                path: vault_path.to_owned(),
                source,
            })?;
        let plaintext =
            age::decrypt(&identity, &ciphertext).map_err(|source| AgeVaultError::Decrypt {
                path: vault_path.to_owned(),
                source,
            })?;
        let secrets: HashMap<String, String> =
            serde_json::from_slice(&plaintext).map_err(|source| AgeVaultError::Payload {
                path: vault_path.to_owned(),
                source,
            })?;
        tracing::info!(path = %vault_path.display(), count = secrets.len(), "age secrets loaded");
        Ok(Self {
            origin: vault_path.to_owned(),
            secrets: secrets
                .into_iter()
                .map(|(path, value)| (path, Secret::new(value)))
                .collect(),
        })
    }
}

/// First `AGE-SECRET-KEY-` line of an age-keygen style identity file.
#[cfg(feature = "vault-age")]
fn read_identity(path: &Path) -> Result<age::x25519::Identity, AgeVaultError> {
    let contents = std::fs::read_to_string(path).map_err(|source| AgeVaultError::IdentityFile {
        path: path.to_owned(),
        source,
    })?;
    let invalid = |reason: &str| AgeVaultError::InvalidIdentity {
        path: path.to_owned(),
        reason: reason.to_owned(),
    };
    let line = contents
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("AGE-SECRET-KEY-"))
        .ok_or_else(|| invalid("no AGE-SECRET-KEY line"))?;
    line.parse().map_err(|e: &str| invalid(e))
}

#[cfg(feature = "vault-age")]
impl VaultProvider for AgeVaultProvider {
    fn get_secret(&self, path: &str) -> SecretFuture<'_> {
        let value = self.secrets.get(path).map(|s| s.expose().to_owned());
        tracing::debug!(
            path,
            origin = %self.origin.display(),
            found = value.is_some(),
            "age secret lookup"
        );
        Box::pin(std::future::ready(Ok(value)))
    }
}

/// In-memory provider for runner tests.
#[cfg(test)]
#[derive(Default)]
pub struct MockVaultProvider {
    secrets: std::collections::HashMap<String, String>,
    fail_with: Option<String>,
}

#[cfg(test)]
impl MockVaultProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, path: &str, value: &str) -> Self {
        self.secrets.insert(path.to_owned(), value.to_owned());
        self
    }

    /// Make every lookup fail with a backend error.
    #[must_use]
    pub fn failing(mut self, reason: &str) -> Self {
        self.fail_with = Some(reason.to_owned());
        self
    }
}

#[cfg(test)]
impl VaultProvider for MockVaultProvider {
    fn get_secret(&self, path: &str) -> SecretFuture<'_> {
        let result = match &self.fail_with {
            Some(reason) => Err(anyhow::anyhow!("{reason}")),
            None => Ok(self.secrets.get(path).cloned()),
        };
        Box::pin(std::future::ready(result))
    }
}
