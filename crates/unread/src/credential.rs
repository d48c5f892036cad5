//! Credential store holding the single API token
//!
//! The token is resolved lazily from a [`TokenSource`] the first time an
//! authenticated call needs it. Every replacement bumps a generation counter
//! so results computed under an older token can be recognized and dropped.

use log::{debug, warn};

use crate::config::Settings;
use crate::error::{Error, Result};

/// Where the store resolves a token from when it has none cached
pub trait TokenSource: Send + Sync {
    /// Read the currently configured token, `None` if there isn't one
    fn load_token(&self) -> anyhow::Result<Option<String>>;
}

/// Reads the token from the settings file (and `SLACK_TOKEN`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingsTokenSource;

impl TokenSource for SettingsTokenSource {
    fn load_token(&self) -> anyhow::Result<Option<String>> {
        let settings = Settings::load()?;
        Ok(settings.token().map(str::to_string))
    }
}

/// A fixed token, used when the caller already knows it
#[derive(Debug, Clone)]
pub struct StaticTokenSource(pub Option<String>);

impl TokenSource for StaticTokenSource {
    fn load_token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Holds the bearer token and its generation
pub struct CredentialStore {
    token: Option<String>,
    generation: u64,
    source: Box<dyn TokenSource>,
}

impl CredentialStore {
    /// Create an empty store backed by `source`
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            token: None,
            generation: 0,
            source,
        }
    }

    /// Get the cached token, resolving it from the source if needed.
    ///
    /// Fails with [`Error::NoCredential`] when the source has nothing either.
    pub fn get(&mut self) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }

        match self.source.load_token() {
            Ok(Some(token)) => {
                debug!("Resolved API token from settings");
                self.token = Some(token.clone());
                Ok(token)
            }
            Ok(None) => Err(Error::NoCredential),
            Err(e) => {
                warn!("Failed to read token from settings: {:#}", e);
                Err(Error::NoCredential)
            }
        }
    }

    /// Cached token without consulting the source
    pub fn current(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Replace the token and start a new generation.
    ///
    /// Returns `false` (and changes nothing) if `token` equals the cached one.
    pub fn set(&mut self, token: Option<String>) -> bool {
        let token = token.filter(|t| !t.trim().is_empty());
        if token == self.token {
            return false;
        }
        self.token = token;
        self.generation += 1;
        true
    }

    /// Generation of the current token
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
