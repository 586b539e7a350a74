//! API key storage and lookup.

use crate::core::keyring::{CredentialSlot, KeyringAccessError};
use std::fmt;
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

const API_KEY_SLOT: CredentialSlot = CredentialSlot::new("vibecode", "gemini");

/// Environment variables checked, in order, before the keyring.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySource {
    Env(&'static str),
    Keyring,
}

impl fmt::Display for ApiKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeySource::Env(name) => write!(f, "environment ({name})"),
            ApiKeySource::Keyring => write!(f, "system keyring"),
        }
    }
}

pub struct AuthManager {
    use_keyring: bool,
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthManager {
    pub fn new() -> Self {
        Self::new_with_keyring(true)
    }

    /// Construct an AuthManager, optionally disabling keyring access (useful for tests)
    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    /// Find an API key in the environment or, failing that, the keyring.
    ///
    /// A keyring that is only temporarily unavailable is treated as empty.
    pub fn resolve_api_key(&self) -> Result<Option<(String, ApiKeySource)>, KeyringAccessError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    fn resolve_api_key_with<F>(
        &self,
        lookup_env: F,
    ) -> Result<Option<(String, ApiKeySource)>, KeyringAccessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for name in API_KEY_ENV_VARS {
            if let Some(key) = lookup_env(name).filter(|k| !k.trim().is_empty()) {
                debug!(source = name, "Using API key from environment");
                return Ok(Some((key.trim().to_string(), ApiKeySource::Env(name))));
            }
        }

        match self.get_stored_key() {
            Ok(Some(key)) => Ok(Some((key, ApiKeySource::Keyring))),
            Ok(None) => Ok(None),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "Keyring lookup failed; continuing without a stored key");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn store_key(&self, key: &str) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }
        API_KEY_SLOT.write(key)
    }

    pub fn get_stored_key(&self) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }
        API_KEY_SLOT.read()
    }

    /// Delete the stored key. Returns false if none was stored.
    pub fn remove_key(&self) -> Result<bool, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(false);
        }
        API_KEY_SLOT.delete()
    }

    pub fn interactive_auth(&self) -> Result<(), Box<dyn std::error::Error>> {
        println!("🔐 vibecode authentication");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Create a key at https://aistudio.google.com/apikey");
        println!();
        print!("Enter your Gemini API key: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        let key = input.trim();
        if key.is_empty() {
            return Err("API key cannot be empty".into());
        }

        self.store_key(key)?;
        println!("✓ Key stored securely in the system keyring");
        Ok(())
    }

    pub fn interactive_deauth(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.remove_key()? {
            println!("✅ Stored API key removed");
        } else {
            println!("No stored API key found.");
        }
        for name in API_KEY_ENV_VARS {
            if std::env::var_os(name).is_some() {
                println!("Note: {name} is still set in the environment.");
            }
        }
        Ok(())
    }
}
