//! Thin wrapper over the platform credential store.

use std::error::Error;
use std::fmt;

use keyring::Entry;

/// Keyring failure, split by whether the API key lookup may carry on
/// without a stored key.
///
/// A locked or unreachable backend is `Recoverable`: the key can still
/// come from the environment. Anything else is `Permanent` and is reported.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyring unavailable: {}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// One service/user slot in the keyring. A missing entry reads as `None`
/// rather than an error.
#[derive(Debug, Clone, Copy)]
pub struct CredentialSlot {
    service: &'static str,
    user: &'static str,
}

impl CredentialSlot {
    pub const fn new(service: &'static str, user: &'static str) -> Self {
        Self { service, user }
    }

    fn entry(&self) -> Result<Entry, KeyringAccessError> {
        Ok(Entry::new(self.service, self.user)?)
    }

    pub fn read(&self) -> Result<Option<String>, KeyringAccessError> {
        absent_as_none(self.entry()?.get_password())
    }

    pub fn write(&self, secret: &str) -> Result<(), KeyringAccessError> {
        self.entry()?.set_password(secret)?;
        Ok(())
    }

    /// Returns false when nothing was stored.
    pub fn delete(&self) -> Result<bool, KeyringAccessError> {
        Ok(absent_as_none(self.entry()?.delete_credential())?.is_some())
    }
}

fn absent_as_none<T>(result: keyring::Result<T>) -> Result<Option<T>, KeyringAccessError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_backend_is_recoverable() {
        let err = KeyringAccessError::from(keyring::Error::NoStorageAccess("locked".into()));
        assert!(err.is_recoverable());

        let err = KeyringAccessError::from(keyring::Error::TooLong("user".into(), 255));
        assert!(!err.is_recoverable());
        assert!(err.to_string().starts_with("Keyring unavailable: "));
    }

    #[test]
    fn missing_entry_reads_as_none() {
        assert_eq!(absent_as_none::<String>(Err(keyring::Error::NoEntry)).unwrap(), None);
        assert_eq!(absent_as_none(Ok(())).unwrap(), Some(()));

        let err = absent_as_none::<()>(Err(keyring::Error::PlatformFailure("dbus".into())))
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
