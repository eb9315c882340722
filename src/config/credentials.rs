// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Encrypted credential storage.
//!
//! The plaintext password never touches a file: it is encrypted with a
//! process-local AES-256-GCM key kept in a dedicated key file, and only the
//! resulting blob goes into the OS secret store keyed by `(service, email)`.
//! Losing the key file makes stored credentials unreadable, which is reported
//! distinctly from "no credential stored".

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info};

use crate::error::CredentialError;

/// Service name used to key entries in the OS secret store
pub const SERVICE_NAME: &str = "coursepull";

const NONCE_LEN: usize = 12;

/// Storage backend for encrypted credential blobs.
///
/// Abstracted so tests (and headless environments without an OS keyring) can
/// substitute an in-memory implementation.
pub trait SecretBackend: Send + Sync {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialError>;
    fn delete(&self, service: &str, account: &str) -> Result<(), CredentialError>;
}

/// Backend storing blobs in the platform secret store
pub struct KeyringBackend;

impl SecretBackend for KeyringBackend {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError> {
        let entry = keyring::Entry::new(service, account)?;
        match entry.get_password() {
            Ok(blob) => Ok(Some(blob)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(service, account)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(service, account)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory backend for tests and environments without a secret store
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl SecretBackend for MemoryBackend {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&(service.to_string(), account.to_string())).cloned())
    }

    fn set(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert((service.to_string(), account.to_string()), value.to_string());
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), CredentialError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

/// One password per email identity, encrypted at rest
pub struct CredentialStore {
    cipher: Aes256Gcm,
    backend: Box<dyn SecretBackend>,
}

impl CredentialStore {
    /// Open the store, creating the key file on first use.
    pub fn new(key_path: &Path, backend: Box<dyn SecretBackend>) -> Result<Self, CredentialError> {
        let cipher = if key_path.exists() {
            let bytes = std::fs::read(key_path).map_err(|e| CredentialError::KeyFile {
                path: key_path.to_path_buf(),
                source: e,
            })?;
            let cipher =
                Aes256Gcm::new_from_slice(&bytes).map_err(|_| CredentialError::InvalidKey {
                    path: key_path.to_path_buf(),
                })?;
            debug!("encryption key loaded from {}", key_path.display());
            cipher
        } else {
            let key = Aes256Gcm::generate_key(OsRng);
            std::fs::write(key_path, key.as_slice()).map_err(|e| CredentialError::KeyFile {
                path: key_path.to_path_buf(),
                source: e,
            })?;
            hide_file(key_path);
            info!("new encryption key generated at {}", key_path.display());
            Aes256Gcm::new(&key)
        };

        Ok(Self {
            cipher,
            backend,
        })
    }

    /// Retrieve and decrypt the password for `email`.
    ///
    /// `Ok(None)` means no credential is stored (or no email is configured);
    /// `Err(CredentialError::Unreadable)` means a blob exists but cannot be
    /// decrypted, typically after a key-file rotation.
    pub fn get(&self, email: &str) -> Result<Option<String>, CredentialError> {
        if email.is_empty() {
            debug!("no email configured, no password to retrieve");
            return Ok(None);
        }
        match self.backend.get(SERVICE_NAME, email)? {
            Some(blob) => self.decrypt(&blob).map(Some),
            None => Ok(None),
        }
    }

    /// Encrypt and store the password for `email`.
    pub fn set(&self, email: &str, password: &str) -> Result<(), CredentialError> {
        if email.is_empty() {
            return Err(CredentialError::EmailNotConfigured);
        }
        if password.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }
        let blob = self.encrypt(password)?;
        self.backend.set(SERVICE_NAME, email, &blob)?;
        info!("password stored for {email}");
        Ok(())
    }

    /// Remove the stored credential for `email`, if any.
    pub fn delete(&self, email: &str) -> Result<(), CredentialError> {
        if email.is_empty() {
            return Ok(());
        }
        self.backend.delete(SERVICE_NAME, email)
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CredentialError::EncryptFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    fn decrypt(&self, blob: &str) -> Result<String, CredentialError> {
        let bytes = BASE64.decode(blob).map_err(|_| CredentialError::Unreadable)?;
        if bytes.len() < NONCE_LEN {
            return Err(CredentialError::Unreadable);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CredentialError::Unreadable)?;
        String::from_utf8(plaintext).map_err(|_| CredentialError::Unreadable)
    }
}

#[cfg(windows)]
fn hide_file(path: &Path) {
    use std::os::windows::ffi::OsStrExt;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    // Best-effort; a visible key file is not an error.
    unsafe {
        winapi::um::fileapi::SetFileAttributesW(
            wide.as_ptr(),
            winapi::um::winnt::FILE_ATTRIBUTE_HIDDEN,
        );
    }
}

#[cfg(not(windows))]
fn hide_file(_path: &Path) {
    // Dotfile naming already hides the key on unix.
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with(dir: &Path, backend: MemoryBackend) -> CredentialStore {
        CredentialStore::new(&dir.join(".key"), Box::new(backend)).unwrap()
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path(), MemoryBackend::default());

        store.set("user@example.com", "hunter2").unwrap();
        let password = store.get("user@example.com").unwrap();

        assert_eq!(password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn plaintext_never_reaches_the_backend() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default();
        let store = store_with(dir.path(), backend.clone());

        store.set("user@example.com", "hunter2").unwrap();

        let raw = backend
            .get(SERVICE_NAME, "user@example.com")
            .unwrap()
            .unwrap();
        assert_ne!(raw, "hunter2");
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn empty_password_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path(), MemoryBackend::default());

        let result = store.set("user@example.com", "");
        assert!(matches!(result, Err(CredentialError::EmptyPassword)));
    }

    #[test]
    fn set_without_email_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path(), MemoryBackend::default());

        let result = store.set("", "hunter2");
        assert!(matches!(result, Err(CredentialError::EmailNotConfigured)));
    }

    #[test]
    fn absent_credential_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path(), MemoryBackend::default());

        assert!(store.get("user@example.com").unwrap().is_none());
        assert!(store.get("").unwrap().is_none());
    }

    #[test]
    fn key_rotation_makes_credential_unreadable_not_absent() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default();

        let store = store_with(dir.path(), backend.clone());
        store.set("user@example.com", "hunter2").unwrap();

        // Simulate losing the key file: a fresh key is generated.
        std::fs::remove_file(dir.path().join(".key")).unwrap();
        let rotated = store_with(dir.path(), backend);

        let result = rotated.get("user@example.com");
        assert!(matches!(result, Err(CredentialError::Unreadable)));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path(), MemoryBackend::default());

        store.set("user@example.com", "hunter2").unwrap();
        store.delete("user@example.com").unwrap();
        store.delete("user@example.com").unwrap();

        assert!(store.get("user@example.com").unwrap().is_none());
    }

    #[test]
    fn key_file_is_created_on_first_use() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join(".key");

        assert!(!key_path.exists());
        let _store = CredentialStore::new(&key_path, Box::new(MemoryBackend::default())).unwrap();
        assert!(key_path.exists());
        assert_eq!(std::fs::read(&key_path).unwrap().len(), 32);
    }
}
