use heapless::{String, Vec};

use crate::TlsError;
use crate::config::{MAX_CERTIFICATE_SIZE, MAX_PASSWORD_SIZE, MAX_PRIVATE_KEY_SIZE};

/// Server-side identity material: private key, certificate, and an optional
/// key password.
///
/// `assign` is atomic with respect to partial failure: previously-held state
/// is released first, and any copy failure leaves the pair fully cleared.
/// No mixed old/new identity is ever observable.
#[derive(Debug, Clone, Default)]
pub struct KeyCertPair {
    key: Vec<u8, MAX_PRIVATE_KEY_SIZE>,
    certificate: Vec<u8, MAX_CERTIFICATE_SIZE>,
    password: String<MAX_PASSWORD_SIZE>,
}

impl KeyCertPair {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole identity. Frees the current state first; on any
    /// failure the pair is left cleared and the error is returned.
    pub fn assign(
        &mut self,
        key: &[u8],
        certificate: &[u8],
        password: Option<&str>,
    ) -> Result<(), TlsError> {
        self.free();

        if self.key.extend_from_slice(key).is_err() {
            self.free();
            return Err(TlsError::OutOfMemory);
        }
        if self.certificate.extend_from_slice(certificate).is_err() {
            self.free();
            return Err(TlsError::OutOfMemory);
        }
        if let Some(password) = password {
            if self.password.push_str(password).is_err() {
                self.free();
                return Err(TlsError::OutOfMemory);
            }
        }
        Ok(())
    }

    /// Sets or clears the key password. `None` and `""` both clear it;
    /// an explicit no-password state is a valid outcome, not a failure.
    pub fn set_password(&mut self, password: Option<&str>) -> Result<(), TlsError> {
        self.password.clear();
        match password {
            None | Some("") => Ok(()),
            Some(password) => self
                .password
                .push_str(password)
                .map_err(|()| TlsError::OutOfMemory),
        }
    }

    /// Releases all identity material.
    pub fn free(&mut self) {
        self.key.clear();
        self.certificate.clear();
        self.password.clear();
    }

    /// True when both key and certificate are present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty() && !self.certificate.is_empty()
    }

    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    #[must_use]
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(&self.password)
        }
    }
}
