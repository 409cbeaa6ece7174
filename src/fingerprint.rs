use heapless::Vec;

use crate::TlsError;
use crate::certificate::Certificate;

/// SHA-1 digest size of a pinned certificate.
pub const CERT_SHA1_SIZE: usize = 20;
/// SHA-256 digest size of a pinned public key.
pub const PUBKEY_SHA256_SIZE: usize = 32;

/// A stored pin. A value assigned with the wrong length is retained so that
/// the slot does not silently fall back to "no pinning", but it is flagged
/// invalid and can never match a digest.
#[derive(Debug, Clone)]
struct StoredPin<const N: usize> {
    bytes: Vec<u8, N>,
    exact: bool,
}

impl<const N: usize> StoredPin<N> {
    fn assign(data: &[u8]) -> Self {
        let len = data.len().min(N);
        let mut bytes = Vec::new();
        // len <= N, the copy cannot fail
        let _ = bytes.extend_from_slice(&data[..len]);
        Self {
            bytes,
            exact: data.len() == N,
        }
    }

    fn matches(&self, digest: &[u8; N]) -> bool {
        self.exact && self.bytes.as_slice() == digest.as_slice()
    }
}

/// Optional fingerprint pins for peer-certificate trust decisions.
///
/// Cloning performs a deep copy of the stored digests; moving transfers
/// ownership as usual.
#[derive(Debug, Clone, Default)]
pub struct Fingerprints {
    cert_sha1: Option<StoredPin<CERT_SHA1_SIZE>>,
    pk_sha256: Option<StoredPin<PUBKEY_SHA256_SIZE>>,
}

impl Fingerprints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins SHA-1(certificate). An empty slice clears the pin and succeeds.
    /// A length other than [`CERT_SHA1_SIZE`] stores the value clamped but
    /// marks it invalid; the call reports the mismatch.
    pub fn set_cert_sha1(&mut self, data: &[u8]) -> Result<(), TlsError> {
        set_pin(&mut self.cert_sha1, data, CERT_SHA1_SIZE)
    }

    /// Pins SHA-256(subject public key info). Same contract as
    /// [`Self::set_cert_sha1`] with [`PUBKEY_SHA256_SIZE`].
    pub fn set_public_key_sha256(&mut self, data: &[u8]) -> Result<(), TlsError> {
        set_pin(&mut self.pk_sha256, data, PUBKEY_SHA256_SIZE)
    }

    /// The stored certificate pin, including an invalid-length one.
    #[must_use]
    pub fn cert_sha1(&self) -> Option<&[u8]> {
        self.cert_sha1.as_ref().map(|pin| pin.bytes.as_slice())
    }

    /// The stored public-key pin, including an invalid-length one.
    #[must_use]
    pub fn public_key_sha256(&self) -> Option<&[u8]> {
        self.pk_sha256.as_ref().map(|pin| pin.bytes.as_slice())
    }

    /// Drops both pins.
    pub fn clear(&mut self) {
        self.cert_sha1 = None;
        self.pk_sha256 = None;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cert_sha1.is_none() && self.pk_sha256.is_none()
    }

    /// True when every configured pin matches the certificate's digest.
    /// No pins configured means this store cannot vouch for anything;
    /// invalid-length pins always fail.
    #[must_use]
    pub fn match_certificate(&self, certificate: &Certificate) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(pin) = &self.cert_sha1 {
            if !pin.matches(&certificate.sha1_fingerprint()) {
                return false;
            }
        }
        if let Some(pin) = &self.pk_sha256 {
            if !pin.matches(&certificate.public_key_sha256()) {
                return false;
            }
        }
        true
    }
}

fn set_pin<const N: usize>(
    slot: &mut Option<StoredPin<N>>,
    data: &[u8],
    expected: usize,
) -> Result<(), TlsError> {
    if data.is_empty() {
        *slot = None;
        return Ok(());
    }

    let pin = StoredPin::assign(data);
    let exact = pin.exact;
    *slot = Some(pin);

    if exact {
        Ok(())
    } else {
        warn!(
            "fingerprint length {} does not match expected {}, pin can never match",
            data.len(),
            expected
        );
        Err(TlsError::InvalidFingerprintLength)
    }
}
