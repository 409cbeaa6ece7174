use core::fmt;

use digest::Digest;
use heapless::{String, Vec};
use sha1::Sha1;
use sha2::Sha256;

use crate::TlsError;
use crate::config::{MAX_CERTIFICATE_SIZE, MAX_PUBLIC_KEY_SIZE, MAX_RDN_COUNT, MAX_RDN_SIZE};
use crate::engine::PeerIdentity;
use crate::fingerprint::{CERT_SHA1_SIZE, PUBKEY_SHA256_SIZE};

/// Relative distinguished name components exposed from the parsed identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdnType {
    CommonName,
    Organization,
    OrganizationalUnit,
    Locality,
    StateOrProvince,
    Country,
}

impl RdnType {
    /// The conventional short label (`CN`, `O`, ...).
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RdnType::CommonName => "CN",
            RdnType::Organization => "O",
            RdnType::OrganizationalUnit => "OU",
            RdnType::Locality => "L",
            RdnType::StateOrProvince => "ST",
            RdnType::Country => "C",
        }
    }
}

/// An ordered set of RDN components for one certificate name.
#[derive(Debug, Clone, Default)]
pub struct DistinguishedName {
    entries: Vec<(RdnType, String<MAX_RDN_SIZE>), MAX_RDN_COUNT>,
}

impl DistinguishedName {
    fn from_entries(entries: &[(RdnType, &str)]) -> Result<Self, TlsError> {
        let mut name = Self::default();
        for (rdn, value) in entries {
            let mut owned = String::new();
            owned
                .push_str(value)
                .map_err(|()| TlsError::OutOfMemory)?;
            name.entries
                .push((*rdn, owned))
                .map_err(|_| TlsError::OutOfMemory)?;
        }
        Ok(name)
    }

    #[must_use]
    pub fn get(&self, rdn: RdnType) -> Option<&str> {
        self.entries
            .iter()
            .find(|(kind, _)| *kind == rdn)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.get(RdnType::CommonName)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RdnType, &str)> {
        self.entries.iter().map(|(rdn, value)| (*rdn, value.as_str()))
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (rdn, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", rdn.label(), value)?;
        }
        Ok(())
    }
}

/// Read-only view over the peer certificate presented during the handshake.
///
/// Identity fields are fixed at construction; digests are computed on demand
/// from the raw bytes. Owned by the connection and dropped with it.
#[derive(Debug, Clone)]
pub struct Certificate {
    subject: DistinguishedName,
    issuer: DistinguishedName,
    der: Vec<u8, MAX_CERTIFICATE_SIZE>,
    public_key: Vec<u8, MAX_PUBLIC_KEY_SIZE>,
}

impl Certificate {
    /// Copies an engine-supplied identity into an owned certificate view.
    /// Fails wholesale when any part exceeds the capacity bounds, so a
    /// half-copied certificate is never observable.
    pub fn from_identity(identity: &PeerIdentity<'_>) -> Result<Self, TlsError> {
        let subject = DistinguishedName::from_entries(identity.subject)?;
        let issuer = DistinguishedName::from_entries(identity.issuer)?;
        let der =
            Vec::from_slice(identity.certificate).map_err(|()| TlsError::OutOfMemory)?;
        let public_key =
            Vec::from_slice(identity.public_key).map_err(|()| TlsError::OutOfMemory)?;

        Ok(Self {
            subject,
            issuer,
            der,
            public_key,
        })
    }

    #[must_use]
    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    #[must_use]
    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Raw DER bytes of the certificate.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// SHA-1 over the certificate bytes, the classic pinning digest.
    #[must_use]
    pub fn sha1_fingerprint(&self) -> [u8; CERT_SHA1_SIZE] {
        Sha1::digest(&self.der).into()
    }

    /// SHA-256 over the subject public key info.
    #[must_use]
    pub fn public_key_sha256(&self) -> [u8; PUBKEY_SHA256_SIZE] {
        Sha256::digest(&self.public_key).into()
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject: {}, issuer: {}", self.subject, self.issuer)
    }
}
