#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod alert;
mod certificate;
mod cipher_suites;
mod config;
mod connection;
mod engine;
mod extensions;
mod fingerprint;
mod input_buffer;
mod key_cert;
mod transport;
mod validator;

pub use certificate::{Certificate, DistinguishedName, RdnType};
pub use cipher_suites::{CipherSuite, CipherSuiteId};
pub use config::{
    Endpoint, MAX_CERTIFICATE_SIZE, MAX_PASSWORD_SIZE, MAX_PRIVATE_KEY_SIZE, MAX_PUBLIC_KEY_SIZE,
    MAX_RDN_COUNT, MAX_RDN_SIZE, MAX_SERVER_NAME_SIZE, MAX_SESSION_ID_SIZE, MAX_VALIDATORS,
    SessionFactory, TlsConfig,
};
pub use connection::{HandshakeState, SessionDiagnostics, TlsConnection};
pub use engine::{EngineError, EngineEvent, PeerIdentity, Progress, TlsEngine};
pub use extensions::{ExtensionType, MaxFragmentLength, TlsExtension};
pub use fingerprint::{CERT_SHA1_SIZE, Fingerprints, PUBKEY_SHA256_SIZE};
pub use input_buffer::InputBuffer;
pub use key_cert::KeyCertPair;
pub use transport::TcpTransport;
pub use validator::{CertValidator, ValidatorFn, ValidatorList};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TlsError {
    /// The transport was torn down; the connection rejects all further calls.
    ConnectionClosed,
    /// The operation requires an established session.
    MissingHandshake,
    /// The handshake previously failed; a new connection is required.
    HandshakeFailed,
    /// The cryptographic handshake succeeded but no validator accepted the
    /// peer certificate. Deliberately distinct from an engine failure so
    /// callers can tell "bad crypto" from "untrusted peer".
    UntrustedCertificate,
    /// Server-side configuration without a usable key/certificate pair.
    MissingIdentity,
    /// A pinned fingerprint was assigned with an unexpected length.
    InvalidFingerprintLength,
    /// A bounded buffer could not hold the requested data.
    OutOfMemory,
    /// The transmit staging buffer cannot fit a single framed record.
    InsufficientSpace,
    /// Engine-reported failure, propagated as-is.
    Engine(EngineError),
    Io(embedded_io::ErrorKind),
}

impl embedded_io::Error for TlsError {
    fn kind(&self) -> embedded_io::ErrorKind {
        if let Self::Io(k) = self {
            *k
        } else {
            error!("TLS error: {:?}", self);
            embedded_io::ErrorKind::Other
        }
    }
}
