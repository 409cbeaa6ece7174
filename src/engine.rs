//! The boundary to the external TLS engine.
//!
//! The engine owns all cryptography and record framing; this crate only
//! pumps bytes across it and applies trust policy on the result.

use crate::certificate::RdnType;

/// Borrowed view over the peer certificate material the engine parsed
/// during the handshake. Valid until the next engine call.
#[derive(Debug, Clone, Copy)]
pub struct PeerIdentity<'a> {
    pub subject: &'a [(RdnType, &'a str)],
    pub issuer: &'a [(RdnType, &'a str)],
    /// Raw DER bytes of the end-entity certificate.
    pub certificate: &'a [u8],
    /// Raw subject public key info bytes.
    pub public_key: &'a [u8],
}

/// Notable outcome of a [`TlsEngine::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineEvent {
    /// Nothing notable; any plaintext is accounted for in `produced`.
    None,
    /// The engine cannot make progress until more transport bytes arrive.
    NeedMoreData,
    /// The handshake completed during this call.
    HandshakeFinished,
}

/// Result of feeding transport bytes to the engine.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Decrypted application bytes written to the output buffer.
    pub produced: usize,
    pub event: EngineEvent,
}

/// Engine failures. These are fatal to the session and are propagated to
/// the caller without re-interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    InvalidRecord,
    InvalidHandshake,
    NoCommonCipherSuite,
    BadRecordMac,
    CryptoFailure,
    /// The peer sent a fatal alert.
    FatalAlert(crate::alert::AlertDescription),
    /// An output buffer was too small for a full record.
    BufferTooSmall,
}

/// The call contract of the external TLS engine.
///
/// The engine is stateful per session and strictly ordered: bytes must be
/// fed in arrival order, and one engine instance belongs to exactly one
/// connection. It buffers partial records and undelivered plaintext
/// internally, so `consume` absorbs its entire input; call it with an empty
/// input to drain retained plaintext into a fresh output buffer.
pub trait TlsEngine {
    /// Feeds raw transport bytes, collecting any decrypted application
    /// bytes into `out`. May process several handshake messages before any
    /// application data appears.
    fn consume(&mut self, input: &[u8], out: &mut [u8]) -> Result<Progress, EngineError>;

    /// Encrypts and frames `plaintext` into `out`, returning the framed
    /// record length.
    fn produce(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize, EngineError>;

    /// Upper bound on per-record framing and cipher expansion, used to size
    /// outbound chunks.
    fn record_overhead(&self) -> usize;

    fn is_established(&self) -> bool;

    /// Code point of the negotiated suite, available once established.
    fn cipher_suite(&self) -> Option<u16>;

    /// Session id bytes for resumption; empty until established, or when
    /// the peer issued none.
    fn session_id(&self) -> &[u8];

    /// The peer certificate, once one has been presented and parsed.
    fn peer_identity(&self) -> Option<PeerIdentity<'_>>;
}
