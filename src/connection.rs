use core::fmt;

use embedded_io::Error as _;
use heapless::Vec;

use crate::TlsError;
use crate::certificate::Certificate;
use crate::cipher_suites::CipherSuiteId;
use crate::config::{Endpoint, MAX_SESSION_ID_SIZE};
use crate::engine::{EngineEvent, TlsEngine};
use crate::input_buffer::InputBuffer;
use crate::transport::TcpTransport;
use crate::validator::ValidatorList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeState {
    Idle,
    InProgress,
    Established,
    Failed,
}

impl HandshakeState {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::InProgress => "handshaking",
            HandshakeState::Established => "established",
            HandshakeState::Failed => "failed",
        }
    }
}

/// A TLS session over one transport connection.
///
/// The connection owns the engine handle, the per-connection validator
/// list, and a caller-provided transmit staging buffer. It never owns the
/// transport: inbound bytes arrive as [`InputBuffer`] chains from the
/// stack's receive callback, and outbound calls borrow the transport for
/// their duration. Closing the transport is the caller's business; after
/// teardown, call [`Self::shutdown`] so further operations are rejected.
///
/// Every entry point is safe to call with partial data and returns the
/// bytes consumed/produced, so progress is driven by re-invocation from
/// I/O callbacks rather than by blocking.
pub struct TlsConnection<'a, Engine>
where
    Engine: TlsEngine,
{
    engine: Engine,
    endpoint: Endpoint,
    state: HandshakeState,
    closed: bool,
    validators: ValidatorList,
    session_id: Option<Vec<u8, MAX_SESSION_ID_SIZE>>,
    certificate: Option<Certificate>,
    tx_buf: &'a mut [u8],
}

impl<'a, Engine> TlsConnection<'a, Engine>
where
    Engine: TlsEngine,
{
    /// Creates a connection around an engine handle.
    ///
    /// The staging buffer holds one framed outbound record; it must exceed
    /// the engine's record overhead for writes to make progress.
    pub fn new(
        engine: Engine,
        endpoint: Endpoint,
        validators: ValidatorList,
        tx_buf: &'a mut [u8],
    ) -> Self {
        Self {
            engine,
            endpoint,
            state: HandshakeState::Idle,
            closed: false,
            validators,
            session_id: None,
            certificate: None,
            tx_buf,
        }
    }

    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Marks the underlying transport as torn down. Every subsequent
    /// operation returns [`TlsError::ConnectionClosed`].
    pub fn shutdown(&mut self) {
        self.closed = true;
    }

    /// Feeds incoming transport bytes through the engine and collects any
    /// decrypted application bytes into `out`.
    ///
    /// Several handshake messages may be consumed before any application
    /// data appears; the first handshake completion triggers certificate
    /// extraction and the validator pass exactly once. Engine failures are
    /// fatal and leave the connection in [`HandshakeState::Failed`];
    /// validator rejection surfaces as the distinct
    /// [`TlsError::UntrustedCertificate`].
    pub fn read(
        &mut self,
        incoming: &mut InputBuffer<'_>,
        out: &mut [u8],
    ) -> Result<usize, TlsError> {
        self.ensure_usable()?;
        if self.state == HandshakeState::Idle {
            self.state = HandshakeState::InProgress;
        }

        let mut produced = 0;
        loop {
            let chunk = incoming.take(usize::MAX);
            if chunk.is_empty() {
                break;
            }
            produced += self.pump(chunk, &mut out[produced..])?;
        }

        // Plaintext the engine retained from an earlier call, when the
        // caller's buffer was full.
        while produced < out.len() {
            let n = self.pump(&[], &mut out[produced..])?;
            if n == 0 {
                break;
            }
            produced += n;
        }

        Ok(produced)
    }

    fn pump(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize, TlsError> {
        let progress = match self.engine.consume(input, out) {
            Ok(progress) => progress,
            Err(e) => {
                error!("engine failure during record processing: {:?}", e);
                self.state = HandshakeState::Failed;
                return Err(TlsError::Engine(e));
            }
        };

        if progress.event == EngineEvent::HandshakeFinished
            && self.state != HandshakeState::Established
        {
            self.on_established()?;
        }
        Ok(progress.produced)
    }

    fn on_established(&mut self) -> Result<(), TlsError> {
        self.state = HandshakeState::Established;
        debug!(
            "handshake complete, cipher suite {:?}",
            self.engine.cipher_suite()
        );

        // Servers do not validate anonymous peers; the trust policy applies
        // to the identity a server presents to us.
        if self.endpoint == Endpoint::Client {
            self.certificate = match self.engine.peer_identity() {
                Some(identity) => match Certificate::from_identity(&identity) {
                    Ok(certificate) => Some(certificate),
                    Err(e) => {
                        warn!("peer certificate not retained: {:?}", e);
                        None
                    }
                },
                None => None,
            };

            if !self.validators.validate(self.certificate.as_ref()) {
                self.state = HandshakeState::Failed;
                return Err(TlsError::UntrustedCertificate);
            }
        }
        Ok(())
    }

    /// Encrypts and queues plaintext on the transport.
    ///
    /// One call transmits at most `min(send window, 2 × MSS, staging
    /// capacity)` plaintext bytes; while the framed record does not fit the
    /// transport's send window the chunk is halved, down to a floor of one
    /// byte. At the floor the call reports 0 bytes written and the
    /// connection stays usable — the caller retries on the next I/O event.
    ///
    /// Returns the number of plaintext bytes consumed.
    pub fn write<T>(&mut self, transport: &mut T, data: &[u8]) -> Result<usize, TlsError>
    where
        T: TcpTransport,
    {
        self.ensure_usable()?;
        if self.state != HandshakeState::Established {
            return Err(TlsError::MissingHandshake);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let overhead = self.engine.record_overhead();
        if self.tx_buf.len() <= overhead {
            return Err(TlsError::InsufficientSpace);
        }

        let max_chunk = data
            .len()
            .min(2 * transport.max_segment_size())
            .min(self.tx_buf.len() - overhead);
        let mut chunk = max_chunk.max(1);

        while transport.send_space() < chunk + overhead {
            if chunk <= 1 {
                debug!("transport out of send memory, wrote nothing");
                return Ok(0);
            }
            chunk /= 2;
        }

        let framed = match self.engine.produce(&data[..chunk], self.tx_buf) {
            Ok(framed) => framed,
            Err(e) => {
                error!("engine failure while encrypting: {:?}", e);
                self.state = HandshakeState::Failed;
                return Err(TlsError::Engine(e));
            }
        };

        let mut sent = 0;
        while sent < framed {
            let n = transport
                .send(&self.tx_buf[sent..framed])
                .map_err(|e| TlsError::Io(e.kind()))?;
            if n == 0 {
                // The window was verified above; a record partially on the
                // wire cannot be abandoned.
                return Err(TlsError::Io(embedded_io::ErrorKind::OutOfMemory));
            }
            sent += n;
        }

        Ok(chunk)
    }

    /// The session id for resumption. Empty before the handshake completes;
    /// afterwards, exactly the bytes the engine reports, captured once.
    pub fn session_id(&mut self) -> &[u8] {
        if self.state == HandshakeState::Established && self.session_id.is_none() {
            let id = self.engine.session_id();
            let len = id.len().min(MAX_SESSION_ID_SIZE);
            let mut holder = Vec::new();
            // len is clamped to the holder's capacity
            let _ = holder.extend_from_slice(&id[..len]);
            self.session_id = Some(holder);
        }
        match &self.session_id {
            Some(id) => id,
            None => &[],
        }
    }

    /// True once the engine reported a non-empty session id.
    pub fn session_resumable(&mut self) -> bool {
        !self.session_id().is_empty()
    }

    /// The peer certificate, memoized for the connection lifetime.
    pub fn certificate(&mut self) -> Option<&Certificate> {
        if self.state == HandshakeState::Established && self.certificate.is_none() {
            self.certificate = self
                .engine
                .peer_identity()
                .and_then(|identity| Certificate::from_identity(&identity).ok());
        }
        self.certificate.as_ref()
    }

    /// The negotiated cipher suite code point. Unknown code points still
    /// render safely through [`CipherSuiteId`].
    #[must_use]
    pub fn cipher_suite(&self) -> Option<CipherSuiteId> {
        self.engine.cipher_suite().map(CipherSuiteId)
    }

    /// A human-readable dump of the session parameters, for diagnostics
    /// only.
    pub fn diagnostics(&mut self) -> SessionDiagnostics<'_> {
        // Materialize the lazy fields so the view can borrow them.
        if self.state == HandshakeState::Established {
            let _ = self.certificate();
            let _ = self.session_id();
        }
        SessionDiagnostics {
            state: self.state,
            cipher: self.cipher_suite(),
            session_id: self.session_id.as_deref().unwrap_or(&[]),
            certificate: self.certificate.as_ref(),
        }
    }

    fn ensure_usable(&self) -> Result<(), TlsError> {
        if self.closed {
            return Err(TlsError::ConnectionClosed);
        }
        if self.state == HandshakeState::Failed {
            return Err(TlsError::HandshakeFailed);
        }
        Ok(())
    }
}

/// Snapshot of a connection's negotiated parameters.
pub struct SessionDiagnostics<'a> {
    state: HandshakeState,
    cipher: Option<CipherSuiteId>,
    session_id: &'a [u8],
    certificate: Option<&'a Certificate>,
}

impl fmt::Display for SessionDiagnostics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state.name())?;
        if let Some(cipher) = self.cipher {
            write!(f, ", cipher: {cipher}")?;
        }
        if !self.session_id.is_empty() {
            f.write_str(", session id: ")?;
            for byte in self.session_id {
                write!(f, "{byte:02x}")?;
            }
        }
        if let Some(certificate) = self.certificate {
            write!(f, ", {certificate}")?;
        }
        Ok(())
    }
}
