use std::convert::Infallible;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use embedded_ssl::{
    Certificate, Endpoint, EngineError, EngineEvent, HandshakeState, InputBuffer, PeerIdentity,
    Progress, RdnType, SessionFactory, TcpTransport, TlsConfig, TlsEngine, TlsError,
};

static LOG_INIT: Once = Once::new();

fn init_log() {
    LOG_INIT.call_once(env_logger::init);
}

const OVERHEAD: usize = 5;

const SUBJECT: &[(RdnType, &str)] = &[
    (RdnType::CommonName, "sensor.local"),
    (RdnType::Organization, "Example"),
];
const ISSUER: &[(RdnType, &str)] = &[(RdnType::CommonName, "Example Root CA")];

/// Engine double: absorbs a fixed number of handshake bytes, then treats
/// every further byte as already-decrypted application data. `produce`
/// frames plaintext behind a fixed 5-byte header.
struct ScriptedEngine {
    handshake_remaining: usize,
    established: bool,
    cipher: u16,
    session: Vec<u8>,
    present_certificate: bool,
    fail_handshake: bool,
    /// Report `HandshakeFinished` on every call once established, like a
    /// sloppy engine would. The connection must still validate only once.
    repeat_finished_event: bool,
    retained: Vec<u8>,
}

impl ScriptedEngine {
    fn new(handshake_bytes: usize) -> Self {
        Self {
            handshake_remaining: handshake_bytes,
            established: false,
            cipher: 0x002f,
            session: vec![0xa5; 16],
            present_certificate: true,
            fail_handshake: false,
            repeat_finished_event: false,
            retained: Vec::new(),
        }
    }

    fn without_certificate(mut self) -> Self {
        self.present_certificate = false;
        self
    }

    fn failing(mut self) -> Self {
        self.fail_handshake = true;
        self
    }

    fn with_cipher(mut self, cipher: u16) -> Self {
        self.cipher = cipher;
        self
    }

    fn repeat_finished(mut self) -> Self {
        self.repeat_finished_event = true;
        self
    }

    fn drain(&mut self, out: &mut [u8]) -> usize {
        let n = self.retained.len().min(out.len());
        out[..n].copy_from_slice(&self.retained[..n]);
        self.retained.drain(..n);
        n
    }
}

impl TlsEngine for ScriptedEngine {
    fn consume(&mut self, input: &[u8], out: &mut [u8]) -> Result<Progress, EngineError> {
        let mut input = input;
        let mut finished = false;

        if !self.established {
            let absorb = input.len().min(self.handshake_remaining);
            self.handshake_remaining -= absorb;
            input = &input[absorb..];

            if self.handshake_remaining > 0 {
                return Ok(Progress {
                    produced: 0,
                    event: EngineEvent::NeedMoreData,
                });
            }
            if self.fail_handshake {
                return Err(EngineError::InvalidHandshake);
            }
            self.established = true;
            finished = true;
        }

        self.retained.extend_from_slice(input);
        let produced = self.drain(out);
        let event = if finished || self.repeat_finished_event {
            EngineEvent::HandshakeFinished
        } else {
            EngineEvent::None
        };
        Ok(Progress { produced, event })
    }

    fn produce(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize, EngineError> {
        let framed = plaintext.len() + OVERHEAD;
        if out.len() < framed {
            return Err(EngineError::BufferTooSmall);
        }
        out[..OVERHEAD].copy_from_slice(&[0x17, 0x03, 0x03, 0x00, plaintext.len() as u8]);
        out[OVERHEAD..framed].copy_from_slice(plaintext);
        Ok(framed)
    }

    fn record_overhead(&self) -> usize {
        OVERHEAD
    }

    fn is_established(&self) -> bool {
        self.established
    }

    fn cipher_suite(&self) -> Option<u16> {
        self.established.then_some(self.cipher)
    }

    fn session_id(&self) -> &[u8] {
        if self.established { &self.session } else { &[] }
    }

    fn peer_identity(&self) -> Option<PeerIdentity<'_>> {
        (self.established && self.present_certificate).then_some(PeerIdentity {
            subject: SUBJECT,
            issuer: ISSUER,
            certificate: b"mock-der",
            public_key: b"mock-spki",
        })
    }
}

struct MockTransport {
    space: usize,
    mss: usize,
    sent: Vec<u8>,
}

impl MockTransport {
    fn new(space: usize, mss: usize) -> Self {
        Self {
            space,
            mss,
            sent: Vec::new(),
        }
    }
}

impl embedded_io::ErrorType for MockTransport {
    type Error = Infallible;
}

impl TcpTransport for MockTransport {
    fn send_space(&self) -> usize {
        self.space
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let n = data.len().min(self.space);
        self.sent.extend_from_slice(&data[..n]);
        self.space -= n;
        Ok(n)
    }

    fn max_segment_size(&self) -> usize {
        self.mss
    }
}

#[test]
fn handshake_completes_over_fragmented_input() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(10), &mut tx_buf);
    let mut out = [0u8; 64];

    // First delivery covers only part of the handshake.
    let mut incoming = InputBuffer::new(&[&[0u8; 3], &[0u8; 1]]);
    assert_eq!(conn.read(&mut incoming, &mut out).unwrap(), 0);
    assert_eq!(conn.state(), HandshakeState::InProgress);
    assert!(conn.session_id().is_empty());

    // Second delivery finishes the handshake and carries application data
    // in the same chain of segments.
    let mut incoming = InputBuffer::new(&[&[0u8; 4], &[0u8, 0u8, b'h', b'e'], b"llo"]);
    let n = conn.read(&mut incoming, &mut out).unwrap();
    assert_eq!(&out[..n], b"hello");
    assert_eq!(conn.state(), HandshakeState::Established);
}

#[test]
fn session_id_is_gated_on_establishment() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(4), &mut tx_buf);
    let mut out = [0u8; 64];

    assert!(conn.session_id().is_empty());
    assert!(!conn.session_resumable());

    let mut incoming = InputBuffer::new(&[&[0u8; 4]]);
    conn.read(&mut incoming, &mut out).unwrap();

    assert_eq!(conn.session_id(), [0xa5u8; 16].as_slice());
    assert!(conn.session_resumable());
}

#[test]
fn certificate_is_memoized() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(0), &mut tx_buf);
    let mut out = [0u8; 64];

    assert!(conn.certificate().is_none());

    let mut incoming = InputBuffer::new(&[]);
    conn.read(&mut incoming, &mut out).unwrap();

    let subject: *const Certificate = conn.certificate().unwrap();
    assert_eq!(
        conn.certificate().unwrap().subject().common_name(),
        Some("sensor.local")
    );
    // Same cached instance on every call.
    assert_eq!(subject, conn.certificate().unwrap() as *const _);
}

#[test]
fn validators_run_exactly_once() {
    init_log();
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn counting(_: &Certificate) -> bool {
        CALLS.fetch_add(1, Ordering::Relaxed);
        true
    }

    let config = TlsConfig::new(Endpoint::Client).with_validator(counting);
    let factory = SessionFactory::new(config).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(2).repeat_finished(), &mut tx_buf);
    let mut out = [0u8; 64];

    let mut incoming = InputBuffer::new(&[&[0u8; 2]]);
    conn.read(&mut incoming, &mut out).unwrap();
    assert_eq!(CALLS.load(Ordering::Relaxed), 1);

    // The engine keeps signalling completion; the pass must not re-run.
    let mut incoming = InputBuffer::new(&[b"ping"]);
    let n = conn.read(&mut incoming, &mut out).unwrap();
    assert_eq!(&out[..n], b"ping");
    assert_eq!(CALLS.load(Ordering::Relaxed), 1);
}

#[test]
fn untrusted_peer_is_a_policy_failure() {
    init_log();
    let config = TlsConfig::new(Endpoint::Client).with_common_name("someone.else");
    let factory = SessionFactory::new(config).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(1), &mut tx_buf);
    let mut out = [0u8; 64];

    let mut incoming = InputBuffer::new(&[&[0u8; 1]]);
    assert_eq!(
        conn.read(&mut incoming, &mut out),
        Err(TlsError::UntrustedCertificate)
    );
    assert_eq!(conn.state(), HandshakeState::Failed);

    // Terminal: the same connection never becomes usable again.
    let mut incoming = InputBuffer::new(&[b"more"]);
    assert_eq!(
        conn.read(&mut incoming, &mut out),
        Err(TlsError::HandshakeFailed)
    );
}

#[test]
fn missing_peer_certificate_fails_closed() {
    init_log();
    let config = TlsConfig::new(Endpoint::Client).with_common_name("sensor.local");
    let factory = SessionFactory::new(config).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn =
        factory.create_session(ScriptedEngine::new(1).without_certificate(), &mut tx_buf);
    let mut out = [0u8; 64];

    let mut incoming = InputBuffer::new(&[&[0u8; 1]]);
    assert_eq!(
        conn.read(&mut incoming, &mut out),
        Err(TlsError::UntrustedCertificate)
    );
}

#[test]
fn engine_failure_is_fatal_and_distinguished() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(1).failing(), &mut tx_buf);
    let mut out = [0u8; 64];

    let mut incoming = InputBuffer::new(&[&[0u8; 1]]);
    assert_eq!(
        conn.read(&mut incoming, &mut out),
        Err(TlsError::Engine(EngineError::InvalidHandshake))
    );
    assert_eq!(conn.state(), HandshakeState::Failed);
}

fn established_connection<'b>(
    factory: &SessionFactory<'_>,
    tx_buf: &'b mut [u8],
) -> embedded_ssl::TlsConnection<'b, ScriptedEngine> {
    let mut conn = factory.create_session(ScriptedEngine::new(0), tx_buf);
    let mut out = [0u8; 16];
    let mut incoming = InputBuffer::new(&[]);
    conn.read(&mut incoming, &mut out).unwrap();
    assert_eq!(conn.state(), HandshakeState::Established);
    conn
}

#[test]
fn write_rejected_before_establishment() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(8), &mut tx_buf);
    let mut transport = MockTransport::new(1024, 1460);

    assert_eq!(
        conn.write(&mut transport, b"hello"),
        Err(TlsError::MissingHandshake)
    );
}

#[test]
fn write_chunks_to_twice_the_segment_size() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = established_connection(&factory, &mut tx_buf);
    let mut transport = MockTransport::new(1024, 4);

    let written = conn.write(&mut transport, &[b'x'; 100]).unwrap();
    assert_eq!(written, 8);
    assert_eq!(transport.sent.len(), 8 + OVERHEAD);
}

#[test]
fn write_backs_off_to_a_single_byte() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = established_connection(&factory, &mut tx_buf);

    // Only a one-byte chunk (plus framing) fits the send window.
    let mut transport = MockTransport::new(OVERHEAD + 1, 1460);
    let written = conn.write(&mut transport, &[b'x'; 100]).unwrap();
    assert_eq!(written, 1);
    assert_eq!(transport.sent.len(), OVERHEAD + 1);
    assert_eq!(*transport.sent.last().unwrap(), b'x');
}

#[test]
fn write_reports_zero_when_even_one_byte_does_not_fit() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = established_connection(&factory, &mut tx_buf);

    let mut transport = MockTransport::new(OVERHEAD, 1460);
    assert_eq!(conn.write(&mut transport, &[b'x'; 100]).unwrap(), 0);
    assert!(transport.sent.is_empty());

    // The connection stays usable; a later attempt with room succeeds.
    assert_eq!(conn.state(), HandshakeState::Established);
    let mut transport = MockTransport::new(1024, 1460);
    assert!(conn.write(&mut transport, &[b'x'; 100]).unwrap() > 0);
}

#[test]
fn write_requires_room_for_one_framed_record() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; OVERHEAD];
    let mut conn = established_connection(&factory, &mut tx_buf);
    let mut transport = MockTransport::new(1024, 1460);

    assert_eq!(
        conn.write(&mut transport, b"hi"),
        Err(TlsError::InsufficientSpace)
    );
}

#[test]
fn shutdown_rejects_all_operations() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = established_connection(&factory, &mut tx_buf);

    conn.shutdown();

    let mut out = [0u8; 16];
    let mut incoming = InputBuffer::new(&[b"data"]);
    assert_eq!(
        conn.read(&mut incoming, &mut out),
        Err(TlsError::ConnectionClosed)
    );
    let mut transport = MockTransport::new(1024, 1460);
    assert_eq!(
        conn.write(&mut transport, b"data"),
        Err(TlsError::ConnectionClosed)
    );
}

#[test]
fn diagnostics_render_session_parameters() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn = factory.create_session(ScriptedEngine::new(0), &mut tx_buf);
    let mut out = [0u8; 16];
    let mut incoming = InputBuffer::new(&[]);
    conn.read(&mut incoming, &mut out).unwrap();

    let text = format!("{}", conn.diagnostics());
    assert!(text.starts_with("established"));
    assert!(text.contains("TLS_RSA_WITH_AES_128_CBC_SHA"));
    assert!(text.contains(&"a5".repeat(16)));
    assert!(text.contains("CN=sensor.local"));
    assert!(text.contains("CN=Example Root CA"));
}

#[test]
fn diagnostics_survive_unknown_cipher_suites() {
    init_log();
    let factory = SessionFactory::new(TlsConfig::new(Endpoint::Client)).unwrap();
    let mut tx_buf = [0u8; 256];
    let mut conn =
        factory.create_session(ScriptedEngine::new(0).with_cipher(0x9999), &mut tx_buf);
    let mut out = [0u8; 16];
    let mut incoming = InputBuffer::new(&[]);
    conn.read(&mut incoming, &mut out).unwrap();

    let text = format!("{}", conn.diagnostics());
    assert!(text.contains("{ 0x9999 }"));
}
