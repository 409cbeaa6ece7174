use heapless::{String, Vec};

use crate::TlsError;
use crate::connection::TlsConnection;
use crate::engine::TlsEngine;
use crate::extensions::{MaxFragmentLength, TlsExtension};
use crate::fingerprint::Fingerprints;
use crate::key_cert::KeyCertPair;
use crate::validator::{CertValidator, ValidatorFn, ValidatorList};

/// Longest session id the record layer hands out.
pub const MAX_SESSION_ID_SIZE: usize = 32;
/// Capacity for one DER certificate.
pub const MAX_CERTIFICATE_SIZE: usize = 2048;
/// Capacity for one subject public key info blob.
pub const MAX_PUBLIC_KEY_SIZE: usize = 512;
/// Capacity for one private key blob.
pub const MAX_PRIVATE_KEY_SIZE: usize = 2048;
/// Capacity for a key password.
pub const MAX_PASSWORD_SIZE: usize = 32;
/// Capacity for a single RDN value.
pub const MAX_RDN_SIZE: usize = 64;
/// RDN components retained per certificate name.
pub const MAX_RDN_COUNT: usize = 8;
/// Capacity for an SNI host name.
pub const MAX_SERVER_NAME_SIZE: usize = 64;
/// Validators per connection attempt.
pub const MAX_VALIDATORS: usize = 4;

/// Which side of the handshake this context drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endpoint {
    Client,
    Server,
}

/// Per-listener or per-client configuration, owned by a [`SessionFactory`].
///
/// Shared read-mostly across the connections a factory spawns. Reconfiguring
/// (e.g. replacing pinned fingerprints) is only safe while no handshake is in
/// flight for this context; that discipline is the caller's.
#[derive(Debug, Clone)]
pub struct TlsConfig<'a> {
    pub(crate) endpoint: Endpoint,
    pub(crate) server_name: Option<&'a str>,
    pub(crate) validators: Vec<CertValidator, MAX_VALIDATORS>,
    pub(crate) identity: Option<KeyCertPair>,
    pub(crate) max_fragment_length: Option<MaxFragmentLength>,
}

impl<'a> TlsConfig<'a> {
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            server_name: None,
            validators: Vec::new(),
            identity: None,
            max_fragment_length: None,
        }
    }

    /// Host name sent in the SNI extension.
    #[must_use]
    pub fn with_server_name(mut self, server_name: &'a str) -> Self {
        self.server_name = Some(server_name);
        self
    }

    /// Pins the peer by certificate/public-key digest.
    ///
    /// Panics when more than [`MAX_VALIDATORS`] validators are configured.
    #[must_use]
    pub fn with_fingerprints(mut self, fingerprints: Fingerprints) -> Self {
        self.validators
            .push(CertValidator::Fingerprints(fingerprints))
            .unwrap();
        self
    }

    /// Accepts the peer when its subject common name equals `name`.
    ///
    /// Panics when `name` exceeds [`MAX_SERVER_NAME_SIZE`] or more than
    /// [`MAX_VALIDATORS`] validators are configured.
    #[must_use]
    pub fn with_common_name(mut self, name: &str) -> Self {
        self.validators
            .push(CertValidator::CommonName(String::try_from(name).unwrap()))
            .unwrap();
        self
    }

    /// Installs a custom acceptance predicate.
    ///
    /// Panics when more than [`MAX_VALIDATORS`] validators are configured.
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorFn) -> Self {
        self.validators
            .push(CertValidator::Custom(validator))
            .unwrap();
        self
    }

    /// Fallible version of the validator builders.
    pub fn push_validator(&mut self, validator: CertValidator) -> Result<(), TlsError> {
        self.validators
            .push(validator)
            .map_err(|_| TlsError::OutOfMemory)
    }

    /// Server-side key and certificate material.
    #[must_use]
    pub fn with_identity(mut self, identity: KeyCertPair) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn with_max_fragment_length(mut self, length: MaxFragmentLength) -> Self {
        self.max_fragment_length = Some(length);
        self
    }
}

/// Instantiates [`TlsConnection`]s for one configured context.
///
/// Configuration errors are caught here, at setup time, not per-connection:
/// a server context without a usable identity refuses to construct.
pub struct SessionFactory<'a> {
    config: TlsConfig<'a>,
}

impl<'a> SessionFactory<'a> {
    pub fn new(config: TlsConfig<'a>) -> Result<Self, TlsError> {
        if config.endpoint == Endpoint::Server
            && !config.identity.as_ref().is_some_and(KeyCertPair::is_valid)
        {
            error!("server context configured without key/certificate pair");
            return Err(TlsError::MissingIdentity);
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &TlsConfig<'a> {
        &self.config
    }

    /// A fresh validator list for one connection attempt. Lists are drained
    /// by the handshake's validation pass, so each attempt gets its own.
    #[must_use]
    pub fn validators(&self) -> ValidatorList {
        let mut list = ValidatorList::new();
        for validator in &self.config.validators {
            // same bound as the source vector
            let _ = list.push(validator.clone());
        }
        list
    }

    /// The extensions this context advertises.
    #[must_use]
    pub fn extensions(&self) -> Vec<TlsExtension, 2> {
        let mut extensions = Vec::new();
        if let Some(server_name) = self.config.server_name {
            match String::try_from(server_name) {
                Ok(name) => {
                    let _ = extensions.push(TlsExtension::ServerName(name));
                }
                Err(()) => warn!("server name too long for SNI, extension skipped"),
            }
        }
        if let Some(length) = self.config.max_fragment_length {
            let _ = extensions.push(TlsExtension::MaxFragmentLength(length));
        }
        extensions
    }

    /// Builds a connection around an engine handle for one transport
    /// connection. The staging buffer must outlive the connection.
    pub fn create_session<'t, Engine>(
        &self,
        engine: Engine,
        tx_buf: &'t mut [u8],
    ) -> TlsConnection<'t, Engine>
    where
        Engine: TlsEngine,
    {
        TlsConnection::new(engine, self.config.endpoint, self.validators(), tx_buf)
    }
}
