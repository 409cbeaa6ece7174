use heapless::{String, Vec};

use crate::TlsError;
use crate::certificate::Certificate;
use crate::config::{MAX_SERVER_NAME_SIZE, MAX_VALIDATORS};
use crate::fingerprint::Fingerprints;

/// A caller-supplied acceptance predicate.
pub type ValidatorFn = fn(&Certificate) -> bool;

/// One pluggable certificate-acceptance policy.
#[derive(Debug, Clone)]
pub enum CertValidator {
    /// Accept when every configured pin matches the certificate.
    Fingerprints(Fingerprints),
    /// Accept when the subject common name equals the expected host
    /// (ASCII case-insensitive).
    CommonName(String<MAX_SERVER_NAME_SIZE>),
    /// Accept when the predicate returns true.
    Custom(ValidatorFn),
}

impl CertValidator {
    fn validate(&self, certificate: &Certificate) -> bool {
        match self {
            CertValidator::Fingerprints(pins) => pins.match_certificate(certificate),
            CertValidator::CommonName(expected) => certificate
                .subject()
                .common_name()
                .is_some_and(|name| name.eq_ignore_ascii_case(expected)),
            CertValidator::Custom(predicate) => predicate(certificate),
        }
    }
}

/// Ordered, single-use set of certificate validators.
///
/// A list is built per connection attempt and drained by the first
/// validation pass of that connection's handshake; it is not reused.
#[derive(Debug, Clone, Default)]
pub struct ValidatorList {
    validators: Vec<CertValidator, MAX_VALIDATORS>,
}

impl ValidatorList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, validator: CertValidator) -> Result<(), TlsError> {
        self.validators
            .push(validator)
            .map_err(|_| TlsError::OutOfMemory)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Runs the acceptance policy. Every validator is consumed by this call
    /// regardless of outcome.
    ///
    /// A missing certificate fails closed and clears the list. An empty list
    /// accepts any presented certificate; this fail-open behavior is
    /// deliberate ("list empty, allow connection") and callers wanting
    /// stricter semantics must install at least one validator. The asymmetry
    /// between the two rules is intentional.
    pub fn validate(&mut self, certificate: Option<&Certificate>) -> bool {
        let Some(certificate) = certificate else {
            self.validators.clear();
            return false;
        };

        if self.validators.is_empty() {
            debug!("validator list empty, allowing connection");
            return true;
        }

        let mut accepted = false;
        for validator in &self.validators {
            if !accepted && validator.validate(certificate) {
                accepted = true;
            }
        }
        self.validators.clear();

        if !accepted {
            warn!("no validator accepted the peer certificate");
        }
        accepted
    }
}
