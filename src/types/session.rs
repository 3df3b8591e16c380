//! Sessions and the certificates bound to them

use crate::rest::D1RestClient;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// X.509 client certificate as far as the client needs to know it.
///
/// Parsing certificates is the credential provider's job; the validity window is
/// carried alongside so the client can refuse to use an expired identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    subject: String,
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
    pem: Option<Vec<u8>>,
}

impl Certificate {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            not_before: None,
            not_after: None,
            pem: None,
        }
    }

    pub fn with_validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self.not_after = Some(not_after);
        self
    }

    /// PEM bundle holding the certificate chain and its private key
    pub fn with_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.pem = Some(pem.into());
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    pub fn pem(&self) -> Option<&[u8]> {
        self.pem.as_deref()
    }

    /// Check the validity window against `now`.
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<(), String> {
        if let Some(not_before) = self.not_before {
            if now < not_before {
                return Err(format!(
                    "Certificate for {} is not yet valid (valid from {})",
                    self.subject, not_before
                ));
            }
        }
        if let Some(not_after) = self.not_after {
            if now > not_after {
                return Err(format!("Certificate for {} expired at {}", self.subject, not_after));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("pem", &self.pem.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The identity a call is made under.
///
/// A session may carry its own REST client, built with node-specific credentials. Node
/// handles use that client instead of their default one, so one process can address the
/// same node under several identities without a handle per identity.
#[derive(Clone, Default)]
pub struct Session {
    subject: Option<String>,
    certificate: Option<Certificate>,
    rest_client: Option<Arc<dyn D1RestClient>>,
}

impl Session {
    /// Anonymous session
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        if self.subject.is_none() {
            self.subject = Some(certificate.subject().to_string());
        }
        self.certificate = Some(certificate);
        self
    }

    pub fn with_rest_client(mut self, rest_client: Arc<dyn D1RestClient>) -> Self {
        self.rest_client = Some(rest_client);
        self
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn rest_client(&self) -> Option<&Arc<dyn D1RestClient>> {
        self.rest_client.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject.is_none() && self.certificate.is_none()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subject", &self.subject)
            .field("certificate", &self.certificate)
            .field("rest_client", &self.rest_client.as_ref().map(|_| "<custom>"))
            .finish()
    }
}
