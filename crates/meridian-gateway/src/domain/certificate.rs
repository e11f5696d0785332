//! Certificate classification.
//!
//! A TLS connection between gateway instances carries the gateway's own
//! signing certificate alongside any certificate the caller presented for
//! authentication. Classification partitions the chain by comparing each
//! certificate's encoded public key against the known set of gateway keys,
//! so the gateway's mutual-TLS identity is never mistaken for caller
//! identity by a downstream authentication provider.
//!
//! Chains are immutable value arrays and classification is a pure function;
//! nothing is cached because certificates can change connection to
//! connection.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use std::collections::HashSet;

/// One parsed certificate as handed over by the TLS termination layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    public_key_der: Vec<u8>,
    encoded_der: Vec<u8>,
    subject_dn: String,
    common_name: Option<String>,
}

impl Certificate {
    pub fn new(
        public_key_der: Vec<u8>,
        encoded_der: Vec<u8>,
        subject_dn: impl Into<String>,
        common_name: Option<&str>,
    ) -> Self {
        Certificate {
            public_key_der,
            encoded_der,
            subject_dn: subject_dn.into(),
            common_name: common_name.map(str::to_string),
        }
    }

    /// Base64 of the DER-encoded public key, the classification key.
    pub fn public_key_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.public_key_der)
    }

    /// Base64 of the whole DER certificate, used when forwarding.
    pub fn encoded_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.encoded_der)
    }

    pub fn subject_dn(&self) -> &str {
        &self.subject_dn
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }
}

/// Partition of a presented chain into gateway-owned and client certificates.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Certificates whose public key matches a known gateway key.
    pub gateway_certs: Vec<Certificate>,
    /// Certificates eligible as caller identity.
    pub client_certs: Vec<Certificate>,
}

/// Splits `chain` against the known gateway public keys (Base64-encoded).
pub fn classify(chain: &[Certificate], known_gateway_keys: &HashSet<String>) -> Classification {
    let mut classification = Classification::default();
    for cert in chain {
        if known_gateway_keys.contains(&cert.public_key_base64()) {
            classification.gateway_certs.push(cert.clone());
        } else {
            classification.client_certs.push(cert.clone());
        }
    }
    classification
}
