//! PKCS#12 archives holding one certificate and its private key.

use std::fmt;

use p12::PFX;
use tracing::debug;
use zeroize::Zeroizing;

use crate::cert::Certificate;
use crate::error::{CertPackError, Result};
use crate::key::{KeyPair, parse_private_key_der};

/// Encoded archive bytes together with the passphrase protecting them.
#[derive(Clone)]
pub struct Archive {
    der: Vec<u8>,
    passphrase: Zeroizing<String>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("len", &self.der.len())
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

impl Archive {
    pub fn new(der: Vec<u8>, passphrase: impl Into<String>) -> Self {
        Self {
            der,
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Splits the archive into its bytes and passphrase.
    pub fn into_parts(self) -> (Vec<u8>, Zeroizing<String>) {
        (self.der, self.passphrase)
    }
}

/// Packages `certificate` and `key` into a single PKCS#12 entry protected by `passphrase`.
///
/// The entry's friendly name is the certificate's common name, when it has one.
///
/// # Errors
/// `EncodingError` when either input cannot be encoded.
pub fn package(certificate: &Certificate, key: &KeyPair, passphrase: &str) -> Result<Vec<u8>> {
    let cert_der = certificate.to_der()?;
    let key_der = key.to_pkcs8_der()?;
    let friendly_name = certificate.common_name().unwrap_or_default();

    let pfx = PFX::new(&cert_der, &key_der, None, passphrase, &friendly_name).ok_or_else(|| {
        CertPackError::EncodingError("PKCS#12 encoder rejected the certificate or key".to_string())
    })?;
    let der = pfx.to_der();
    debug!(len = der.len(), algorithm = key.algorithm_name(), "packaged archive");
    Ok(der)
}

/// The certificate and key recovered from an archive.
#[derive(Debug)]
pub struct ArchiveContents {
    pub certificate: Certificate,
    pub key: KeyPair,
}

/// Reads an archive written by [`package`].
///
/// # Errors
/// * `BadPassphrase` when the integrity check fails for `passphrase`.
/// * `EncodingError` when the archive is malformed or lacks a certificate or key.
pub fn open(der: &[u8], passphrase: &str) -> Result<ArchiveContents> {
    let pfx = PFX::parse(der).map_err(|e| malformed(format!("{e:?}")))?;
    if !pfx.verify_mac(passphrase) {
        return Err(CertPackError::BadPassphrase);
    }

    let cert_der = pfx
        .cert_x509_bags(passphrase)
        .map_err(|e| malformed(format!("{e:?}")))?
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no certificate bag"))?;
    let key_der = pfx
        .key_bags(passphrase)
        .map_err(|e| malformed(format!("{e:?}")))?
        .into_iter()
        .next()
        .map(Zeroizing::new)
        .ok_or_else(|| malformed("no key bag"))?;

    let certificate =
        Certificate::from_der(&cert_der).map_err(|e| malformed(e.to_string()))?;
    let key = parse_private_key_der(&key_der).map_err(|e| malformed(e.to_string()))?;
    Ok(ArchiveContents { certificate, key })
}

fn malformed(reason: impl Into<String>) -> CertPackError {
    CertPackError::EncodingError(format!("PKCS#12 archive: {}", reason.into()))
}
