//! The synchronous issuance pipeline.

use std::fmt;
use std::sync::Arc;

use bon::Builder;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{info, warn};

use crate::archive::{self, Archive};
use crate::cert::params::CertificateTemplate;
use crate::error::Result;
use crate::issuer::{CertificateWithPrivateKey, Issuer};
use crate::key::KeyPair;
use crate::registry::CertificateAuthorityRegistry;

/// Length of the passphrases produced by the default generator.
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

/// Produces the passphrase protecting each issued archive.
#[derive(Clone)]
pub enum PasswordGenerator {
    /// Random ASCII letters and digits of the given length.
    Alphanumeric(usize),
    /// A caller supplied generator.
    Custom(Arc<dyn Fn() -> String + Send + Sync>),
    /// Archives are protected by the empty passphrase.
    Disabled,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        PasswordGenerator::Alphanumeric(DEFAULT_PASSWORD_LENGTH)
    }
}

impl fmt::Debug for PasswordGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordGenerator::Alphanumeric(len) => {
                f.debug_tuple("Alphanumeric").field(len).finish()
            }
            PasswordGenerator::Custom(_) => f.write_str("Custom(..)"),
            PasswordGenerator::Disabled => f.write_str("Disabled"),
        }
    }
}

impl PasswordGenerator {
    /// Wraps a closure as a [`PasswordGenerator::Custom`] generator.
    pub fn custom(generate: impl Fn() -> String + Send + Sync + 'static) -> Self {
        PasswordGenerator::Custom(Arc::new(generate))
    }

    pub fn generate(&self) -> String {
        match self {
            PasswordGenerator::Alphanumeric(len) => rand::rng()
                .sample_iter(&Alphanumeric)
                .take(*len)
                .map(char::from)
                .collect(),
            PasswordGenerator::Custom(generate) => generate(),
            PasswordGenerator::Disabled => String::new(),
        }
    }
}

/// Issues leaf certificates against the identities of a registry.
///
/// ```no_run
/// use std::sync::Arc;
/// use certpack::issuance::{CertificateIssuer, PasswordGenerator};
/// use certpack::registry::CertificateAuthorityRegistry;
///
/// let registry = Arc::new(CertificateAuthorityRegistry::new());
/// let issuer = CertificateIssuer::builder()
///     .registry(registry)
///     .password_generator(PasswordGenerator::Alphanumeric(32))
///     .build();
/// # let _ = issuer;
/// ```
#[derive(Debug, Clone, Builder)]
pub struct CertificateIssuer {
    registry: Arc<CertificateAuthorityRegistry>,
    #[builder(default)]
    password_generator: PasswordGenerator,
}

impl CertificateIssuer {
    /// An issuer using the default passphrase generator.
    pub fn new(registry: Arc<CertificateAuthorityRegistry>) -> Self {
        Self::builder().registry(registry).build()
    }

    pub fn registry(&self) -> &Arc<CertificateAuthorityRegistry> {
        &self.registry
    }

    /// Issues a certificate from `template` signed by the identity `name`.
    ///
    /// `passphrase` decrypts the identity's key; an empty passphrase counts
    /// as none. A fresh RSA leaf key is generated for every call. Returns the
    /// archive bytes and the passphrase protecting them.
    ///
    /// # Errors
    /// Any step failing aborts the issuance: `UnknownIdentity`, key decoding
    /// errors (`BadPassphrase`, `KeyParseError`, `UnsupportedKeyType`),
    /// `SigningError` or `EncodingError`.
    pub fn issue(
        &self,
        name: &str,
        passphrase: &str,
        template: &CertificateTemplate,
    ) -> Result<Archive> {
        let result = self.issue_inner(name, passphrase, template);
        match &result {
            Ok(archive) => {
                info!(identity = %name, len = archive.as_bytes().len(), "issued certificate")
            }
            Err(err) => warn!(identity = %name, error = %err, "issuance failed"),
        }
        result
    }

    fn issue_inner(
        &self,
        name: &str,
        passphrase: &str,
        template: &CertificateTemplate,
    ) -> Result<Archive> {
        let identity = self.registry.lookup(name)?;
        let key = identity.decode_key((!passphrase.is_empty()).then_some(passphrase))?;
        let parent = CertificateWithPrivateKey {
            cert: identity.issuer_certificate().clone(),
            key,
        };

        let leaf_key = KeyPair::generate_leaf()?;
        let certificate = parent.issue(template, &leaf_key.public_key())?;

        let archive_passphrase = self.password_generator.generate();
        let der = archive::package(&certificate, &leaf_key, &archive_passphrase)?;
        Ok(Archive::new(der, archive_passphrase))
    }
}
