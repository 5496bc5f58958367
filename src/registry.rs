//! Named signing identities.
//!
//! The registry is append-only: identities are loaded once and live as long
//! as the registry. Lookups share a read lock, loads take the write lock, so
//! two concurrent loads of the same name cannot both succeed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;
use zeroize::Zeroizing;

use crate::cert::{Certificate, parse_pem_chain};
use crate::error::{CertPackError, Result};
use crate::key::{KeyPair, decode_private_key_pem};

/// A certificate chain plus the private key of its first certificate.
///
/// The key is kept exactly as provisioned, possibly encrypted, because the
/// passphrase is only known when a certificate is issued.
pub struct SigningIdentity {
    name: String,
    chain: Vec<Certificate>,
    key_pem: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("name", &self.name)
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed chain, issuer certificate first. Never empty.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    /// The certificate that signs on behalf of this identity.
    pub fn issuer_certificate(&self) -> &Certificate {
        // the chain is checked non-empty on load
        &self.chain[0]
    }

    /// Decodes the stored key, decrypting it with `passphrase` when it is encrypted.
    pub fn decode_key(&self, passphrase: Option<&str>) -> Result<KeyPair> {
        decode_private_key_pem(&self.key_pem, passphrase)
    }
}

/// Owns every signing identity, keyed by unique name.
///
/// Share it between issuers with an [`Arc`].
#[derive(Debug, Default)]
pub struct CertificateAuthorityRegistry {
    identities: RwLock<HashMap<String, Arc<SigningIdentity>>>,
}

impl CertificateAuthorityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` with the certificates of `cert_chain_pem` and the raw `key_pem`.
    ///
    /// The key is not decoded here.
    ///
    /// # Errors
    /// * `DuplicateName` when `name` is already registered.
    /// * `EmptyCertBundle` when `cert_chain_pem` has no PEM block.
    /// * `CertParseError` when any block is not a parseable certificate.
    pub fn load(&self, name: &str, cert_chain_pem: &[u8], key_pem: &[u8]) -> Result<()> {
        if self.contains(name) {
            return Err(CertPackError::DuplicateName(name.to_string()));
        }

        let chain = parse_pem_chain(cert_chain_pem)?;
        if chain.is_empty() {
            return Err(CertPackError::EmptyCertBundle);
        }
        let chain_len = chain.len();
        let identity = SigningIdentity {
            name: name.to_string(),
            chain,
            key_pem: Zeroizing::new(key_pem.to_vec()),
        };

        let mut identities = self
            .identities
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // re-check under the write lock, another load may have won the race
        if identities.contains_key(name) {
            return Err(CertPackError::DuplicateName(name.to_string()));
        }
        identities.insert(name.to_string(), Arc::new(identity));
        drop(identities);

        info!(identity = %name, chain_len, "loaded signing identity");
        Ok(())
    }

    /// Returns the identity registered as `name`.
    pub fn lookup(&self, name: &str) -> Result<Arc<SigningIdentity>> {
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| CertPackError::UnknownIdentity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::{CertificateTemplate, DistinguishedName};
    use crate::issuer::self_signed;
    use pkcs8::EncodePrivateKey;
    use rsa::pkcs8::LineEnding;
    use time::{Duration, OffsetDateTime};

    fn identity_pem(cn: &str) -> (String, String) {
        let key = KeyPair::generate_ecdsa_p256();
        let now = OffsetDateTime::now_utc();
        let template = CertificateTemplate {
            serial_number: Some(vec![7]),
            not_before: Some(now),
            not_after: Some(now + Duration::days(10)),
            subject: DistinguishedName::builder()
                .common_name(cn.to_string())
                .build(),
            is_ca: true,
            basic_constraints_valid: true,
            ..Default::default()
        };
        let cert = self_signed(&template, &key).unwrap();
        let KeyPair::EcdsaP256 { secret } = &key else {
            unreachable!()
        };
        let key_pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        (cert.to_pem().unwrap(), key_pem.to_string())
    }

    #[test]
    fn test_load_and_lookup() {
        let registry = CertificateAuthorityRegistry::new();
        assert!(registry.is_empty());
        let (cert, key) = identity_pem("Root");
        registry.load("root", cert.as_bytes(), key.as_bytes()).unwrap();

        let identity = registry.lookup("root").unwrap();
        assert_eq!(identity.name(), "root");
        assert_eq!(identity.chain().len(), 1);
        assert_eq!(identity.issuer_certificate().common_name().as_deref(), Some("Root"));
        assert!(identity.decode_key(None).is_ok());
        assert_eq!(registry.names(), vec!["root".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_keeps_first_identity() {
        let registry = CertificateAuthorityRegistry::new();
        let (cert, key) = identity_pem("First");
        registry.load("ca", cert.as_bytes(), key.as_bytes()).unwrap();

        let (other_cert, other_key) = identity_pem("Second");
        assert_eq!(
            registry
                .load("ca", other_cert.as_bytes(), other_key.as_bytes())
                .unwrap_err(),
            CertPackError::DuplicateName("ca".to_string())
        );
        let identity = registry.lookup("ca").unwrap();
        assert_eq!(identity.issuer_certificate().common_name().as_deref(), Some("First"));
    }

    #[test]
    fn test_failed_load_inserts_nothing() {
        let registry = CertificateAuthorityRegistry::new();
        let (_, key) = identity_pem("Root");
        assert_eq!(
            registry.load("root", b"", key.as_bytes()).unwrap_err(),
            CertPackError::EmptyCertBundle
        );
        assert!(!registry.contains("root"));
        assert_eq!(
            registry.lookup("root").unwrap_err(),
            CertPackError::UnknownIdentity("root".to_string())
        );
    }

    #[test]
    fn test_concurrent_loads_of_one_name() {
        let registry = Arc::new(CertificateAuthorityRegistry::new());
        let (cert, key) = identity_pem("Root");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let (cert, key) = (cert.clone(), key.clone());
                std::thread::spawn(move || registry.load("root", cert.as_bytes(), key.as_bytes()))
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_debug_hides_key_bytes() {
        let registry = CertificateAuthorityRegistry::new();
        let (cert, key) = identity_pem("Root");
        registry.load("root", cert.as_bytes(), key.as_bytes()).unwrap();
        let debug = format!("{:?}", registry.lookup("root").unwrap());
        assert!(!debug.contains("PRIVATE KEY"));
        assert!(debug.contains("root"));
    }
}
