pub mod decoder;
pub(crate) mod legacy_pem;

use std::fmt;

use const_oid::AssociatedOid;
use der::Decode;
use ecdsa::signature::Signer;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::signature::SignatureEncoding;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use zeroize::Zeroizing;

use crate::cert::SignatureAlgorithm;
use crate::error::{CertPackError, Result};

pub use decoder::{decode_private_key_pem, parse_private_key_der};

/// Key size of every generated leaf key. Not configurable.
pub const LEAF_RSA_KEY_BITS: usize = 2048;

/// A private key usable for signing certificates or for packaging into an archive.
///
/// Only RSA and NIST-curve ECDSA keys are supported; these are the payloads a
/// signing identity may be provisioned with.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        secret: p256::SecretKey,
    },
    EcdsaP384 {
        secret: p384::SecretKey,
    },
    EcdsaP521 {
        secret: p521::SecretKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm_name())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertPackError::SigningError(format!("RSA key generation: {e}")))?;
        Ok(Self::from_rsa(private))
    }

    /// Generate the fixed-policy leaf key (RSA, [`LEAF_RSA_KEY_BITS`] bits).
    pub fn generate_leaf() -> Result<Self> {
        Self::generate_rsa(LEAF_RSA_KEY_BITS)
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        KeyPair::EcdsaP256 {
            secret: p256::SecretKey::random(&mut rng),
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        KeyPair::EcdsaP384 {
            secret: p384::SecretKey::random(&mut rng),
        }
    }

    pub(crate) fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    /// Short human readable name of the key algorithm, used in logs and errors.
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => "RSA",
            KeyPair::EcdsaP256 { .. } => "ECDSA P-256",
            KeyPair::EcdsaP384 { .. } => "ECDSA P-384",
            KeyPair::EcdsaP521 { .. } => "ECDSA P-521",
        }
    }

    /// The signature algorithm used when a template does not name one.
    pub fn default_signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::EcdsaP521 { .. } => SignatureAlgorithm::Sha512WithECDSA,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Signs `data` with the requested algorithm.
    ///
    /// RSA keys accept any of the RSA PKCS#1 v1.5 digests. ECDSA keys only accept
    /// the digest matching their curve.
    pub fn sign_data(&self, data: &[u8], algorithm: &SignatureAlgorithm) -> Result<Vec<u8>> {
        match (self, algorithm) {
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha256WithRSA) => {
                rsa_sign::<Sha256>(private, data)
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha384WithRSA) => {
                rsa_sign::<Sha384>(private, data)
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha512WithRSA) => {
                rsa_sign::<Sha512>(private, data)
            }
            (KeyPair::EcdsaP256 { secret }, SignatureAlgorithm::Sha256WithECDSA) => {
                let signing_key = p256::ecdsa::SigningKey::from(secret);
                let signature: p256::ecdsa::Signature = signing_key
                    .try_sign(data)
                    .map_err(|e| CertPackError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::EcdsaP384 { secret }, SignatureAlgorithm::Sha384WithECDSA) => {
                let signing_key = p384::ecdsa::SigningKey::from(secret);
                let signature: p384::ecdsa::Signature = signing_key
                    .try_sign(data)
                    .map_err(|e| CertPackError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::EcdsaP521 { secret }, SignatureAlgorithm::Sha512WithECDSA) => {
                let signing_key = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
                    .map_err(|e| CertPackError::SigningError(e.to_string()))?;
                let signature: p521::ecdsa::Signature = signing_key
                    .try_sign(data)
                    .map_err(|e| CertPackError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (key, algorithm) => Err(CertPackError::SigningError(format!(
                "{algorithm:?} is not compatible with a {} key",
                key.algorithm_name()
            ))),
        }
    }

    /// Encodes the private key as a PKCS#8 `PrivateKeyInfo` DER document.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der(),
            KeyPair::EcdsaP256 { secret } => secret.to_pkcs8_der(),
            KeyPair::EcdsaP384 { secret } => secret.to_pkcs8_der(),
            KeyPair::EcdsaP521 { secret } => secret.to_pkcs8_der(),
        }
        .map_err(|e| CertPackError::EncodingError(e.to_string()))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }
}

fn rsa_sign<D>(private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
{
    let signing_key = RsaSigningKey::<D>::new(private.clone());
    let signature = signing_key
        .try_sign(data)
        .map_err(|e| CertPackError::SigningError(e.to_string()))?;
    Ok(signature.to_vec())
}

/// The public half of a [`KeyPair`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
    EcdsaP521(p521::PublicKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { secret } => PublicKey::EcdsaP256(secret.public_key()),
            KeyPair::EcdsaP384 { secret } => PublicKey::EcdsaP384(secret.public_key()),
            KeyPair::EcdsaP521 { secret } => PublicKey::EcdsaP521(secret.public_key()),
        }
    }

    /// Converts the key into the `SubjectPublicKeyInfo` embedded in certificates.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = match self {
            PublicKey::Rsa(public) => public.to_public_key_der(),
            PublicKey::EcdsaP256(public) => public.to_public_key_der(),
            PublicKey::EcdsaP384(public) => public.to_public_key_der(),
            PublicKey::EcdsaP521(public) => public.to_public_key_der(),
        }
        .map_err(|e| CertPackError::EncodingError(e.to_string()))?;
        Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
    }
}

/// SHA-1 over the subject public key bits, the usual key identifier method.
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdsa_keys_reject_foreign_digests() {
        let key = KeyPair::generate_ecdsa_p256();
        let err = key
            .sign_data(b"tbs", &SignatureAlgorithm::Sha384WithECDSA)
            .unwrap_err();
        assert!(matches!(err, CertPackError::SigningError(_)));

        let err = key
            .sign_data(b"tbs", &SignatureAlgorithm::Sha512WithRSA)
            .unwrap_err();
        assert!(matches!(err, CertPackError::SigningError(_)));
    }

    #[test]
    fn test_default_signature_algorithm_matches_curve() {
        let key = KeyPair::generate_ecdsa_p384();
        let algorithm = key.default_signature_algorithm();
        assert_eq!(algorithm, SignatureAlgorithm::Sha384WithECDSA);
        assert!(!key.sign_data(b"tbs", &algorithm).unwrap().is_empty());
    }

    #[test]
    fn test_spki_and_key_identifier() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.public_key().to_spki().unwrap();
        assert_eq!(spki.algorithm.oid, const_oid::db::rfc5912::ID_EC_PUBLIC_KEY);
        assert_eq!(key_identifier(&spki).len(), 20);
    }

    #[test]
    fn test_pkcs8_export_reparses() {
        let key = KeyPair::generate_ecdsa_p384();
        let der = key.to_pkcs8_der().unwrap();
        let parsed = parse_private_key_der(&der).unwrap();
        assert_eq!(parsed.public_key(), key.public_key());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = KeyPair::generate_ecdsa_p256();
        assert_eq!(format!("{key:?}"), "KeyPair { algorithm: \"ECDSA P-256\", .. }");
    }
}
