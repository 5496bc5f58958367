//! Private key decoding.
//!
//! Signing identities are provisioned by hand, so the key encoding is never
//! declared. A key is read from its PEM envelope, decrypted when the envelope
//! says so, and then tried as PKCS#1, PKCS#8 and SEC1 in that order.

use const_oid::db::rfc5912::{
    ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1, SECP_521_R_1,
};
use const_oid::ObjectIdentifier;
use pem::Pem;
use pkcs8::{DecodePrivateKey, EncryptedPrivateKeyInfo, PrivateKeyInfo};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use tracing::debug;

use super::KeyPair;
use super::legacy_pem;
use crate::error::{CertPackError, Result};

const ENCRYPTED_PKCS8_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// Decodes a PEM encoded private key, decrypting it with `passphrase` if needed.
///
/// # Errors
/// * `KeyParseError` when there is no PEM block or no encoding matches.
/// * `BadPassphrase` when the block is encrypted and the passphrase is missing or wrong.
/// * `UnsupportedKeyType` for PKCS#8/SEC1 payloads other than RSA or P-256/384/521.
pub fn decode_private_key_pem(data: &[u8], passphrase: Option<&str>) -> Result<KeyPair> {
    let blocks = pem::parse_many(data).map_err(key_error)?;
    let block = select_key_block(&blocks)
        .ok_or_else(|| CertPackError::KeyParseError("no PEM block found".to_string()))?;

    if block.contents().is_empty() {
        return Err(CertPackError::KeyParseError(format!(
            "empty {} block",
            block.tag()
        )));
    }

    if legacy_pem::is_encrypted(block) {
        let passphrase = passphrase.ok_or(CertPackError::BadPassphrase)?;
        let key_der = legacy_pem::decrypt(block, passphrase.as_bytes())?;
        // A wrong passphrase can still yield valid padding; garbage that no
        // encoding accepts is reported as a passphrase failure.
        return parse_private_key_der(&key_der).map_err(|err| match err {
            CertPackError::UnsupportedKeyType(_) => err,
            _ => CertPackError::BadPassphrase,
        });
    }

    if block.tag() == ENCRYPTED_PKCS8_LABEL {
        let passphrase = passphrase.ok_or(CertPackError::BadPassphrase)?;
        let info = EncryptedPrivateKeyInfo::try_from(block.contents()).map_err(key_error)?;
        let document = info
            .decrypt(passphrase)
            .map_err(|_| CertPackError::BadPassphrase)?;
        return parse_private_key_der(document.as_bytes());
    }

    parse_private_key_der(block.contents())
}

/// Prefers the first `... PRIVATE KEY` block, so that leading
/// `EC PARAMETERS` blocks written by OpenSSL are skipped.
fn select_key_block(blocks: &[Pem]) -> Option<&Pem> {
    blocks
        .iter()
        .find(|block| block.tag().ends_with("PRIVATE KEY"))
        .or_else(|| blocks.first())
}

/// Parses DER key bytes as PKCS#1 RSA, then PKCS#8, then SEC1. First match wins.
pub fn parse_private_key_der(key_der: &[u8]) -> Result<KeyPair> {
    if let Ok(private) = RsaPrivateKey::from_pkcs1_der(key_der) {
        debug!("parsed PKCS#1 RSA private key");
        return Ok(KeyPair::from_rsa(private));
    }

    if let Ok(info) = PrivateKeyInfo::try_from(key_der) {
        return from_pkcs8(&info, key_der);
    }

    if let Ok(ec_key) = sec1::EcPrivateKey::try_from(key_der) {
        return from_sec1(&ec_key, key_der);
    }

    Err(CertPackError::KeyParseError(
        "not a PKCS#1, PKCS#8 or SEC1 private key".to_string(),
    ))
}

fn key_error(err: impl std::fmt::Display) -> CertPackError {
    CertPackError::KeyParseError(err.to_string())
}

fn from_pkcs8(info: &PrivateKeyInfo<'_>, key_der: &[u8]) -> Result<KeyPair> {
    match info.algorithm.oid {
        RSA_ENCRYPTION => {
            debug!("parsed PKCS#8 RSA private key");
            let private = RsaPrivateKey::from_pkcs8_der(key_der).map_err(key_error)?;
            Ok(KeyPair::from_rsa(private))
        }
        ID_EC_PUBLIC_KEY => {
            let curve = info.algorithm.parameters_oid().map_err(key_error)?;
            debug!(%curve, "parsed PKCS#8 EC private key");
            match curve {
                SECP_256_R_1 => Ok(KeyPair::EcdsaP256 {
                    secret: p256::SecretKey::from_pkcs8_der(key_der).map_err(key_error)?,
                }),
                SECP_384_R_1 => Ok(KeyPair::EcdsaP384 {
                    secret: p384::SecretKey::from_pkcs8_der(key_der).map_err(key_error)?,
                }),
                SECP_521_R_1 => Ok(KeyPair::EcdsaP521 {
                    secret: p521::SecretKey::from_pkcs8_der(key_der).map_err(key_error)?,
                }),
                other => Err(CertPackError::UnsupportedKeyType(format!(
                    "EC curve {other} in PKCS#8 wrapping"
                ))),
            }
        }
        other => Err(CertPackError::UnsupportedKeyType(format!(
            "algorithm {other} in PKCS#8 wrapping"
        ))),
    }
}

fn from_sec1(ec_key: &sec1::EcPrivateKey<'_>, key_der: &[u8]) -> Result<KeyPair> {
    // the curve parameters are optional; without them the scalar width names the curve
    let curve = match ec_key
        .parameters
        .as_ref()
        .and_then(|parameters| parameters.named_curve())
    {
        Some(curve) => curve,
        None => curve_for_scalar_len(ec_key.private_key.len()).ok_or_else(|| {
            CertPackError::KeyParseError(format!(
                "SEC1 key names no curve and has a {} byte scalar",
                ec_key.private_key.len()
            ))
        })?,
    };
    debug!(%curve, "parsed SEC1 EC private key");

    match curve {
        SECP_256_R_1 => Ok(KeyPair::EcdsaP256 {
            secret: p256::SecretKey::from_sec1_der(key_der).map_err(key_error)?,
        }),
        SECP_384_R_1 => Ok(KeyPair::EcdsaP384 {
            secret: p384::SecretKey::from_sec1_der(key_der).map_err(key_error)?,
        }),
        SECP_521_R_1 => Ok(KeyPair::EcdsaP521 {
            secret: p521::SecretKey::from_sec1_der(key_der).map_err(key_error)?,
        }),
        other => Err(CertPackError::UnsupportedKeyType(format!("EC curve {other}"))),
    }
}

fn curve_for_scalar_len(len: usize) -> Option<ObjectIdentifier> {
    match len {
        32 => Some(SECP_256_R_1),
        48 => Some(SECP_384_R_1),
        66 => Some(SECP_521_R_1),
        _ => None,
    }
}
