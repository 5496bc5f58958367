use tracing::debug;

use crate::archive;
use crate::cert::parse_pem_chain;
use crate::error::{CertPackError, Result};
use crate::key::decode_private_key_pem;

/// Repackages an existing PEM certificate and key as a PKCS#12 archive.
///
/// Only the first certificate of `cert_pem` goes into the archive. The key
/// is decoded with the same rules as a signing identity's key, and
/// `key_passphrase` is only consulted when the key is encrypted.
///
/// # Errors
/// * `EmptyCertBundle` when `cert_pem` holds no PEM block. Nothing is encoded.
/// * `CertParseError`, `KeyParseError`, `BadPassphrase`, `UnsupportedKeyType`
///   for unusable input.
/// * `EncodingError` when the archive cannot be written.
pub fn pem_bundle_to_archive(
    cert_pem: &[u8],
    key_pem: &[u8],
    key_passphrase: Option<&str>,
    archive_passphrase: &str,
) -> Result<Vec<u8>> {
    let chain = parse_pem_chain(cert_pem)?;
    let key = decode_private_key_pem(key_pem, key_passphrase)?;
    // parse_pem_chain never returns an empty chain
    let Some(certificate) = chain.first() else {
        return Err(CertPackError::EmptyCertBundle);
    };

    debug!(
        chain_len = chain.len(),
        algorithm = key.algorithm_name(),
        "converting PEM bundle to archive"
    );
    archive::package(certificate, &key, archive_passphrase)
}
