//! Legacy PEM encryption, as written by OpenSSL's "traditional" key format:
//!
//! ```text
//! Proc-Type: 4,ENCRYPTED
//! DEK-Info: AES-256-CBC,<hex IV>
//! ```
//!
//! The key is derived with the MD5 based `EVP_BytesToKey` scheme, using the
//! first eight IV bytes as salt and a single iteration.

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use md5::{Digest, Md5};
use pem::Pem;
use zeroize::Zeroizing;

use crate::error::{CertPackError, Result};

const SALT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyCipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    DesEde3Cbc,
    DesCbc,
}

impl LegacyCipher {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "AES-128-CBC" => Some(Self::Aes128Cbc),
            "AES-192-CBC" => Some(Self::Aes192Cbc),
            "AES-256-CBC" => Some(Self::Aes256Cbc),
            "DES-EDE3-CBC" => Some(Self::DesEde3Cbc),
            "DES-CBC" => Some(Self::DesCbc),
            _ => None,
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
            Self::DesEde3Cbc => 24,
            Self::DesCbc => 8,
        }
    }

    fn block_len(self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => 16,
            Self::DesEde3Cbc | Self::DesCbc => 8,
        }
    }
}

/// True when the block carries `Proc-Type: 4,ENCRYPTED`.
pub(crate) fn is_encrypted(block: &Pem) -> bool {
    block
        .headers()
        .get("Proc-Type")
        .is_some_and(|value| value.contains("ENCRYPTED"))
}

/// Decrypts the block payload with `password`.
///
/// Malformed headers are a `KeyParseError`; a padding failure means the
/// password is wrong.
pub(crate) fn decrypt(block: &Pem, password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let dek_info = block
        .headers()
        .get("DEK-Info")
        .ok_or_else(|| malformed("missing DEK-Info header"))?;
    let (name, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| malformed("DEK-Info has no IV"))?;
    let cipher = LegacyCipher::from_name(name.trim())
        .ok_or_else(|| malformed(format!("unknown cipher {}", name.trim())))?;
    let iv = hex::decode(iv_hex.trim()).map_err(|e| malformed(format!("bad IV: {e}")))?;
    if iv.len() != cipher.block_len() {
        return Err(malformed(format!("IV must be {} bytes", cipher.block_len())));
    }

    let ciphertext = block.contents();
    if ciphertext.is_empty() || ciphertext.len() % cipher.block_len() != 0 {
        return Err(malformed("encrypted data is not a multiple of the block size"));
    }

    let key = derive_key(password, &iv[..SALT_LEN], cipher.key_len());
    match cipher {
        LegacyCipher::Aes128Cbc => cbc_decrypt::<aes::Aes128>(&key, &iv, ciphertext),
        LegacyCipher::Aes192Cbc => cbc_decrypt::<aes::Aes192>(&key, &iv, ciphertext),
        LegacyCipher::Aes256Cbc => cbc_decrypt::<aes::Aes256>(&key, &iv, ciphertext),
        LegacyCipher::DesEde3Cbc => cbc_decrypt::<des::TdesEde3>(&key, &iv, ciphertext),
        LegacyCipher::DesCbc => cbc_decrypt::<des::Des>(&key, &iv, ciphertext),
    }
}

fn malformed(reason: impl Into<String>) -> CertPackError {
    CertPackError::KeyParseError(format!("encrypted PEM block: {}", reason.into()))
}

/// `EVP_BytesToKey(MD5, count = 1)`: `D_i = MD5(D_{i-1} || password || salt)`.
fn derive_key(password: &[u8], salt: &[u8], key_len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(key_len + 16));
    let mut previous = Zeroizing::new(Vec::new());
    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(previous.as_slice());
        hasher.update(password);
        hasher.update(salt);
        *previous = hasher.finalize().to_vec();
        key.extend_from_slice(&previous);
    }
    key.truncate(key_len);
    key
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| malformed(format!("cipher setup: {e}")))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CertPackError::BadPassphrase)
}
