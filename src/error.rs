//! use certpack::error::CertPackError;

use thiserror::Error;

/// Represents errors that can occur while loading signing identities,
/// building templates, issuing certificates and packaging archives.
///
/// Every public operation returns either a complete result or exactly one of
/// these kinds; nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertPackError {
    /// A signing identity with this name is already registered.
    #[error("Signing identity already loaded: {0}")]
    DuplicateName(String),

    /// No signing identity with this name is registered.
    #[error("Unknown signing identity: {0}")]
    UnknownIdentity(String),

    /// A PEM block could not be parsed as an X.509 certificate.
    #[error("Failed to parse certificate: {0}")]
    CertParseError(String),

    /// The certificate input contained no PEM blocks at all.
    #[error("No certificate found in bundle")]
    EmptyCertBundle,

    /// The private key could not be parsed in any supported encoding.
    #[error("Failed to parse private key: {0}")]
    KeyParseError(String),

    /// The passphrase did not decrypt the key or archive.
    #[error("Bad passphrase")]
    BadPassphrase,

    /// The key payload is well formed but of an unsupported algorithm or curve.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// A template field mutator rejected its input.
    #[error("Invalid value for {field}: {reason}")]
    InvalidFieldValue { field: &'static str, reason: String },

    /// The template could not be signed, or the result did not re-parse.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// An asynchronous issuance task ended without producing an outcome.
    #[error("Issuance task failed: {0}")]
    DispatchError(String),
}

impl CertPackError {
    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        CertPackError::InvalidFieldValue {
            field,
            reason: reason.into(),
        }
    }
}

impl From<der::Error> for CertPackError {
    /// Converts a `der::Error` into a `CertPackError`.
    fn from(err: der::Error) -> Self {
        CertPackError::EncodingError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CertPackError>;
