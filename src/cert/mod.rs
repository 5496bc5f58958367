pub mod extensions;
pub mod params;

use const_oid::AssociatedOid;
use der::asn1::{AnyRef, Ia5StringRef, PrintableStringRef, Utf8StringRef};
use der::{Decode, Encode, EncodePem};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{CertPackError, Result};
use params::ExtensionParam;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-384 with RSA encryption.
    Sha384WithRSA,
    /// SHA-512 with RSA encryption.
    Sha512WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// SHA-512 with ECDSA.
    Sha512WithECDSA,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        use const_oid::db::rfc5912::{
            ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ECDSA_WITH_SHA_512,
            SHA_256_WITH_RSA_ENCRYPTION, SHA_384_WITH_RSA_ENCRYPTION, SHA_512_WITH_RSA_ENCRYPTION,
        };

        match self {
            SignatureAlgorithm::Sha256WithRSA => SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithECDSA => ECDSA_WITH_SHA_512,
        }
    }

    /// Looks an algorithm up by its OID.
    pub fn from_oid(oid: const_oid::ObjectIdentifier) -> Option<Self> {
        [
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithRSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha384WithECDSA,
            SignatureAlgorithm::Sha512WithECDSA,
        ]
        .into_iter()
        .find(|algorithm| algorithm.oid() == oid)
    }

    fn is_rsa(&self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::Sha256WithRSA
                | SignatureAlgorithm::Sha384WithRSA
                | SignatureAlgorithm::Sha512WithRSA
        )
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA algorithms carry an explicit NULL parameter (RFC 4055), ECDSA
    /// algorithms carry none (RFC 5758).
    fn from(value: SignatureAlgorithm) -> Self {
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters: value.is_rsa().then(|| AnyRef::NULL.into()),
        }
    }
}

/// Represents a parsed X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Parses a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| CertPackError::CertParseError(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertPackError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertPackError::EncodingError(e.to_string()))
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// The subject common name, if the certificate has one.
    pub fn common_name(&self) -> Option<String> {
        common_name(self.subject())
    }

    /// Big-endian serial number bytes.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.inner.signature_algorithm.oid)
    }

    /// Raw value of the extension identified by `oid`.
    pub fn extension_value(&self, oid: const_oid::ObjectIdentifier) -> Option<&[u8]> {
        self.inner
            .tbs_certificate
            .extensions
            .as_ref()?
            .iter()
            .find(|ext| ext.extn_id == oid)
            .map(|ext| ext.extn_value.as_bytes())
    }

    /// Every extension the certificate carries, in encoded order.
    pub fn extension_params(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the typed extension `E` if present.
    pub fn extension<E: extensions::ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extension_params()
            .into_iter()
            .find(|param| param.oid == E::OID)
            .map(|param| param.to_extension())
            .transpose()
    }

    /// Value of the subject key identifier extension, if present.
    pub fn subject_key_identifier(&self) -> Option<Vec<u8>> {
        let value = self.extension_value(x509_cert::ext::pkix::SubjectKeyIdentifier::OID)?;
        x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(value)
            .ok()
            .map(|ski| ski.0.as_bytes().to_vec())
    }
}

/// Parses every PEM block of `data` as an X.509 certificate, in order.
///
/// Fails fast: any block that is not a `CERTIFICATE` or does not parse is a
/// `CertParseError`. Input without a single PEM block is `EmptyCertBundle`.
pub fn parse_pem_chain(data: &[u8]) -> Result<Vec<Certificate>> {
    let blocks =
        pem::parse_many(data).map_err(|e| CertPackError::CertParseError(e.to_string()))?;
    if blocks.is_empty() {
        return Err(CertPackError::EmptyCertBundle);
    }

    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            if block.tag() != CERTIFICATE_LABEL {
                return Err(CertPackError::CertParseError(format!(
                    "PEM block {index} is labelled {}",
                    block.tag()
                )));
            }
            Certificate::from_der(block.contents()).map_err(|err| match err {
                CertPackError::CertParseError(reason) => {
                    CertPackError::CertParseError(format!("PEM block {index}: {reason}"))
                }
                other => other,
            })
        })
        .collect()
}

/// Returns the first common name attribute of `name`.
pub fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|attr| attr.oid == const_oid::db::rfc4519::CN)
        .and_then(|attr| {
            attr.value
                .decode_as::<Utf8StringRef<'_>>()
                .map(|s| s.as_str().to_string())
                .or_else(|_| {
                    attr.value
                        .decode_as::<PrintableStringRef<'_>>()
                        .map(|s| s.as_str().to_string())
                })
                .or_else(|_| {
                    attr.value
                        .decode_as::<Ia5StringRef<'_>>()
                        .map(|s| s.as_str().to_string())
                })
                .ok()
        })
}
