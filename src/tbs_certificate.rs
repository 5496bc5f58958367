use std::time::SystemTime;

use der::Encode;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Time;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::ExtensionParam;
use crate::error::{CertPackError, Result};

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, copied from the parent certificate.
/// * `not_before` - The start of the certificate's validity period.
/// * `not_after` - The end of the certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
#[derive(Clone, Debug)]
pub struct TbsCertificate {
    /// Big-endian serial number, at most 20 octets once encoded
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// Fails with `SigningError` for an unusable serial number or validity
    /// period, since those come straight from the caller's template.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        if self.not_before > self.not_after {
            return Err(CertPackError::SigningError(format!(
                "not_before {} is after not_after {}",
                self.not_before, self.not_after
            )));
        }

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| CertPackError::SigningError(format!("serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime otherwise.
fn to_x509_time(at: OffsetDateTime) -> Result<Time> {
    let system_time = SystemTime::from(at);
    let time = if (1950..2050).contains(&at.year()) {
        UtcTime::from_system_time(system_time).map(Time::UtcTime)
    } else {
        GeneralizedTime::from_system_time(system_time).map(Time::GeneralTime)
    };
    time.map_err(|e| CertPackError::SigningError(format!("validity time {at}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;
    use time::macros::datetime;

    fn tbs(
        serial_number: Vec<u8>,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> TbsCertificate {
        let key = KeyPair::generate_ecdsa_p256();
        TbsCertificate {
            serial_number,
            signature_algorithm: SignatureAlgorithm::Sha256WithECDSA,
            issuer: Name::default(),
            not_before,
            not_after,
            subject: Name::default(),
            subject_public_key_info: key.public_key().to_spki().unwrap(),
            extensions: vec![],
        }
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        let inner = tbs(
            vec![1],
            datetime!(2049-12-31 23:59:59 UTC),
            datetime!(2050-01-01 00:00:00 UTC),
        )
        .to_tbs_certificate_inner()
        .unwrap();
        assert!(matches!(inner.validity.not_before, Time::UtcTime(_)));
        assert!(matches!(inner.validity.not_after, Time::GeneralTime(_)));
        assert!(inner.extensions.is_none());
    }

    #[test]
    fn test_inverted_validity_is_rejected() {
        let err = tbs(
            vec![1],
            datetime!(2030-01-02 00:00:00 UTC),
            datetime!(2030-01-01 00:00:00 UTC),
        )
        .to_der()
        .unwrap_err();
        assert!(matches!(err, CertPackError::SigningError(_)));
    }

    #[test]
    fn test_oversized_serial_is_rejected() {
        let err = tbs(
            vec![0x42; 21],
            datetime!(2030-01-01 00:00:00 UTC),
            datetime!(2031-01-01 00:00:00 UTC),
        )
        .to_der()
        .unwrap_err();
        assert!(matches!(err, CertPackError::SigningError(_)));
    }
}
