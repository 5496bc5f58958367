use std::net::IpAddr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Tag;
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::SignatureAlgorithm;
use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
pub use crate::cert::extensions::{FlagSet, KeyUsages};
use crate::error::{CertPackError, Result};

/// Pending description of a certificate to be issued.
///
/// Fields are plain data; no cross-field validation happens here. Whatever
/// is inconsistent (missing serial, inverted validity, a signature algorithm
/// the CA key cannot produce) is rejected when the template is signed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateTemplate {
    /// Big-endian unsigned serial number.
    pub serial_number: Option<Vec<u8>>,
    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    pub subject: DistinguishedName,
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub extended_key_usage: Vec<ExtendedKeyUsageOption>,
    pub key_usage: FlagSet<KeyUsages>,
    /// Falls back to the signing key's default when unset.
    pub signature_algorithm: Option<SignatureAlgorithm>,
    pub crl_distribution_points: Vec<String>,
    pub issuing_certificate_urls: Vec<String>,
    pub is_ca: bool,
    /// Whether a basic constraints extension is emitted at all.
    pub basic_constraints_valid: bool,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// Every attribute except the common name may repeat.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `province` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organizational_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(default)]
    pub common_name: String,
    #[builder(default)]
    pub country: Vec<String>,
    #[builder(default)]
    pub province: Vec<String>,
    #[builder(default)]
    pub locality: Vec<String>,
    #[builder(default)]
    pub organization: Vec<String>,
    #[builder(default)]
    pub organizational_unit: Vec<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509 name.
    ///
    /// Attributes are written in the order C, O, OU, L, ST, CN, one attribute
    /// per RDN. An empty common name is left out.
    pub fn to_x509_name(&self) -> Result<Name> {
        use const_oid::db::rfc4519::{C, CN, L, O, OU, ST};

        let mut rdns = Vec::new();
        for country in &self.country {
            PrintableStringRef::new(country)?;
            rdns.push(single_attribute(C, Tag::PrintableString, country)?);
        }
        let utf8_groups = [
            (O, &self.organization),
            (OU, &self.organizational_unit),
            (L, &self.locality),
            (ST, &self.province),
        ];
        for (oid, values) in utf8_groups {
            for value in values {
                rdns.push(single_attribute(oid, Tag::Utf8String, value)?);
            }
        }
        if !self.common_name.is_empty() {
            rdns.push(single_attribute(CN, Tag::Utf8String, &self.common_name)?);
        }
        Ok(RdnSequence(rdns))
    }
}

fn single_attribute(
    oid: ObjectIdentifier,
    tag: Tag,
    value: &str,
) -> Result<RelativeDistinguishedName> {
    let attribute = AttributeTypeAndValue {
        oid,
        value: Any::new(tag, value.as_bytes().to_vec())?,
    };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![attribute])?))
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// One calendar year from now, or 365 days when that date does not exist.
    pub fn one_year() -> Self {
        let now = OffsetDateTime::now_utc();
        let not_after = now
            .replace_year(now.year() + 1)
            .unwrap_or(now + Duration::days(365));
        Self {
            not_before: now,
            not_after,
        }
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(CertPackError::EncodingError(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::common_name;
    use crate::cert::extensions::BasicConstraints;

    #[test]
    fn test_name_attribute_order_and_common_name() {
        let dn = DistinguishedName::builder()
            .common_name("client1".to_string())
            .country(vec!["US".to_string()])
            .organization(vec!["Example Corp".to_string()])
            .build();
        let name = dn.to_x509_name().unwrap();
        let oids: Vec<_> = name
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter().map(|attr| attr.oid))
            .collect();
        assert_eq!(
            oids,
            vec![
                const_oid::db::rfc4519::C,
                const_oid::db::rfc4519::O,
                const_oid::db::rfc4519::CN
            ]
        );
        assert_eq!(common_name(&name).as_deref(), Some("client1"));
    }

    #[test]
    fn test_empty_name() {
        let name = DistinguishedName::default().to_x509_name().unwrap();
        assert!(name.0.is_empty());
        assert_eq!(common_name(&name), None);
    }

    #[test]
    fn test_country_must_be_printable() {
        let dn = DistinguishedName::builder()
            .country(vec!["Ü@".to_string()])
            .build();
        assert!(dn.to_x509_name().is_err());
    }

    #[test]
    fn test_extension_param_round_trip_checks_oid() {
        let param = ExtensionParam::from_extension(
            BasicConstraints {
                is_ca: true,
                max_path_length: None,
            },
            true,
        )
        .unwrap();
        let decoded: BasicConstraints = param.to_extension().unwrap();
        assert!(decoded.is_ca);
        assert!(param.to_extension::<crate::cert::extensions::KeyUsage>().is_err());
    }
}
