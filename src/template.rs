//! Certificate template construction.
//!
//! A template is built by applying an ordered list of [`TemplateField`]
//! mutations to a base [`CertificateTemplate`]. Each mutation replaces the
//! field it targets, so the last write wins. Inputs are checked when the
//! mutation is applied and the first failure aborts the build.
//!
//! ```
//! use certpack::template::{ClientServerProfile, TemplateField, TemplateProfile};
//!
//! let template = ClientServerProfile
//!     .generate([
//!         TemplateField::common_name("client1"),
//!         TemplateField::dns_names(["client1.example.com"]),
//!     ])
//!     .unwrap();
//! assert_eq!(template.subject.common_name, "client1");
//! assert!(!template.is_ca);
//!
//! let err = ClientServerProfile
//!     .generate([TemplateField::ip_addresses(["not-an-ip"])])
//!     .unwrap_err();
//! assert!(matches!(err, certpack::error::CertPackError::InvalidFieldValue { .. }));
//! ```

use std::net::IpAddr;

use der::asn1::{Ia5StringRef, PrintableStringRef};
use rand::Rng;
use time::OffsetDateTime;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages};
use crate::cert::params::{CertificateTemplate, Validity};
use crate::error::{CertPackError, Result};

/// One mutation of a [`CertificateTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateField {
    SerialNumber(u64),
    /// Big-endian serial number, for serials wider than 64 bits.
    SerialNumberBytes(Vec<u8>),
    NotBefore(OffsetDateTime),
    NotAfter(OffsetDateTime),
    Validity(Validity),
    CommonName(String),
    Country(Vec<String>),
    Organization(Vec<String>),
    OrganizationalUnit(Vec<String>),
    Province(Vec<String>),
    Locality(Vec<String>),
    DnsNames(Vec<String>),
    EmailAddresses(Vec<String>),
    /// Textual IPv4 or IPv6 addresses; every entry must parse.
    IpAddresses(Vec<String>),
    KeyUsage(FlagSet<KeyUsages>),
    ExtendedKeyUsage(Vec<ExtendedKeyUsageOption>),
    SignatureAlgorithm(SignatureAlgorithm),
    CrlDistributionPoints(Vec<String>),
    IssuingCertificateUrls(Vec<String>),
    IsCa(bool),
    BasicConstraintsValid(bool),
}

fn strings(values: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    values.into_iter().map(Into::into).collect()
}

impl TemplateField {
    pub fn common_name(cn: impl Into<String>) -> Self {
        TemplateField::CommonName(cn.into())
    }

    pub fn country(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::Country(strings(values))
    }

    pub fn organization(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::Organization(strings(values))
    }

    pub fn organizational_unit(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::OrganizationalUnit(strings(values))
    }

    pub fn province(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::Province(strings(values))
    }

    pub fn locality(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::Locality(strings(values))
    }

    pub fn dns_names(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::DnsNames(strings(values))
    }

    pub fn email_addresses(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::EmailAddresses(strings(values))
    }

    pub fn ip_addresses(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::IpAddresses(strings(values))
    }

    pub fn crl_distribution_points(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::CrlDistributionPoints(strings(values))
    }

    pub fn issuing_certificate_urls(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TemplateField::IssuingCertificateUrls(strings(values))
    }

    /// Applies the mutation, replacing whatever the target field held.
    ///
    /// # Errors
    /// `InvalidFieldValue` when an IP address does not parse, a country is not
    /// a PrintableString, or a name or URL is not ASCII.
    pub fn apply(self, template: &mut CertificateTemplate) -> Result<()> {
        match self {
            TemplateField::SerialNumber(serial) => {
                template.serial_number = Some(serial_bytes(serial));
            }
            TemplateField::SerialNumberBytes(bytes) => {
                if bytes.is_empty() {
                    return Err(CertPackError::invalid_field("serial_number", "empty"));
                }
                template.serial_number = Some(bytes);
            }
            TemplateField::NotBefore(at) => template.not_before = Some(at),
            TemplateField::NotAfter(at) => template.not_after = Some(at),
            TemplateField::Validity(validity) => {
                template.not_before = Some(validity.not_before);
                template.not_after = Some(validity.not_after);
            }
            TemplateField::CommonName(cn) => template.subject.common_name = cn,
            TemplateField::Country(values) => {
                for value in &values {
                    PrintableStringRef::new(value).map_err(|e| {
                        CertPackError::invalid_field("country", format!("{value:?}: {e}"))
                    })?;
                }
                template.subject.country = values;
            }
            TemplateField::Organization(values) => template.subject.organization = values,
            TemplateField::OrganizationalUnit(values) => {
                template.subject.organizational_unit = values
            }
            TemplateField::Province(values) => template.subject.province = values,
            TemplateField::Locality(values) => template.subject.locality = values,
            TemplateField::DnsNames(values) => {
                template.dns_names = require_ia5("dns_names", values)?;
            }
            TemplateField::EmailAddresses(values) => {
                template.email_addresses = require_ia5("email_addresses", values)?;
            }
            TemplateField::IpAddresses(values) => {
                template.ip_addresses = values
                    .iter()
                    .map(|value| {
                        value.parse::<IpAddr>().map_err(|_| {
                            CertPackError::invalid_field(
                                "ip_addresses",
                                format!("{value:?} is not an IP address"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
            TemplateField::KeyUsage(flags) => template.key_usage = flags,
            TemplateField::ExtendedKeyUsage(usage) => template.extended_key_usage = usage,
            TemplateField::SignatureAlgorithm(algorithm) => {
                template.signature_algorithm = Some(algorithm)
            }
            TemplateField::CrlDistributionPoints(values) => {
                template.crl_distribution_points = require_ia5("crl_distribution_points", values)?;
            }
            TemplateField::IssuingCertificateUrls(values) => {
                template.issuing_certificate_urls =
                    require_ia5("issuing_certificate_urls", values)?;
            }
            TemplateField::IsCa(is_ca) => template.is_ca = is_ca,
            TemplateField::BasicConstraintsValid(valid) => template.basic_constraints_valid = valid,
        }
        Ok(())
    }
}

fn require_ia5(field: &'static str, values: Vec<String>) -> Result<Vec<String>> {
    for value in &values {
        Ia5StringRef::new(value)
            .map_err(|_| CertPackError::invalid_field(field, format!("{value:?} is not ASCII")))?;
    }
    Ok(values)
}

/// Minimal big-endian encoding of `serial`. Zero encodes as a single zero byte.
pub fn serial_bytes(serial: u64) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Applies `fields` to `base` in order.
pub fn build_template(
    mut base: CertificateTemplate,
    fields: impl IntoIterator<Item = TemplateField>,
) -> Result<CertificateTemplate> {
    for field in fields {
        field.apply(&mut base)?;
    }
    Ok(base)
}

/// A preset base template that caller supplied fields are applied on top of.
pub trait TemplateProfile {
    /// The template before any caller mutation.
    fn base(&self) -> CertificateTemplate;

    /// Builds a template from the profile base and `fields`.
    fn generate(
        &self,
        fields: impl IntoIterator<Item = TemplateField>,
    ) -> Result<CertificateTemplate> {
        build_template(self.base(), fields)
    }
}

/// End-entity profile usable for both TLS client and server authentication.
///
/// Random positive serial, one year validity starting now, basic constraints
/// present with CA off, digital signature and data encipherment key usage,
/// SHA-512 with RSA.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientServerProfile;

impl TemplateProfile for ClientServerProfile {
    fn base(&self) -> CertificateTemplate {
        let validity = Validity::one_year();
        let serial: u64 = rand::rng().random_range(1..=u64::MAX);
        CertificateTemplate {
            serial_number: Some(serial_bytes(serial)),
            not_before: Some(validity.not_before),
            not_after: Some(validity.not_after),
            basic_constraints_valid: true,
            is_ca: false,
            extended_key_usage: vec![
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth,
            ],
            key_usage: KeyUsages::DigitalSignature | KeyUsages::DataEncipherment,
            signature_algorithm: Some(SignatureAlgorithm::Sha512WithRSA),
            ..Default::default()
        }
    }
}
