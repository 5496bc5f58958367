use der::Encode;
use der::asn1::BitString;
use tracing::debug;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityInfoAccess, AuthorityKeyIdentifier, BasicConstraints, CrlDistributionPoints,
    ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificateTemplate, ExtensionParam};
use crate::error::{CertPackError, Result};
use crate::key::{KeyPair, PublicKey, key_identifier};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the name written into the issuer field of issued certificates.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Key identifier for the authority key identifier extension, if one is written.
    fn authority_key_identifier(&self) -> Option<Vec<u8>>;

    /// Signs `template` for `subject_public_key`.
    ///
    /// The signature algorithm is the template's choice, or the signing key's
    /// default when the template leaves it unset. The encoded certificate is
    /// parsed again before it is returned.
    ///
    /// # Errors
    /// `SigningError` for a template the key cannot sign (missing serial or
    /// dates, inverted validity, incompatible algorithm, unencodable values)
    /// or a result that does not re-parse.
    fn issue(
        &self,
        template: &CertificateTemplate,
        subject_public_key: &PublicKey,
    ) -> Result<Certificate> {
        sign_template(self, template, subject_public_key).map_err(|err| match err {
            CertPackError::EncodingError(reason) => CertPackError::SigningError(reason),
            other => other,
        })
    }
}

fn sign_template<I: Issuer + ?Sized>(
    issuer: &I,
    template: &CertificateTemplate,
    subject_public_key: &PublicKey,
) -> Result<Certificate> {
    let signing_key = issuer.signing_key();
    let signature_algorithm = template
        .signature_algorithm
        .unwrap_or_else(|| signing_key.default_signature_algorithm());

    let serial_number = template
        .serial_number
        .clone()
        .ok_or_else(|| missing("serial number"))?;
    let not_before = template.not_before.ok_or_else(|| missing("not_before"))?;
    let not_after = template.not_after.ok_or_else(|| missing("not_after"))?;

    let subject = template.subject.to_x509_name()?;
    let subject_public_key_info = subject_public_key.to_spki()?;
    let extensions = leaf_extensions(
        template,
        &subject_public_key_info,
        issuer.authority_key_identifier(),
        subject.0.is_empty(),
    )?;

    let tbs_cert = TbsCertificate {
        serial_number,
        signature_algorithm,
        issuer: issuer.issuer_name(),
        not_before,
        not_after,
        subject,
        subject_public_key_info,
        extensions,
    };

    let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
    let signature = signing_key.sign_data(&tbs_cert_inner.to_der()?, &signature_algorithm)?;

    let cert_inner = CertificateInner {
        tbs_certificate: tbs_cert_inner,
        signature_algorithm: signature_algorithm.into(),
        signature: BitString::from_bytes(&signature)?,
    };

    let der = cert_inner.to_der()?;
    let certificate = Certificate::from_der(&der).map_err(|err| {
        CertPackError::SigningError(format!("issued certificate does not parse: {err}"))
    })?;
    debug!(
        serial = %hex::encode(certificate.serial_number()),
        algorithm = ?signature_algorithm,
        "signed certificate"
    );
    Ok(certificate)
}

fn missing(field: &str) -> CertPackError {
    CertPackError::SigningError(format!("template has no {field}"))
}

fn leaf_extensions(
    template: &CertificateTemplate,
    subject_public_key_info: &SubjectPublicKeyInfoOwned,
    authority_key_id: Option<Vec<u8>>,
    empty_subject: bool,
) -> Result<Vec<ExtensionParam>> {
    let mut extensions = Vec::new();

    if template.basic_constraints_valid {
        let basic_constraints = BasicConstraints {
            is_ca: template.is_ca,
            max_path_length: None,
        };
        extensions.push(ExtensionParam::from_extension(basic_constraints, true)?);
    }

    if !template.key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            KeyUsage(template.key_usage),
            true,
        )?);
    }

    if !template.extended_key_usage.is_empty() {
        let extended_key_usage = ExtendedKeyUsage {
            usage: template.extended_key_usage.clone(),
        };
        extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
    }

    let subject_key_id = SubjectKeyIdentifier(key_identifier(subject_public_key_info));
    extensions.push(ExtensionParam::from_extension(subject_key_id, false)?);

    if let Some(key_identifier) = authority_key_id {
        extensions.push(ExtensionParam::from_extension(
            AuthorityKeyIdentifier { key_identifier },
            false,
        )?);
    }

    let san = SubjectAltName {
        dns_names: template.dns_names.clone(),
        email_addresses: template.email_addresses.clone(),
        ip_addresses: template.ip_addresses.clone(),
    };
    if !san.is_empty() {
        // RFC 5280 4.2.1.6: critical when the subject is empty
        extensions.push(ExtensionParam::from_extension(san, empty_subject)?);
    }

    if !template.crl_distribution_points.is_empty() {
        let points = CrlDistributionPoints {
            urls: template.crl_distribution_points.clone(),
        };
        extensions.push(ExtensionParam::from_extension(points, false)?);
    }

    if !template.issuing_certificate_urls.is_empty() {
        let access = AuthorityInfoAccess {
            ca_issuers: template.issuing_certificate_urls.clone(),
        };
        extensions.push(ExtensionParam::from_extension(access, false)?);
    }

    Ok(extensions)
}

/// A parent certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Name {
        self.cert.subject().clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn authority_key_identifier(&self) -> Option<Vec<u8>> {
        Some(
            self.cert
                .subject_key_identifier()
                .unwrap_or_else(|| key_identifier(self.cert.public_key_info())),
        )
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn authority_key_identifier(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Signs `template` with `key` itself, so that issuer and subject coincide.
pub fn self_signed(template: &CertificateTemplate, key: &KeyPair) -> Result<Certificate> {
    let self_issuer = SelfIssuer {
        name: template.subject.to_x509_name()?,
        key,
    };
    self_issuer.issue(template, &key.public_key())
}
