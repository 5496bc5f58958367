#![allow(dead_code)]

use certpack::cert::extensions::KeyUsages;
use certpack::cert::params::{CertificateTemplate, DistinguishedName, Validity};
use certpack::issuer::{CertificateWithPrivateKey, self_signed};
use certpack::key::{KeyPair, parse_private_key_der};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;

/// A CA certificate with its key in PEM form, as it would be provisioned.
pub struct CaFixture {
    pub ca: CertificateWithPrivateKey,
    pub cert_pem: String,
    /// Unencrypted PKCS#1 `RSA PRIVATE KEY`
    pub key_pem: String,
}

impl CaFixture {
    /// The key re-encrypted in OpenSSL's legacy PEM format.
    pub fn encrypted_key_pem(&self, cipher: Cipher, passphrase: &str) -> String {
        let rsa = Rsa::private_key_from_pem(self.key_pem.as_bytes()).unwrap();
        String::from_utf8(rsa.private_key_to_pem_passphrase(cipher, passphrase.as_bytes()).unwrap())
            .unwrap()
    }
}

pub fn ca_template(common_name: &str) -> CertificateTemplate {
    let validity = Validity::for_days(3650);
    CertificateTemplate {
        serial_number: Some(vec![0x10, 0x01]),
        not_before: Some(validity.not_before),
        not_after: Some(validity.not_after),
        subject: DistinguishedName::builder()
            .common_name(common_name.to_string())
            .organization(vec!["Example Corp".to_string()])
            .country(vec!["US".to_string()])
            .build(),
        key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign,
        is_ca: true,
        basic_constraints_valid: true,
        ..Default::default()
    }
}

/// Self-signed RSA CA, generated with openssl so the key is independent of the crate.
pub fn generate_rsa_ca(common_name: &str) -> CaFixture {
    let rsa = Rsa::generate(2048).unwrap();
    let key_pem = String::from_utf8(rsa.private_key_to_pem().unwrap()).unwrap();
    let key = parse_private_key_der(&rsa.private_key_to_der().unwrap()).unwrap();

    let cert = self_signed(&ca_template(common_name), &key).unwrap();
    CaFixture {
        cert_pem: cert.to_pem().unwrap(),
        key_pem,
        ca: CertificateWithPrivateKey { cert, key },
    }
}

/// Self-signed ECDSA P-256 CA, with its key as PKCS#8 PEM.
pub fn generate_ecdsa_ca(common_name: &str) -> (CertificateWithPrivateKey, String) {
    let key = KeyPair::generate_ecdsa_p256();
    let cert = self_signed(&ca_template(common_name), &key).unwrap();
    let der = key.to_pkcs8_der().unwrap();
    let key_pem = pem::encode(&pem::Pem::new("PRIVATE KEY", der.to_vec()));
    (CertificateWithPrivateKey { cert, key }, key_pem)
}
