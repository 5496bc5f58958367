mod util;

use std::sync::{Arc, Mutex};

use certpack::archive;
use certpack::cert::params::CertificateTemplate;
use certpack::cert::SignatureAlgorithm;
use certpack::dispatch::{AsyncIssuanceDispatcher, IssuanceHandler, IssuanceOutcome};
use certpack::error::CertPackError;
use certpack::issuance::{CertificateIssuer, DEFAULT_PASSWORD_LENGTH, PasswordGenerator};
use certpack::key::KeyPair;
use certpack::registry::CertificateAuthorityRegistry;
use certpack::template::{ClientServerProfile, TemplateField, TemplateProfile, build_template};
use certpack::pem_bundle_to_archive;
use openssl::symm::Cipher;
use regex::Regex;
use time::{Duration, OffsetDateTime};

fn client1_template() -> CertificateTemplate {
    let now = OffsetDateTime::now_utc();
    ClientServerProfile
        .generate([
            TemplateField::common_name("client1"),
            TemplateField::NotBefore(now),
            TemplateField::NotAfter(now + Duration::days(365)),
            TemplateField::dns_names(["client1.example.com"]),
        ])
        .unwrap()
}

fn registry_with_root() -> (Arc<CertificateAuthorityRegistry>, util::CaFixture) {
    let fixture = util::generate_rsa_ca("Example Root");
    let registry = Arc::new(CertificateAuthorityRegistry::new());
    registry
        .load("root", fixture.cert_pem.as_bytes(), fixture.key_pem.as_bytes())
        .unwrap();
    (registry, fixture)
}

#[test]
fn test_issue_client1_from_pkcs1_root() {
    let (registry, fixture) = registry_with_root();
    let issuer = CertificateIssuer::new(registry);

    let archive = issuer.issue("root", "", &client1_template()).unwrap();
    assert!(!archive.as_bytes().is_empty());
    assert_eq!(archive.passphrase().len(), DEFAULT_PASSWORD_LENGTH);
    assert!(
        Regex::new(r"^[A-Za-z0-9]{20}$")
            .unwrap()
            .is_match(archive.passphrase())
    );

    let contents = archive::open(archive.as_bytes(), archive.passphrase()).unwrap();
    let leaf = contents.certificate;
    assert_eq!(leaf.common_name().as_deref(), Some("client1"));
    assert_eq!(leaf.issuer(), fixture.ca.cert.subject());
    assert_eq!(leaf.signature_algorithm(), Some(SignatureAlgorithm::Sha512WithRSA));
    assert!(matches!(contents.key, KeyPair::Rsa { .. }));
    assert_eq!(
        contents.key.public_key().to_spki().unwrap(),
        *leaf.public_key_info()
    );
}

#[test]
fn test_issue_with_encrypted_root_key() {
    let fixture = util::generate_rsa_ca("Encrypted Root");
    let registry = Arc::new(CertificateAuthorityRegistry::new());
    let key_pem = fixture.encrypted_key_pem(Cipher::aes_256_cbc(), "ca-secret");
    registry
        .load("enc", fixture.cert_pem.as_bytes(), key_pem.as_bytes())
        .unwrap();
    let issuer = CertificateIssuer::new(registry);

    let archive = issuer.issue("enc", "ca-secret", &client1_template()).unwrap();
    let leaf = archive::open(archive.as_bytes(), archive.passphrase())
        .unwrap()
        .certificate;
    assert_eq!(leaf.issuer(), fixture.ca.cert.subject());

    assert_eq!(
        issuer
            .issue("enc", "not-the-secret", &client1_template())
            .unwrap_err(),
        CertPackError::BadPassphrase
    );
    assert_eq!(
        issuer.issue("enc", "", &client1_template()).unwrap_err(),
        CertPackError::BadPassphrase
    );
}

#[test]
fn test_issue_signs_with_ecdsa_identity() {
    let (ca, key_pem) = util::generate_ecdsa_ca("EC Root");
    let registry = Arc::new(CertificateAuthorityRegistry::new());
    registry
        .load("ec", ca.cert.to_pem().unwrap().as_bytes(), key_pem.as_bytes())
        .unwrap();
    let issuer = CertificateIssuer::new(registry);

    // the profile asks for SHA-512 with RSA, which an EC key cannot produce
    let err = issuer.issue("ec", "", &client1_template()).unwrap_err();
    assert!(matches!(err, CertPackError::SigningError(_)));

    let template = build_template(
        client1_template(),
        [TemplateField::SignatureAlgorithm(
            SignatureAlgorithm::Sha256WithECDSA,
        )],
    )
    .unwrap();
    let archive = issuer.issue("ec", "", &template).unwrap();
    let leaf = archive::open(archive.as_bytes(), archive.passphrase())
        .unwrap()
        .certificate;
    assert_eq!(leaf.signature_algorithm(), Some(SignatureAlgorithm::Sha256WithECDSA));
}

#[test]
fn test_issue_rejects_inverted_validity() {
    let (registry, _) = registry_with_root();
    let issuer = CertificateIssuer::new(registry);
    let now = OffsetDateTime::now_utc();
    let template = build_template(
        client1_template(),
        [
            TemplateField::NotBefore(now + Duration::days(2)),
            TemplateField::NotAfter(now),
        ],
    )
    .unwrap();
    assert!(matches!(
        issuer.issue("root", "", &template),
        Err(CertPackError::SigningError(_))
    ));
}

#[test]
fn test_custom_and_disabled_password_generators() {
    let (registry, _) = registry_with_root();

    let fixed = CertificateIssuer::builder()
        .registry(Arc::clone(&registry))
        .password_generator(PasswordGenerator::custom(|| "fixed-passphrase".to_string()))
        .build();
    let archive = fixed.issue("root", "", &client1_template()).unwrap();
    assert_eq!(archive.passphrase(), "fixed-passphrase");
    assert!(archive::open(archive.as_bytes(), "fixed-passphrase").is_ok());

    let disabled = CertificateIssuer::builder()
        .registry(registry)
        .password_generator(PasswordGenerator::Disabled)
        .build();
    let archive = disabled.issue("root", "", &client1_template()).unwrap();
    assert_eq!(archive.passphrase(), "");
    assert!(archive::open(archive.as_bytes(), "").is_ok());
}

#[test]
fn test_each_issue_uses_a_fresh_leaf_key() {
    let (registry, _) = registry_with_root();
    let issuer = CertificateIssuer::new(registry);
    let first = issuer.issue("root", "", &client1_template()).unwrap();
    let second = issuer.issue("root", "", &client1_template()).unwrap();
    let first = archive::open(first.as_bytes(), first.passphrase()).unwrap();
    let second = archive::open(second.as_bytes(), second.passphrase()).unwrap();
    assert_ne!(first.key.public_key(), second.key.public_key());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_unknown_identity_reaches_both_handlers() {
    let issuer = Arc::new(CertificateIssuer::new(Arc::new(
        CertificateAuthorityRegistry::new(),
    )));
    let dispatcher = AsyncIssuanceDispatcher::new(issuer);
    let seen: Arc<Mutex<Vec<IssuanceOutcome>>> = Arc::new(Mutex::new(Vec::new()));

    let handlers: Vec<Arc<dyn IssuanceHandler>> = (0..2)
        .map(|_| {
            let seen = Arc::clone(&seen);
            Arc::new(move |outcome: &IssuanceOutcome| {
                seen.lock().unwrap().push(outcome.clone());
            }) as Arc<dyn IssuanceHandler>
        })
        .collect();

    dispatcher
        .issue_async("no-such-ca", "", client1_template(), handlers)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for outcome in seen.iter() {
        assert_eq!(
            outcome.error(),
            Some(&CertPackError::UnknownIdentity("no-such-ca".to_string()))
        );
        assert_eq!(outcome.identity_name, "no-such-ca");
        assert!(outcome.archive_bytes().is_none());
        assert!(outcome.passphrase().is_none());
        assert_eq!(outcome.template.subject.common_name, "client1");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_success_delivers_archive() {
    let (registry, _) = registry_with_root();
    let dispatcher = AsyncIssuanceDispatcher::new(Arc::new(CertificateIssuer::new(registry)));
    let (sender, receiver) = tokio::sync::oneshot::channel();
    let sender = Mutex::new(Some(sender));

    let handler: Arc<dyn IssuanceHandler> = Arc::new(move |outcome: &IssuanceOutcome| {
        if let Some(sender) = sender.lock().unwrap().take() {
            sender.send(outcome.clone()).unwrap();
        }
    });
    let _ = dispatcher.issue_async("root", "", client1_template(), vec![handler]);

    let outcome = tokio::time::timeout(std::time::Duration::from_secs(120), receiver)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.error().is_none());
    let contents = archive::open(
        outcome.archive_bytes().unwrap(),
        outcome.passphrase().unwrap(),
    )
    .unwrap();
    assert_eq!(contents.certificate.common_name().as_deref(), Some("client1"));
}

#[test]
fn test_convert_empty_bundle() {
    let fixture = util::generate_rsa_ca("Root");
    assert_eq!(
        pem_bundle_to_archive(b"", fixture.key_pem.as_bytes(), None, "pw").unwrap_err(),
        CertPackError::EmptyCertBundle
    );
}

#[test]
fn test_convert_uses_first_certificate_of_chain() {
    let fixture = util::generate_rsa_ca("Leaf Holder");
    let (other, _) = util::generate_ecdsa_ca("Someone Else");
    let chain = format!("{}{}", fixture.cert_pem, other.cert.to_pem().unwrap());

    let der = pem_bundle_to_archive(
        chain.as_bytes(),
        fixture.encrypted_key_pem(Cipher::des_ede3_cbc(), "k").as_bytes(),
        Some("k"),
        "archive-pw",
    )
    .unwrap();
    let contents = archive::open(&der, "archive-pw").unwrap();
    assert_eq!(
        contents.certificate.to_der().unwrap(),
        fixture.ca.cert.to_der().unwrap()
    );
    assert!(matches!(
        archive::open(&der, "other-pw"),
        Err(CertPackError::BadPassphrase)
    ));
}
