//! # CertPack - Certificate Issuance and PKCS#12 Packaging in Pure Rust
//!
//! CertPack holds named certificate authorities, signs leaf certificates
//! against them and hands each new certificate out as a passphrase-protected
//! PKCS#12 archive, together with a freshly generated private key. It is built
//! on rustcrypto libraries, without openssl or ring (except for testing).
//!
//! ## Supported Signing Keys
//!
//! CA keys may be provisioned in any of these PEM encodings, and the encoding
//! does not need to be declared:
//! - **PKCS#1**: `RSA PRIVATE KEY`
//! - **PKCS#8**: `PRIVATE KEY` holding an RSA or P-256/P-384/P-521 key
//! - **SEC1**: `EC PRIVATE KEY`
//!
//! Legacy OpenSSL PEM encryption (`Proc-Type: 4,ENCRYPTED`) and encrypted
//! PKCS#8 (`ENCRYPTED PRIVATE KEY`) are decrypted with the passphrase given
//! at issuance time.
//!
//! Leaf keys are always RSA 2048.
//!
//! ## Key Features
//!
//! - **CA Registry**: Append-only set of named signing identities, safe to share between threads
//! - **Template Builder**: Ordered, validated field mutations with last-write-wins semantics
//! - **Async Issuance**: Run issuance on tokio and deliver the outcome to handlers
//! - **PEM Conversion**: Turn an existing certificate and key into a PKCS#12 archive
//!
//! ## Quick Start
//!
//! ### Issuing a Client Certificate
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use certpack::{
//!     issuance::CertificateIssuer,
//!     registry::CertificateAuthorityRegistry,
//!     template::{ClientServerProfile, TemplateField, TemplateProfile},
//! };
//!
//! # fn main() -> Result<(), certpack::error::CertPackError> {
//! # let (ca_cert_pem, ca_key_pem) = (String::new(), String::new());
//! let registry = Arc::new(CertificateAuthorityRegistry::new());
//! registry.load("root", ca_cert_pem.as_bytes(), ca_key_pem.as_bytes())?;
//!
//! let template = ClientServerProfile.generate([
//!     TemplateField::common_name("client1"),
//!     TemplateField::dns_names(["client1.example.com"]),
//! ])?;
//!
//! let issuer = CertificateIssuer::new(registry);
//! let archive = issuer.issue("root", "", &template)?;
//! println!("{} bytes, passphrase {}", archive.as_bytes().len(), archive.passphrase());
//! # Ok(())
//! # }
//! ```
//!
//! ### Bootstrapping a CA
//!
//! ```rust
//! use certpack::{
//!     cert::params::{CertificateTemplate, DistinguishedName, Validity},
//!     issuer::self_signed,
//!     key::KeyPair,
//! };
//!
//! # fn main() -> Result<(), certpack::error::CertPackError> {
//! let key = KeyPair::generate_ecdsa_p256();
//! let validity = Validity::for_days(365);
//! let template = CertificateTemplate {
//!     serial_number: Some(vec![1]),
//!     not_before: Some(validity.not_before),
//!     not_after: Some(validity.not_after),
//!     subject: DistinguishedName::builder()
//!         .common_name("Example Root".to_string())
//!         .organization(vec!["Example Corp".to_string()])
//!         .build(),
//!     is_ca: true,
//!     basic_constraints_valid: true,
//!     ..Default::default()
//! };
//! let ca_cert = self_signed(&template, &key)?;
//! assert_eq!(ca_cert.issuer(), ca_cert.subject());
//! # Ok(())
//! # }
//! ```
//!
//! ### Asynchronous Issuance
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use certpack::{
//!     cert::params::CertificateTemplate,
//!     dispatch::{AsyncIssuanceDispatcher, IssuanceHandler, IssuanceOutcome},
//!     issuance::CertificateIssuer,
//!     registry::CertificateAuthorityRegistry,
//! };
//!
//! # async fn run() {
//! let issuer = CertificateIssuer::new(Arc::new(CertificateAuthorityRegistry::new()));
//! let dispatcher = AsyncIssuanceDispatcher::new(Arc::new(issuer));
//! let log: Arc<dyn IssuanceHandler> = Arc::new(|outcome: &IssuanceOutcome| {
//!     println!("{}: {:?}", outcome.identity_name, outcome.error());
//! });
//! dispatcher
//!     .issue_async("root", "", CertificateTemplate::default(), vec![log])
//!     .await
//!     .unwrap();
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns a complete result or one [`error::CertPackError`]:
//!
//! ```rust
//! use certpack::{error::CertPackError, key::decode_private_key_pem};
//!
//! match decode_private_key_pem(b"invalid pem data", None) {
//!     Ok(_) => println!("Key decoded"),
//!     Err(CertPackError::BadPassphrase) => println!("Wrong passphrase"),
//!     Err(CertPackError::KeyParseError(msg)) => println!("Failed to parse key: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`registry`]: Named signing identities
//! - [`template`]: Template field mutations and profiles
//! - [`issuance`]: The issuance pipeline and passphrase generation
//! - [`dispatch`]: Asynchronous issuance with result handlers
//! - [`archive`]: PKCS#12 packaging and reading
//! - [`convert`]: PEM certificate and key to PKCS#12
//! - [`key`]: Key decoding, generation and signing
//! - [`cert`]: Certificate parsing, templates and extensions
//! - [`issuer`]: Certificate signing
//! - [`tbs_certificate`]: Low-level certificate structure assembly
//! - [`error`]: Error type

pub mod archive;
pub mod cert;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod issuance;
pub mod issuer;
pub mod key;
pub mod registry;
pub mod tbs_certificate;
pub mod template;

pub use archive::Archive;
pub use cert::params::CertificateTemplate;
pub use convert::pem_bundle_to_archive;
pub use dispatch::{AsyncIssuanceDispatcher, IssuanceHandler, IssuanceOutcome};
pub use error::{CertPackError, Result};
pub use issuance::{CertificateIssuer, PasswordGenerator};
pub use registry::{CertificateAuthorityRegistry, SigningIdentity};
