//! Issuance off the caller's path, with the outcome delivered to handlers.
//!
//! The pipeline runs on tokio's blocking pool. Its result travels over a
//! oneshot channel to a delivery task, which calls every handler once, in
//! the order given.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::archive::Archive;
use crate::cert::params::CertificateTemplate;
use crate::error::{CertPackError, Result};
use crate::issuance::CertificateIssuer;

/// Everything a handler learns about one asynchronous issuance.
#[derive(Debug, Clone)]
pub struct IssuanceOutcome {
    pub identity_name: String,
    pub template: CertificateTemplate,
    pub result: Result<Archive>,
}

impl IssuanceOutcome {
    pub fn error(&self) -> Option<&CertPackError> {
        self.result.as_ref().err()
    }

    pub fn archive_bytes(&self) -> Option<&[u8]> {
        self.result.as_ref().ok().map(Archive::as_bytes)
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.result.as_ref().ok().map(Archive::passphrase)
    }
}

/// Receives the outcome of an asynchronous issuance.
pub trait IssuanceHandler: Send + Sync {
    fn handle(&self, outcome: &IssuanceOutcome);
}

impl<F> IssuanceHandler for F
where
    F: Fn(&IssuanceOutcome) + Send + Sync,
{
    fn handle(&self, outcome: &IssuanceOutcome) {
        self(outcome)
    }
}

/// Runs a [`CertificateIssuer`] on the tokio runtime.
#[derive(Debug, Clone)]
pub struct AsyncIssuanceDispatcher {
    issuer: Arc<CertificateIssuer>,
}

impl AsyncIssuanceDispatcher {
    pub fn new(issuer: Arc<CertificateIssuer>) -> Self {
        Self { issuer }
    }

    /// Starts an issuance and returns immediately.
    ///
    /// Every handler is called exactly once with the same outcome, in order.
    /// Awaiting the returned handle waits for delivery to finish; dropping it
    /// leaves the work running. Must be called within a tokio runtime.
    pub fn issue_async(
        &self,
        name: impl Into<String>,
        passphrase: impl Into<String>,
        template: CertificateTemplate,
        handlers: Vec<Arc<dyn IssuanceHandler>>,
    ) -> JoinHandle<()> {
        let identity_name = name.into();
        let passphrase = Zeroizing::new(passphrase.into());
        let issuer = Arc::clone(&self.issuer);
        let (sender, receiver) = oneshot::channel();

        debug!(identity = %identity_name, handlers = handlers.len(), "dispatching issuance");

        let worker_name = identity_name.clone();
        let worker_template = template.clone();
        tokio::task::spawn_blocking(move || {
            let result = issuer.issue(&worker_name, &passphrase, &worker_template);
            // the receiver only goes away if the runtime is shutting down
            let _ = sender.send(result);
        });

        tokio::spawn(async move {
            let result = receiver.await.unwrap_or_else(|_| {
                warn!(identity = %identity_name, "issuance worker ended without a result");
                Err(CertPackError::DispatchError(
                    "issuance worker ended without a result".to_string(),
                ))
            });
            let outcome = IssuanceOutcome {
                identity_name,
                template,
                result,
            };
            for handler in &handlers {
                handler.handle(&outcome);
            }
        })
    }
}
