//! Verification of signed gateway responses.
//!
//! A response authenticates itself with a certificate embedded in its own
//! `signPubKeyCert` field. Trusting it therefore takes three independent
//! checks: the response must be addressed to this merchant, the signature
//! must verify against the embedded certificate's key, and that certificate
//! must chain to the configured trust anchors. Any single failure is fatal
//! for the response.

use base64::Engine;
use rsa::{
    RsaPublicKey,
    pkcs1::DecodeRsaPublicKey,
    pkcs1v15::{Signature, VerifyingKey},
    pkcs8::DecodePublicKey,
    sha2::Sha256,
    signature::Verifier,
};
use tracing::{debug, instrument, warn};
use x509_certificate::X509Certificate;

use crate::{
    error::{GatewayError, Result},
    form::{SIGNATURE_FIELD, TransactionForm},
    trust::{CertSource, OpensslToolchain, TrustAnchors},
};

/// Response field carrying the gateway's signing certificate.
pub(crate) const SIGN_CERT_FIELD: &str = "signPubKeyCert";

/// Response field naming the merchant the response is addressed to.
pub(crate) const MER_ID_FIELD: &str = "merId";

/// Verifies a form's `signature` field against a PEM public key or
/// certificate.
///
/// The digest is recomputed from the form with the signature excluded, so
/// any altered field value fails verification. A missing or malformed
/// signature verifies as `false`.
///
/// # Errors
///
/// Returns [`GatewayError::TrustChain`] only if `key_pem` itself is
/// unusable.
pub fn verify_form(form: &TransactionForm, key_pem: &str) -> Result<bool> {
    let public_key = public_key_from_pem(key_pem)?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);

    let Some(signature_b64) = form.get(SIGNATURE_FIELD) else {
        return Ok(false);
    };
    let Ok(signature_bytes) =
        base64::engine::general_purpose::STANDARD.decode(signature_b64)
    else {
        warn!("signature field is not valid base64");
        return Ok(false);
    };
    let Ok(signature) = Signature::try_from(signature_bytes.as_slice()) else {
        return Ok(false);
    };

    let digest_hex = form.digest_hex();
    Ok(verifying_key.verify(digest_hex.as_bytes(), &signature).is_ok())
}

/// Extracts an RSA public key from PEM text.
///
/// Accepts an X.509 certificate (the key is pulled from its subject public
/// key info) or a bare SPKI/PKCS#1 public key.
fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey> {
    if pem.contains("BEGIN CERTIFICATE") {
        let certificate = X509Certificate::from_pem(pem.as_bytes()).map_err(|e| {
            GatewayError::TrustChain(format!("embedded certificate did not parse: {e}"))
        })?;
        let key_data = certificate.public_key_data();
        return RsaPublicKey::from_pkcs1_der(key_data.as_ref())
            .or_else(|_| RsaPublicKey::from_public_key_der(key_data.as_ref()))
            .map_err(|e| {
                GatewayError::TrustChain(format!("certificate holds no usable RSA key: {e}"))
            });
    }

    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| GatewayError::TrustChain(format!("public key PEM did not parse: {e}")))
}

/// Authenticates inbound responses for one merchant against a trust-anchor
/// set.
#[derive(Debug, Clone, Copy)]
pub struct ResponseVerifier<'a> {
    expected_mer_id: &'a str,
    anchors: &'a TrustAnchors,
    toolchain: &'a OpensslToolchain,
}

impl<'a> ResponseVerifier<'a> {
    /// Creates a verifier for the given merchant and trust anchors.
    #[must_use]
    pub fn new(
        expected_mer_id: &'a str,
        anchors: &'a TrustAnchors,
        toolchain: &'a OpensslToolchain,
    ) -> Self {
        Self { expected_mer_id, anchors, toolchain }
    }

    /// Authenticates a parsed response form.
    ///
    /// Checks, in order: the `merId` field equals the configured merchant
    /// (a response routed to a different merchant context is rejected
    /// outright, before any cryptography); the signature verifies against
    /// the embedded `signPubKeyCert`; and that certificate validates
    /// against the trust anchors.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TrustChain`] on any failed check. No field
    /// of a response that fails here may be trusted.
    #[instrument(skip_all, fields(mer_id = %self.expected_mer_id))]
    pub async fn verify(&self, form: &TransactionForm) -> Result<()> {
        match form.get(MER_ID_FIELD) {
            Some(mer_id) if mer_id == self.expected_mer_id => {}
            Some(other) => {
                warn!(got = %other, "response addressed to a different merchant");
                return Err(GatewayError::TrustChain(format!(
                    "response merchant id {other} does not match configured {}",
                    self.expected_mer_id
                )));
            }
            None => {
                return Err(GatewayError::TrustChain(
                    "response carries no merchant id".to_owned(),
                ));
            }
        }

        let certificate = form.get(SIGN_CERT_FIELD).ok_or_else(|| {
            GatewayError::TrustChain("response carries no signing certificate".to_owned())
        })?;

        if !verify_form(form, certificate)? {
            return Err(GatewayError::TrustChain(
                "response signature does not verify against embedded certificate".to_owned(),
            ));
        }

        let chain_ok = self
            .toolchain
            .verify_chain(&CertSource::Pem(certificate.to_owned()), self.anchors)
            .await?;
        if !chain_ok {
            return Err(GatewayError::TrustChain(
                "embedded certificate does not chain to the configured trust anchors".to_owned(),
            ));
        }

        debug!("response authenticated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rsa::{
        RsaPrivateKey,
        pkcs8::{EncodePublicKey, LineEnding},
    };

    use super::*;
    use crate::sign::FormSigner;

    #[test]
    fn test_verify_form_missing_signature_is_false() {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public_pem = key.to_public_key().to_public_key_pem(LineEnding::LF).unwrap();

        let mut form = TransactionForm::new();
        form.set("respCode", "00");
        assert!(!verify_form(&form, &public_pem).unwrap());
    }

    #[test]
    fn test_verify_form_garbage_signature_is_false() {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public_pem = key.to_public_key().to_public_key_pem(LineEnding::LF).unwrap();

        let mut form = TransactionForm::new();
        form.set("respCode", "00");
        form.set("signature", "!!not-base64!!");
        assert!(!verify_form(&form, &public_pem).unwrap());

        form.set("signature", "AAAA");
        assert!(!verify_form(&form, &public_pem).unwrap());
    }

    #[test]
    fn test_verify_form_unusable_key_is_error() {
        let form = TransactionForm::new();
        assert!(matches!(
            verify_form(&form, "not pem at all"),
            Err(GatewayError::TrustChain(_))
        ));
    }

    #[test]
    fn test_verify_form_wrong_key_is_false() {
        let signing = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let other = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let other_pem = other.to_public_key().to_public_key_pem(LineEnding::LF).unwrap();

        let signer = FormSigner::new(signing);
        let mut form = TransactionForm::new();
        form.set("respCode", "00");
        signer.sign_and_finalize(&mut form);

        assert!(!verify_form(&form, &other_pem).unwrap());
    }
}
