//! Signature engine: signs outbound forms and verifies inbound ones.
//!
//! The scheme is SHA-256-with-RSA (PKCS#1 v1.5) over the form's canonical
//! digest. The digest fed to RSA is the lowercase hex STRING produced by
//! [`TransactionForm::digest_hex`]: both directions of the wire hash that
//! exact byte sequence, so any divergence in canonicalization shows up as a
//! signature mismatch rather than a subtle payload corruption.

use base64::Engine;
use rsa::{
    RsaPrivateKey,
    pkcs1v15::SigningKey,
    sha2::Sha256,
    signature::{SignatureEncoding, Signer},
};
use tracing::instrument;

use crate::{
    form::{SIGNATURE_FIELD, TransactionForm},
    trust::MerchantIdentity,
};

mod verify;

pub use verify::{ResponseVerifier, verify_form};

/// Marker value for the SHA-256-with-RSA signature method.
pub const SIGN_METHOD_RSA: &str = "01";

/// Field naming the signature method on every signed form.
pub const SIGN_METHOD_FIELD: &str = "signMethod";

/// Signs transaction forms with a merchant's private key.
#[derive(Debug, Clone)]
pub struct FormSigner {
    signing_key: SigningKey<Sha256>,
}

impl FormSigner {
    /// Creates a signer over a raw RSA private key.
    #[must_use]
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { signing_key: SigningKey::<Sha256>::new(private_key) }
    }

    /// Creates a signer for a merchant identity.
    #[must_use]
    pub fn for_identity(identity: &MerchantIdentity) -> Self {
        Self::new(identity.signing_key().clone())
    }

    /// Produces the base64 signature of the form's canonical digest.
    ///
    /// The `signature` field is excluded from the digest by the codec, so
    /// signing an already-signed form reproduces the same value.
    #[must_use]
    pub fn sign(&self, form: &TransactionForm) -> String {
        let digest_hex = form.digest_hex();
        let signature = self.signing_key.sign(digest_hex.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
    }

    /// Finalizes a form for transmission: drops empty fields, escapes
    /// separator collisions, stamps the signature method, and attaches the
    /// signature.
    ///
    /// Mutates the form in place. This is the last step before the form
    /// goes on the wire: adding any field afterwards invalidates the
    /// signature on arrival.
    #[instrument(skip_all, fields(fields = form.len()))]
    pub fn sign_and_finalize(&self, form: &mut TransactionForm) {
        form.strip_empty();
        form.escape_separators();
        form.set(SIGN_METHOD_FIELD, SIGN_METHOD_RSA);
        let signature = self.sign(form);
        form.set(SIGNATURE_FIELD, signature);
    }
}
