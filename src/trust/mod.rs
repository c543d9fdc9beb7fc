//! Certificate and trust management: merchant key material and the
//! gateway's certificate chain of trust.
//!
//! [`MerchantIdentity`] carries the merchant's signing keys and codes,
//! parsed eagerly at construction so a configuration problem surfaces as a
//! typed error before the first transaction, not as a failure mid-call.
//! [`TrustAnchors`] is the read-only root + intermediate certificate set
//! that inbound responses are validated against. Both are immutable for the
//! lifetime of a client.

use std::path::PathBuf;

use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey},
};
use tracing::instrument;

use crate::error::{GatewayError, Result};

mod toolchain;

pub use toolchain::{KeyKind, OpensslToolchain, serial_hex_to_decimal};

/// A certificate or key container, either on disk or already in memory.
///
/// The gateway's CA certificates and the merchant's key container may be
/// configured as filesystem paths or as inline PEM text; [`detect`]
/// distinguishes the two by the PEM armor prefix.
///
/// [`detect`]: Self::detect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertSource {
    /// A filesystem path, handed to the toolchain as-is.
    Path(PathBuf),
    /// In-memory PEM text, materialized to scratch storage on demand.
    Pem(String),
}

impl CertSource {
    /// Classifies a configuration value as inline PEM or a path.
    ///
    /// # Examples
    ///
    /// ```
    /// use unionpay_gateway::trust::CertSource;
    ///
    /// assert!(matches!(CertSource::detect("/etc/ssl/acp_root.pem"), CertSource::Path(_)));
    /// assert!(matches!(
    ///     CertSource::detect("-----BEGIN CERTIFICATE-----\n..."),
    ///     CertSource::Pem(_)
    /// ));
    /// ```
    #[must_use]
    pub fn detect(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim_start().starts_with("-----") {
            Self::Pem(value)
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

/// The ordered trust-anchor chain: one root CA and zero-or-more
/// intermediates, root first.
///
/// Used only for validating certificates presented in inbound responses,
/// never for the merchant's own key. Loaded once at configuration time.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    root: CertSource,
    intermediates: Vec<CertSource>,
}

impl TrustAnchors {
    /// Builds a trust-anchor set from a root and its intermediates.
    #[must_use]
    pub fn new(root: CertSource, intermediates: Vec<CertSource>) -> Self {
        Self { root, intermediates }
    }

    /// The root authority certificate.
    #[must_use]
    pub fn root(&self) -> &CertSource {
        &self.root
    }

    /// Intermediate authority certificates, permitted in the path but not
    /// themselves trusted.
    #[must_use]
    pub fn intermediates(&self) -> &[CertSource] {
        &self.intermediates
    }
}

/// The merchant's registration codes, fixed per gateway contract.
#[derive(Debug, Clone)]
pub struct MerchantProfile {
    /// Merchant identifier assigned by the gateway operator.
    pub mer_id: String,
    /// Access-type code (`0` direct, `1` service provider, `2` platform).
    pub access_type: String,
    /// Default channel-type code (`07` web, `08` mobile).
    pub channel_type: String,
    /// ISO 4217 numeric currency code (`156` for CNY).
    pub currency_code: String,
}

/// The merchant's signing identity: registration codes plus eagerly parsed
/// RSA key material and the certificate serial the gateway knows the key by.
///
/// Immutable after construction; every outbound signature for the lifetime
/// of a client uses this identity's private key.
#[derive(Debug, Clone)]
pub struct MerchantIdentity {
    profile: MerchantProfile,
    cert_id: String,
    signing_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl MerchantIdentity {
    /// Builds an identity from already-extracted PEM key material and a
    /// decimal certificate serial.
    ///
    /// The private key may be PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`); the public key SPKI (`BEGIN PUBLIC KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::KeyExtraction`] if either PEM fails to parse.
    pub fn from_key_material(
        profile: MerchantProfile,
        private_key_pem: &str,
        public_key_pem: &str,
        cert_id: impl Into<String>,
    ) -> Result<Self> {
        let signing_key = parse_private_key_pem(private_key_pem)?;
        let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).map_err(|e| {
            GatewayError::KeyExtraction(format!("public key PEM did not parse: {e}"))
        })?;

        Ok(Self { profile, cert_id: cert_id.into(), signing_key, public_key })
    }

    /// Builds an identity from a password-protected PKCS#12 key container.
    ///
    /// The container is unwrapped through the toolchain: container → X.509
    /// bundle, then public key, private key and serial number from that
    /// bundle. The hexadecimal serial is normalized to the decimal string
    /// used as `certId` downstream.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::KeyExtraction`] if any toolchain step fails
    /// or the produced keys do not parse.
    #[instrument(skip_all, fields(mer_id = %profile.mer_id))]
    pub async fn from_pkcs12(
        profile: MerchantProfile,
        container: &CertSource,
        passphrase: Option<&str>,
        toolchain: &OpensslToolchain,
    ) -> Result<Self> {
        let bundle = toolchain.x509_from_pkcs12(container, passphrase).await?;
        let bundle = CertSource::Pem(bundle);

        let private_pem = toolchain.key_from_x509(&bundle, KeyKind::Private).await?;
        let public_pem = toolchain.key_from_x509(&bundle, KeyKind::Public).await?;
        let serial_hex = toolchain.serial_from_x509(&bundle).await?;
        let cert_id = serial_hex_to_decimal(&serial_hex)?;

        Self::from_key_material(profile, &private_pem, &public_pem, cert_id)
    }

    /// The merchant's registration codes.
    #[must_use]
    pub fn profile(&self) -> &MerchantProfile {
        &self.profile
    }

    /// Merchant identifier.
    #[must_use]
    pub fn mer_id(&self) -> &str {
        &self.profile.mer_id
    }

    /// Decimal certificate serial, sent as `certId` on every request.
    #[must_use]
    pub fn cert_id(&self) -> &str {
        &self.cert_id
    }

    /// The private signing key.
    #[must_use]
    pub fn signing_key(&self) -> &RsaPrivateKey {
        &self.signing_key
    }

    /// The merchant's own public key.
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }
}

fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| GatewayError::KeyExtraction(format!("private key PEM did not parse: {e}")))
}
