//! Transaction orchestrator: builds payment-lifecycle payloads, signs them,
//! submits them, and normalizes the gateway's answers.
//!
//! One [`UnionpayClient`] per merchant. Construction is the only fallible
//! setup step: configuration is validated and key material extracted
//! eagerly, so every later failure is about a single call, never about
//! hidden state. Each operation is a strictly sequential
//! canonicalize → sign → send → verify pipeline; concurrent operations on
//! one client are independent and need no locking.
//!
//! A transport timeout leaves the outcome UNKNOWN (the gateway may have
//! processed the request); reconcile with [`UnionpayClient::query_order`]
//! rather than assuming failure. Retries are the caller's business and must
//! rebuild the payload so `txnTime` and the signature are fresh.

use chrono::Local;
use tracing::{debug, instrument};

use crate::{
    error::{GatewayError, Result},
    form::TransactionForm,
    sign::{FormSigner, ResponseVerifier},
    transport::{FormResponse, HttpTransport, Transport},
    trust::{CertSource, MerchantIdentity, OpensslToolchain, TrustAnchors},
};

mod config;
mod models;

pub use config::{
    CallbackConfig, GatewayConfig, KeyMaterial, PRODUCTION_ORIGIN, SANDBOX_ORIGIN, TrustConfig,
};
pub use models::{
    AppOrder, AppOrderParams, Attachment, BackChannelAck, BackChannelParams, ExtraFields,
    QueryParams, TransactionOutcome, TransactionStatus, WebOrder, WebOrderParams,
};

use models::{normalize_back_channel_ack, normalize_query_outcome};

// Fixed transaction codes per gateway contract.
const BIZ_TYPE_CONSUME: &str = "000201";
const BIZ_TYPE_QUERY: &str = "000000";
const TXN_TYPE_CONSUME: &str = "01";
const TXN_TYPE_QUERY: &str = "00";
const TXN_TYPE_CANCEL: &str = "31";
const TXN_TYPE_REFUND: &str = "04";
const TXN_SUB_TYPE_CONSUME: &str = "01";
const TXN_SUB_TYPE_DEFAULT: &str = "00";
const APP_CHANNEL_TYPE: &str = "08";

/// Field names the caller may never inject through `extra`.
const RESERVED_FIELDS: [&str; 4] = ["signature", "signMethod", "certId", "merId"];

/// UnionPay gateway client for one merchant identity.
///
/// Holds only read-only state after construction (configuration, identity,
/// trust anchors), so a single client is safely shared across tasks.
///
/// # Examples
///
/// ```no_run
/// use unionpay_gateway::gateway::{GatewayConfig, UnionpayClient, WebOrderParams};
///
/// # async fn example() -> unionpay_gateway::Result<()> {
/// let config: GatewayConfig = serde_json::from_value(serde_json::json!({
///     "mer_id": "777290058110097",
///     "key_material": { "container": "certs/acp_test_sign.pfx", "passphrase": "000000" },
///     "trust": {
///         "root_ca": "certs/acp_test_root.cer",
///         "intermediate_cas": ["certs/acp_test_middle.cer"]
///     },
///     "callbacks": {
///         "consume_notify_url": "https://shop.example.com/unionpay/notify",
///         "consume_return_url": "https://shop.example.com/unionpay/return"
///     }
/// }))
/// .expect("config shape is valid");
/// let client = UnionpayClient::connect(config).await?;
///
/// let order = client
///     .create_web_order(WebOrderParams {
///         order_id: "ORD20260807120000".to_owned(),
///         amount: 100,
///         description: "membership".to_owned(),
///         attachment: None,
///         extra: Default::default(),
///     })
///     .await?;
///
/// // Send the payer's browser here.
/// println!("{}", order.redirect);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UnionpayClient<T: Transport = HttpTransport> {
    config: GatewayConfig,
    identity: MerchantIdentity,
    anchors: TrustAnchors,
    toolchain: OpensslToolchain,
    signer: FormSigner,
    transport: T,
}

impl UnionpayClient<HttpTransport> {
    /// Builds a client over the default HTTP transport.
    ///
    /// Validates the configuration and extracts key material eagerly; a bad
    /// key container or passphrase fails here, not on the first payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] or [`GatewayError::KeyExtraction`].
    pub async fn connect(config: GatewayConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new()).await
    }
}

impl<T: Transport> UnionpayClient<T> {
    /// Builds a client over a specific transport.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] or [`GatewayError::KeyExtraction`].
    #[instrument(skip_all, fields(mer_id = %config.mer_id, sandbox = config.sandbox))]
    pub async fn with_transport(config: GatewayConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let toolchain = OpensslToolchain::new();
        let identity = match &config.key_material {
            KeyMaterial::Pem { public_key, private_key, cert_id } => {
                MerchantIdentity::from_key_material(
                    config.profile(),
                    private_key,
                    public_key,
                    cert_id.clone(),
                )?
            }
            KeyMaterial::Pkcs12 { container, passphrase } => {
                MerchantIdentity::from_pkcs12(
                    config.profile(),
                    &CertSource::detect(container.clone()),
                    passphrase.as_deref(),
                    &toolchain,
                )
                .await?
            }
        };

        let anchors = config.trust.anchors();
        let signer = FormSigner::for_identity(&identity);
        debug!(cert_id = %identity.cert_id(), "merchant identity ready");

        Ok(Self { config, identity, anchors, toolchain, signer, transport })
    }

    /// The validated configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The merchant identity every outbound request is signed with.
    #[must_use]
    pub fn identity(&self) -> &MerchantIdentity {
        &self.identity
    }

    /// Creates a front-channel order: the payer finishes payment on the
    /// gateway's page, reached via the returned redirect URL.
    ///
    /// Success is a `Location` header with an empty body. A non-empty body
    /// is an error report: its embedded message (when present) surfaces as
    /// [`GatewayError::Business`], otherwise [`GatewayError::Protocol`].
    ///
    /// # Errors
    ///
    /// [`GatewayError::Business`], [`GatewayError::Protocol`], or a
    /// transport error.
    #[instrument(skip(self, params), fields(order_id = %params.order_id, amount = params.amount))]
    pub async fn create_web_order(&self, params: WebOrderParams) -> Result<WebOrder> {
        let mut form = self.base_form();
        form.set("channelType", &self.config.channel_type);
        form.set("bizType", BIZ_TYPE_CONSUME);
        form.set("txnType", TXN_TYPE_CONSUME);
        form.set("txnSubType", TXN_SUB_TYPE_CONSUME);
        form.set("txnTime", txn_time_now());
        form.set("backUrl", &self.config.callbacks.consume_notify_url);
        form.set("frontUrl", &self.config.callbacks.consume_return_url);
        form.set("orderId", &params.order_id);
        form.set("txnAmt", params.amount);
        form.set("orderDesc", &params.description);
        form.set_opt("reqReserved", params.attachment.map(Attachment::into_field));
        merge_extra(&mut form, params.extra)?;

        let response = self.post(&self.config.front_trans_url(), form).await?;

        match response.location.as_deref() {
            Some(redirect) if response.body.trim().is_empty() => {
                debug!("front-channel order accepted");
                Ok(WebOrder { redirect: redirect.to_owned() })
            }
            _ => Err(front_channel_error(&response)),
        }
    }

    /// Creates an app-channel order and returns the payment token (`tn`)
    /// for the mobile SDK.
    ///
    /// The response body is a signed flat form; it is authenticated against
    /// the trust anchors BEFORE the token is read. An unauthenticated
    /// response yields [`GatewayError::TrustChain`] and no token.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TrustChain`], [`GatewayError::Business`],
    /// [`GatewayError::Protocol`], or a transport error.
    #[instrument(skip(self, params), fields(order_id = %params.order_id, amount = params.amount))]
    pub async fn create_app_order(&self, params: AppOrderParams) -> Result<AppOrder> {
        let mut form = self.base_form();
        form.set("channelType", APP_CHANNEL_TYPE);
        form.set("bizType", BIZ_TYPE_CONSUME);
        form.set("txnType", TXN_TYPE_CONSUME);
        form.set("txnSubType", TXN_SUB_TYPE_CONSUME);
        form.set("txnTime", txn_time_now());
        form.set("backUrl", &self.config.callbacks.consume_notify_url);
        form.set("orderId", &params.order_id);
        form.set("txnAmt", params.amount);
        form.set("orderDesc", &params.description);
        form.set_opt("reqReserved", params.attachment.map(Attachment::into_field));
        merge_extra(&mut form, params.extra)?;

        let response = self.post(&self.config.app_trans_url(), form).await?;
        let raw = parse_signed_body(&response)?;
        self.verifier().verify(&raw).await?;

        let resp_code = raw
            .get("respCode")
            .ok_or_else(|| GatewayError::Protocol("response carries no respCode".to_owned()))?;
        if resp_code != models::RESP_SUCCESS {
            return Err(GatewayError::Business {
                code: resp_code.to_owned(),
                message: raw.get("respMsg").unwrap_or_default().to_owned(),
            });
        }

        let tn = raw
            .get("tn")
            .ok_or_else(|| {
                GatewayError::Protocol("successful app order carries no tn token".to_owned())
            })?
            .to_owned();
        Ok(AppOrder { tn, raw })
    }

    /// Queries the state of a previously submitted transaction.
    ///
    /// The gateway's answer is authenticated, then normalized: not-found is
    /// reported as [`TransactionStatus::NotFound`], never thrown, so a
    /// reconciliation loop can branch on plain data.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TrustChain`], [`GatewayError::Business`] (the
    /// gateway could not answer the query), [`GatewayError::Protocol`], or
    /// a transport error.
    #[instrument(skip(self, params), fields(order_id = %params.order_id))]
    pub async fn query_order(&self, params: QueryParams) -> Result<TransactionOutcome> {
        let mut form = self.base_form();
        form.set("bizType", BIZ_TYPE_QUERY);
        form.set("txnType", TXN_TYPE_QUERY);
        form.set("txnSubType", TXN_SUB_TYPE_DEFAULT);
        form.set("orderId", &params.order_id);
        form.set("txnTime", &params.txn_time);
        merge_extra(&mut form, params.extra)?;

        let response = self.post(&self.config.query_trans_url(), form).await?;
        let raw = parse_signed_body(&response)?;
        self.verifier().verify(&raw).await?;

        normalize_query_outcome(raw)
    }

    /// Cancels (voids) a same-day transaction.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TrustChain`], [`GatewayError::Business`] carrying
    /// the gateway's decline message, [`GatewayError::Protocol`], or a
    /// transport error.
    #[instrument(skip(self, params), fields(order_id = %params.order_id, orig = %params.orig_query_id))]
    pub async fn cancel_order(&self, params: BackChannelParams) -> Result<BackChannelAck> {
        let notify = self.config.callbacks.cancel_notify().to_owned();
        self.back_channel(TXN_TYPE_CANCEL, &notify, params).await
    }

    /// Refunds a settled transaction, fully or partially.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TrustChain`], [`GatewayError::Business`] carrying
    /// the gateway's decline message, [`GatewayError::Protocol`], or a
    /// transport error.
    #[instrument(skip(self, params), fields(order_id = %params.order_id, orig = %params.orig_query_id))]
    pub async fn refund_order(&self, params: BackChannelParams) -> Result<BackChannelAck> {
        let notify = self.config.callbacks.refund_notify().to_owned();
        self.back_channel(TXN_TYPE_REFUND, &notify, params).await
    }

    /// Shared "operate on an original transaction" flow behind cancel and
    /// refund; only the transaction-type code and callback differ.
    async fn back_channel(
        &self,
        txn_type: &str,
        notify_url: &str,
        params: BackChannelParams,
    ) -> Result<BackChannelAck> {
        let mut form = self.base_form();
        form.set(
            "channelType",
            params.channel_type.as_deref().unwrap_or(&self.config.channel_type),
        );
        form.set("bizType", BIZ_TYPE_CONSUME);
        form.set("txnType", txn_type);
        form.set("txnSubType", TXN_SUB_TYPE_DEFAULT);
        form.set("txnTime", txn_time_now());
        form.set("backUrl", notify_url);
        form.set("orderId", &params.order_id);
        form.set("origQryId", &params.orig_query_id);
        form.set("txnAmt", params.amount);
        form.set_opt("reqReserved", params.attachment.map(Attachment::into_field));
        merge_extra(&mut form, params.extra)?;

        let response = self.post(&self.config.back_trans_url(), form).await?;
        let raw = parse_signed_body(&response)?;
        self.verifier().verify(&raw).await?;

        normalize_back_channel_ack(raw)
    }

    /// Fields common to every request.
    fn base_form(&self) -> TransactionForm {
        let profile = self.identity.profile();
        let mut form = TransactionForm::new();
        form.set("version", &self.config.version);
        form.set("encoding", &self.config.encoding);
        form.set("certId", self.identity.cert_id());
        form.set("merId", &profile.mer_id);
        form.set("accessType", &profile.access_type);
        form.set("currencyCode", &profile.currency_code);
        form
    }

    fn verifier(&self) -> ResponseVerifier<'_> {
        ResponseVerifier::new(self.identity.mer_id(), &self.anchors, &self.toolchain)
    }

    /// Finalizes and submits one form. Nothing may touch the form after
    /// signing, so it is consumed here.
    async fn post(&self, url: &str, mut form: TransactionForm) -> Result<FormResponse> {
        self.signer.sign_and_finalize(&mut form);
        self.transport.send_form(url, form.fields(), &self.config.encoding).await
    }
}

/// Merges caller-supplied extra fields, rejecting names that would collide
/// with the signing envelope.
fn merge_extra(form: &mut TransactionForm, extra: ExtraFields) -> Result<()> {
    for (name, value) in extra {
        if name.trim().is_empty() {
            return Err(GatewayError::Config("extra field with empty name".to_owned()));
        }
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return Err(GatewayError::Config(format!("extra field {name} is reserved")));
        }
        form.set(name, value);
    }
    Ok(())
}

/// Parses a flat `key=value&…` response body; an empty body is a protocol
/// violation for every back-channel operation.
fn parse_signed_body(response: &FormResponse) -> Result<TransactionForm> {
    if response.body.trim().is_empty() {
        return Err(GatewayError::Protocol(format!(
            "gateway returned an empty body (HTTP {})",
            response.status
        )));
    }
    Ok(TransactionForm::parse_flat(response.body.trim()))
}

/// Interprets a front-channel response that was not a clean redirect.
fn front_channel_error(response: &FormResponse) -> GatewayError {
    if !response.body.trim().is_empty() {
        let raw = TransactionForm::parse_flat(response.body.trim());
        if let Some(message) = raw.get("respMsg") {
            return GatewayError::Business {
                code: raw.get("respCode").unwrap_or_default().to_owned(),
                message: message.to_owned(),
            };
        }
    }
    GatewayError::Protocol(format!(
        "front-channel response carried neither redirect nor error (HTTP {})",
        response.status
    ))
}

/// Transaction time for this attempt. Recomputed per attempt so a retry
/// never rides an expired timestamp-validation window.
fn txn_time_now() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}
