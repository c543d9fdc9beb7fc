//! UnionPay Gateway Client
//!
//! A client for the UnionPay card-payment gateway: builds signed transaction
//! requests, dispatches them over HTTP(S), and verifies signed responses
//! against a certificate chain of trust.
//!
//! # What this crate does
//!
//! Payment gateways of this family authenticate both directions of every
//! exchange. Outbound, each request is projected to a canonical string,
//! hashed, and signed with the merchant's RSA key; inbound, each response
//! carries its own signing certificate, which must both match the response
//! signature and chain to the gateway operator's CA certificates before a
//! single field of it is believed. This crate owns that signing and trust
//! discipline plus the transaction lifecycle built on top of it:
//!
//! - **Create** a front-channel (browser redirect) or app-channel (token)
//!   consumption order
//! - **Query** a transaction and get a normalized
//!   Success / Pending / Fail / NotFound outcome
//! - **Cancel** a same-day transaction or **refund** a settled one
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                UnionpayClient (gateway)              │
//! │   builds payload → signs → sends → verifies → maps   │
//! └──────┬──────────────┬──────────────┬────────────────┘
//!        │              │              │
//! ┌──────▼─────┐ ┌──────▼──────┐ ┌─────▼──────────────┐
//! │   form     │ │    sign     │ │     transport      │
//! │ canonical  │ │ RSA-SHA256  │ │ form POST, reqwest │
//! │ projection │ │ sign/verify │ │ (redirects stay    │
//! └────────────┘ └──────┬──────┘ │  unfollowed)       │
//!                       │        └────────────────────┘
//!                ┌──────▼──────┐
//!                │    trust    │
//!                │ keys, CAs,  │
//!                │ openssl CLI │
//!                └─────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use unionpay_gateway::gateway::{GatewayConfig, UnionpayClient, WebOrderParams};
//!
//! # async fn example() -> unionpay_gateway::Result<()> {
//! let config: GatewayConfig = serde_json::from_value(serde_json::json!({
//!     "sandbox": true,
//!     "mer_id": "777290058110097",
//!     "key_material": {
//!         "container": "certs/acp_test_sign.pfx",
//!         "passphrase": "000000"
//!     },
//!     "trust": {
//!         "root_ca": "certs/acp_test_root.cer",
//!         "intermediate_cas": ["certs/acp_test_middle.cer"]
//!     },
//!     "callbacks": {
//!         "consume_notify_url": "https://shop.example.com/unionpay/notify",
//!         "consume_return_url": "https://shop.example.com/unionpay/return"
//!     }
//! }))
//! .expect("valid config shape");
//!
//! // Key material is extracted and validated here, once.
//! let client = UnionpayClient::connect(config).await?;
//!
//! let order = client
//!     .create_web_order(WebOrderParams {
//!         order_id: "ORD20260807123456".to_owned(),
//!         amount: 100, // minor units
//!         description: "annual membership".to_owned(),
//!         attachment: None,
//!         extra: Default::default(),
//!     })
//!     .await?;
//!
//! // Send the payer's browser to the gateway's payment page.
//! println!("redirect to {}", order.redirect);
//! # Ok(())
//! # }
//! ```
//!
//! # Module organization
//!
//! - [`form`]: canonical form codec: deterministic string/hash projection
//! - [`trust`]: merchant key material, trust anchors, openssl toolchain
//! - [`sign`]: signature engine: sign outbound forms, verify inbound ones
//! - [`transport`]: HTTP transport collaborator (sealed)
//! - [`gateway`]: transaction orchestrator and configuration
//! - [`error`]: error types, with authentication failures kept distinct
//!   from business declines
//!
//! # Trust model
//!
//! Responses are trusted only after three independent checks: the response
//! is addressed to this merchant, its signature verifies against the
//! certificate it embeds, and that certificate validates against the
//! configured root (and intermediate) CA certificates. Chain validation
//! delegates to the `openssl` CLI and accepts nothing but its structured
//! exit status: a response failing any check is a
//! [`GatewayError::TrustChain`], never a business error.
//!
//! # Unknown outcomes
//!
//! A transport timeout does NOT mean the transaction failed; the gateway
//! may have processed it. Treat timeouts as unknown and reconcile with
//! [`gateway::UnionpayClient::query_order`], which reports a missing order
//! as [`gateway::TransactionStatus::NotFound`] rather than an error.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod form;
pub mod gateway;
pub mod sign;
pub mod transport;
pub mod trust;

pub use error::{GatewayError, Result};
pub use gateway::{GatewayConfig, UnionpayClient};
