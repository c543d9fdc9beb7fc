//! Error types for the UnionPay gateway client.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Configuration failures** ([`GatewayError::KeyExtraction`],
//!   [`GatewayError::Config`]): key material or configuration must be fixed
//!   before any call can succeed
//! - **Authentication failures** ([`GatewayError::TrustChain`]): a response
//!   signature or certificate chain did not verify: no field of that
//!   response may be trusted
//! - **Protocol failures** ([`GatewayError::Protocol`]): the gateway answered
//!   with an unexpected shape (missing redirect, unparseable body)
//! - **Business declines** ([`GatewayError::Business`]): a well-formed
//!   response with an unsuccessful gateway code
//! - **Transport failures** ([`GatewayError::Http`], [`GatewayError::Io`]):
//!   propagated unchanged from the HTTP client or the local toolchain

use thiserror::Error;

/// Result type alias for gateway operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to the UnionPay gateway.
///
/// Signature and chain failures are deliberately distinct from business
/// declines: [`TrustChain`](Self::TrustChain) means the response cannot be
/// authenticated and callers should alert on potential tampering, while
/// [`Business`](Self::Business) is an ordinary decline carrying the gateway's
/// own message.
///
/// A transaction the gateway has no record of is NOT an error: query
/// operations report it as
/// [`TransactionStatus::NotFound`](crate::gateway::TransactionStatus::NotFound)
/// so callers can branch without exception handling.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The cryptographic toolchain could not produce usable key material.
    ///
    /// Fatal for the client: the key container, passphrase, or PEM input in
    /// the configuration must be fixed.
    #[error("key extraction failed: {0}")]
    KeyExtraction(String),

    /// A gateway response failed signature or certificate chain verification.
    ///
    /// Fatal for that response. Callers must discard every field of the
    /// response and must not retry with relaxed checks: this is an
    /// authentication failure, not a business decline.
    #[error("response authentication failed: {0}")]
    TrustChain(String),

    /// The gateway answered with an unexpected shape.
    ///
    /// Examples: the front-channel create flow returned neither a redirect
    /// location nor an error body, or a back-channel response body was empty.
    #[error("gateway protocol error: {0}")]
    Protocol(String),

    /// The gateway returned a well-formed but unsuccessful response.
    ///
    /// Carries the gateway's response code and message text verbatim.
    #[error("gateway declined with code {code}: {message}")]
    Business {
        /// Gateway response code (`respCode`).
        code: String,
        /// Gateway-provided message (`respMsg`), may be empty.
        message: String,
    },

    /// Invalid configuration was supplied.
    #[error("invalid gateway configuration: {0}")]
    Config(String),

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`] unchanged; connection failures and timeouts
    /// are not reinterpreted here. A timeout means "unknown outcome":
    /// reconcile through the query operation, never assume failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Scratch-file or toolchain process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
