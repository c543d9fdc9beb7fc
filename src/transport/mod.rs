//! Transport collaborator: carries finalized forms to the gateway.
//!
//! The orchestrator hands a fully signed field mapping to [`Transport`] and
//! gets back the raw response: body text decoded per the response's
//! declared character set plus the `Location` header, which the
//! front-channel create flow reads instead of a body. Redirects are never
//! followed; interpreting the response is the orchestrator's job, not the
//! transport's.
//!
//! Connection management, TLS negotiation, and body decoding are treated as
//! a conventional HTTP-client capability; [`HttpTransport`] is a thin
//! reqwest adapter and deliberately contains no gateway logic.

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use std::collections::BTreeMap;

use crate::error::Result;

mod http;
pub(crate) mod sealed;

pub use http::{HttpConfig, HttpTransport};

/// Raw response from one gateway POST.
#[derive(Debug, Clone)]
pub struct FormResponse {
    /// HTTP status code. Surfaced, not interpreted: the front-channel flow
    /// treats a redirect status as its success path.
    pub status: u16,
    /// Response body, decoded per the declared character set. May be empty.
    pub body: String,
    /// The `Location` response header, if present.
    pub location: Option<String>,
}

/// Transport protocol abstraction.
///
/// Sealed: implementations outside this crate could bypass the signing
/// discipline the orchestrator enforces, so none are permitted.
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// POSTs `fields` to `url` as `application/x-www-form-urlencoded` in the
    /// given character encoding.
    ///
    /// # Errors
    ///
    /// Returns the underlying HTTP error unchanged on connection failure or
    /// timeout. A timeout is an UNKNOWN outcome: the gateway may still have
    /// processed the request; callers reconcile via the query operation.
    fn send_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a BTreeMap<String, String>,
        encoding: &'a str,
    ) -> impl Future<Output = Result<FormResponse>> + Send + 'a;
}
