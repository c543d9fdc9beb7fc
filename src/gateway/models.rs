//! Request parameters, normalized outcomes, and gateway response-code
//! mapping.

use std::collections::BTreeMap;

use crate::{
    error::{GatewayError, Result},
    form::TransactionForm,
};

/// Gateway code meaning the operation succeeded.
pub(crate) const RESP_SUCCESS: &str = "00";

/// Gateway code meaning the queried order does not exist.
pub(crate) const RESP_ORDER_NOT_FOUND: &str = "34";

/// Codes meaning the transaction is still being processed.
///
/// Shared by query normalization (→ [`TransactionStatus::Pending`]) and
/// cancel/refund acceptance.
pub(crate) const IN_FLIGHT_CODES: [&str; 3] = ["03", "04", "05"];

pub(crate) fn is_in_flight(code: &str) -> bool {
    IN_FLIGHT_CODES.contains(&code)
}

/// A caller-supplied attachment, transmitted as one `reqReserved` field.
///
/// The gateway has no structured-field support: textual values go verbatim,
/// anything structured is serialized to JSON first.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Sent exactly as given.
    Text(String),
    /// Serialized to JSON before inclusion.
    Structured(serde_json::Value),
}

impl Attachment {
    pub(crate) fn into_field(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// Caller-supplied extra form fields, merged before canonicalization.
///
/// Keeps the signed field set fully known and auditable: a deterministic
/// mapping instead of ad-hoc field injection.
pub type ExtraFields = BTreeMap<String, String>;

/// Parameters for creating a front-channel (browser redirect) order.
#[derive(Debug, Clone)]
pub struct WebOrderParams {
    /// Merchant order identifier, unique per order.
    pub order_id: String,
    /// Amount in minor currency units (fen for CNY).
    pub amount: u64,
    /// Order description shown to the payer.
    pub description: String,
    /// Optional attachment echoed back in notifications.
    pub attachment: Option<Attachment>,
    /// Additional validated form fields.
    pub extra: ExtraFields,
}

/// Result of a front-channel order creation: where to send the payer.
#[derive(Debug, Clone)]
pub struct WebOrder {
    /// The gateway's payment page URL, from the `Location` header.
    pub redirect: String,
}

/// Parameters for creating an app-channel (token) order.
#[derive(Debug, Clone)]
pub struct AppOrderParams {
    /// Merchant order identifier, unique per order.
    pub order_id: String,
    /// Amount in minor currency units.
    pub amount: u64,
    /// Order description.
    pub description: String,
    /// Optional attachment echoed back in notifications.
    pub attachment: Option<Attachment>,
    /// Additional validated form fields.
    pub extra: ExtraFields,
}

/// Result of an app-channel order creation.
#[derive(Debug, Clone)]
pub struct AppOrder {
    /// Payment token (`tn`) handed to the mobile SDK.
    pub tn: String,
    /// Full verified response, kept for audit.
    pub raw: TransactionForm,
}

/// Parameters for querying a transaction.
#[derive(Debug, Clone)]
pub struct QueryParams {
    /// The original merchant order identifier.
    pub order_id: String,
    /// The ORIGINAL transaction's `txnTime`, exactly as sent then.
    pub txn_time: String,
    /// Additional validated form fields.
    pub extra: ExtraFields,
}

/// Normalized transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// The transaction completed successfully.
    Success,
    /// The transaction is still being processed; query again later.
    Pending,
    /// The transaction failed at the gateway.
    Fail,
    /// The gateway has no record of the order. An outcome, not an error,
    /// so callers branch without exception handling.
    NotFound,
}

/// Normalized result of a query, carrying the gateway's opaque query
/// identifier and the full raw response for audit.
///
/// Never persisted by this crate; the caller owns persistence.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    /// Normalized state.
    pub status: TransactionStatus,
    /// The gateway's opaque query identifier (`queryId`), when present.
    pub query_id: Option<String>,
    /// Every field of the verified response.
    pub raw: TransactionForm,
}

/// Parameters for operating on an original transaction (cancel or refund).
#[derive(Debug, Clone)]
pub struct BackChannelParams {
    /// NEW merchant order identifier for this operation itself.
    pub order_id: String,
    /// The original transaction's opaque query identifier (`queryId`).
    pub orig_query_id: String,
    /// The original amount, in minor currency units.
    pub amount: u64,
    /// Channel of the original transaction; configuration default when
    /// absent.
    pub channel_type: Option<String>,
    /// Optional attachment echoed back in notifications.
    pub attachment: Option<Attachment>,
    /// Additional validated form fields.
    pub extra: ExtraFields,
}

/// Accepted cancel/refund operation.
///
/// Acceptance is not settlement: the gateway may still be processing.
#[derive(Debug, Clone)]
pub struct BackChannelAck {
    /// Query identifier of the new (cancel/refund) transaction.
    pub query_id: Option<String>,
    /// Every field of the verified response.
    pub raw: TransactionForm,
}

/// Maps a verified query response onto a normalized outcome.
///
/// Top-level `respCode` `34` → [`TransactionStatus::NotFound`]; any other
/// non-`00` top-level code is a business failure. With a `00` top-level
/// code, `origRespCode` decides: `00` success, the in-flight set pending,
/// anything else fail.
pub(crate) fn normalize_query_outcome(raw: TransactionForm) -> Result<TransactionOutcome> {
    let resp_code = required_code(&raw, "respCode")?;
    let query_id = raw.get("queryId").map(ToOwned::to_owned);

    if resp_code == RESP_ORDER_NOT_FOUND {
        return Ok(TransactionOutcome { status: TransactionStatus::NotFound, query_id, raw });
    }
    if resp_code != RESP_SUCCESS {
        return Err(business_error(&raw, &resp_code));
    }

    let orig_code = required_code(&raw, "origRespCode")?;
    let status = if orig_code == RESP_SUCCESS {
        TransactionStatus::Success
    } else if is_in_flight(&orig_code) {
        TransactionStatus::Pending
    } else {
        TransactionStatus::Fail
    };

    Ok(TransactionOutcome { status, query_id, raw })
}

/// Maps a verified cancel/refund response onto an acknowledgement.
///
/// `00` and the in-flight codes are accepted; anything else is a business
/// failure carrying the gateway's message.
pub(crate) fn normalize_back_channel_ack(raw: TransactionForm) -> Result<BackChannelAck> {
    let resp_code = required_code(&raw, "respCode")?;
    if resp_code != RESP_SUCCESS && !is_in_flight(&resp_code) {
        return Err(business_error(&raw, &resp_code));
    }

    let query_id = raw.get("queryId").map(ToOwned::to_owned);
    Ok(BackChannelAck { query_id, raw })
}

fn required_code(raw: &TransactionForm, field: &str) -> Result<String> {
    raw.get(field)
        .map(ToOwned::to_owned)
        .ok_or_else(|| GatewayError::Protocol(format!("response carries no {field}")))
}

fn business_error(raw: &TransactionForm, code: &str) -> GatewayError {
    GatewayError::Business {
        code: code.to_owned(),
        message: raw.get("respMsg").unwrap_or_default().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_response(resp_code: &str, orig_code: Option<&str>) -> TransactionForm {
        let mut form = TransactionForm::new();
        form.set("respCode", resp_code);
        form.set("queryId", "Q1");
        if let Some(orig) = orig_code {
            form.set("origRespCode", orig);
        }
        form
    }

    #[test]
    fn test_query_success_code_maps_to_success() {
        let outcome = normalize_query_outcome(query_response("00", Some("00"))).unwrap();
        assert_eq!(outcome.status, TransactionStatus::Success);
        assert_eq!(outcome.query_id.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_query_in_flight_codes_map_to_pending() {
        for code in IN_FLIGHT_CODES {
            let outcome = normalize_query_outcome(query_response("00", Some(code))).unwrap();
            assert_eq!(outcome.status, TransactionStatus::Pending, "code {code}");
        }
    }

    #[test]
    fn test_query_other_orig_code_maps_to_fail() {
        let outcome = normalize_query_outcome(query_response("00", Some("11"))).unwrap();
        assert_eq!(outcome.status, TransactionStatus::Fail);
    }

    #[test]
    fn test_query_not_found_is_outcome_not_error() {
        let outcome = normalize_query_outcome(query_response("34", None)).unwrap();
        assert_eq!(outcome.status, TransactionStatus::NotFound);
    }

    #[test]
    fn test_query_top_level_failure_is_business_error() {
        let mut raw = query_response("06", None);
        raw.set("respMsg", "system busy");
        let error = normalize_query_outcome(raw).unwrap_err();
        match error {
            GatewayError::Business { code, message } => {
                assert_eq!(code, "06");
                assert_eq!(message, "system busy");
            }
            other => panic!("expected business error, got {other:?}"),
        }
    }

    #[test]
    fn test_query_missing_orig_code_is_protocol_error() {
        let error = normalize_query_outcome(query_response("00", None)).unwrap_err();
        assert!(matches!(error, GatewayError::Protocol(_)));
    }

    #[test]
    fn test_flat_pending_response_end_to_end() {
        let raw = TransactionForm::parse_flat("respCode=00&queryId=Q1&origRespCode=03");
        let outcome = normalize_query_outcome(raw).unwrap();
        assert_eq!(outcome.status, TransactionStatus::Pending);
        assert_eq!(outcome.query_id.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_back_channel_accepts_success_and_in_flight() {
        for code in ["00", "03", "04", "05"] {
            let mut raw = TransactionForm::new();
            raw.set("respCode", code);
            raw.set("queryId", "Q9");
            let ack = normalize_back_channel_ack(raw).unwrap();
            assert_eq!(ack.query_id.as_deref(), Some("Q9"), "code {code}");
        }
    }

    #[test]
    fn test_back_channel_decline_carries_gateway_message() {
        let mut raw = TransactionForm::new();
        raw.set("respCode", "12");
        raw.set("respMsg", "duplicate order");
        let error = normalize_back_channel_ack(raw).unwrap_err();
        match error {
            GatewayError::Business { code, message } => {
                assert_eq!(code, "12");
                assert_eq!(message, "duplicate order");
            }
            other => panic!("expected business error, got {other:?}"),
        }
    }

    #[test]
    fn test_attachment_text_passes_verbatim() {
        let attachment = Attachment::Text("plain note".to_owned());
        assert_eq!(attachment.into_field(), "plain note");
    }

    #[test]
    fn test_attachment_structured_serializes_to_json() {
        let attachment =
            Attachment::Structured(serde_json::json!({"couponId": 7, "source": "app"}));
        let field = attachment.into_field();
        let value: serde_json::Value = serde_json::from_str(&field).unwrap();
        assert_eq!(value["couponId"], 7);
    }
}
