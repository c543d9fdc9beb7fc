//! Canonical form codec: the deterministic string/hash projection every
//! signature in this crate is computed over.
//!
//! A [`TransactionForm`] is an ordered mapping of field name to scalar value.
//! Its canonical string is the byte-order-sorted, `&`-joined `name=value`
//! rendering with the `signature` field and all empty values excluded. The
//! SHA-256 hex digest of that string is the sole input to signing and
//! verification, so the projection here must be byte-exact and locale
//! independent.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use sha2::{Digest, Sha256};

/// Field carrying the detached signature; never part of its own digest.
pub const SIGNATURE_FIELD: &str = "signature";

/// Characters escaped when a value would collide with the field separator.
///
/// `%` is included so escaped values stay unambiguous.
const SEPARATOR_ESCAPES: &AsciiSet = &CONTROLS.add(b'&').add(b'%').add(b'=');

/// An ordered mapping of field name to scalar value, representing one
/// request or response payload.
///
/// Backed by a [`BTreeMap`], so iteration is always in byte order of the
/// field names: plain `u8` comparison, not locale collation. Field names
/// are unique by construction; inserting an existing name overwrites.
///
/// # Examples
///
/// ```
/// use unionpay_gateway::form::TransactionForm;
///
/// let mut form = TransactionForm::new();
/// form.set("orderId", "ORD123");
/// form.set("txnAmt", 100u64);
/// form.set("orderDesc", "");
///
/// // Empty values and the signature field never reach the canonical string.
/// assert_eq!(form.canonical_string(), "orderId=ORD123&txnAmt=100");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionForm {
    fields: BTreeMap<String, String>,
}

impl TransactionForm {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: BTreeMap::new() }
    }

    /// Sets a field, overwriting any existing value under the same name.
    ///
    /// Accepts anything with a display form, so both strings and numbers
    /// land as the scalar text the gateway expects.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        self.fields.insert(name.into(), value.to_string());
    }

    /// Sets a field only when a value is present.
    pub fn set_opt(&mut self, name: impl Into<String>, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    /// Returns the value of `name`, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Number of fields currently set, empty-valued ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in byte order of their names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrows the underlying field mapping, e.g. for transport encoding.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Drops every field whose value is the empty string.
    ///
    /// A present-but-empty field has no meaning to the gateway and must not
    /// enter the signed digest.
    pub fn strip_empty(&mut self) {
        self.fields.retain(|_, v| !v.is_empty());
    }

    /// Percent-escapes any remaining value containing the `&` separator.
    ///
    /// Applied once, during sign-and-finalize; values without the separator
    /// pass through untouched.
    pub fn escape_separators(&mut self) {
        for value in self.fields.values_mut() {
            if value.contains('&') {
                *value = utf8_percent_encode(value, SEPARATOR_ESCAPES).to_string();
            }
        }
    }

    /// Renders the canonical `name=value&name=value` string.
    ///
    /// Field names in ascending byte order; the `signature` field and fields
    /// with empty values are excluded regardless of position.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            if name != SIGNATURE_FIELD && !value.is_empty() {
                parts.push(format!("{name}={value}"));
            }
        }
        parts.join("&")
    }

    /// Lowercase hex SHA-256 of the canonical string's UTF-8 bytes.
    ///
    /// This hex STRING (not the raw digest bytes) is what the RSA signature
    /// is computed over; both sides of the wire must agree on that exactly.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        let digest = Sha256::digest(self.canonical_string().as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }

    /// Parses a flat `key=value&key=value` response body into a form.
    ///
    /// Values may contain `=` (only the first one splits); pairs without a
    /// `=` and pairs with an empty key are skipped; a repeated key keeps the
    /// last value.
    ///
    /// # Examples
    ///
    /// ```
    /// use unionpay_gateway::form::TransactionForm;
    ///
    /// let form = TransactionForm::parse_flat("respCode=00&queryId=Q1&origRespCode=03");
    /// assert_eq!(form.len(), 3);
    /// assert_eq!(form.get("queryId"), Some("Q1"));
    /// ```
    #[must_use]
    pub fn parse_flat(body: &str) -> Self {
        let mut fields = BTreeMap::new();
        for pair in body.split('&') {
            if let Some((name, value)) = pair.split_once('=')
                && !name.is_empty()
            {
                fields.insert(name.to_owned(), value.to_owned());
            }
        }
        Self { fields }
    }
}

impl From<BTreeMap<String, String>> for TransactionForm {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, String)> for TransactionForm {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests;
