use super::*;


#[test]
fn test_canonical_string_sorted_by_byte_order() {
    let mut form = TransactionForm::new();
    form.set("txnAmt", "100");
    form.set("orderId", "ORD123");
    form.set("Zeta", "z");
    form.set("alpha", "a");

    // Uppercase sorts before lowercase under plain byte comparison.
    assert_eq!(form.canonical_string(), "Zeta=z&alpha=a&orderId=ORD123&txnAmt=100");
}

#[test]
fn test_canonical_string_drops_empty_values() {
    let mut form = TransactionForm::new();
    form.set("orderId", "ORD123");
    form.set("orderDesc", "");

    assert_eq!(form.canonical_string(), "orderId=ORD123");
    // The empty field is still present on the form itself.
    assert_eq!(form.len(), 2);
}

#[test]
fn test_canonical_string_excludes_signature_even_when_set() {
    let mut form = TransactionForm::new();
    form.set("orderId", "ORD123");
    form.set(SIGNATURE_FIELD, "ZmFrZXNpZ24=");

    assert_eq!(form.canonical_string(), "orderId=ORD123");
    assert_eq!(
        form.digest_hex(),
        {
            let mut without = TransactionForm::new();
            without.set("orderId", "ORD123");
            without.digest_hex()
        },
        "signature field must never enter its own digest"
    );
}

#[test]
fn test_digest_hex_is_sha256_of_canonical_string() {
    let mut form = TransactionForm::new();
    form.set("a", "1");
    form.set("b", "2");

    // SHA-256 of "a=1&b=2".
    let digest = sha2::Sha256::digest(b"a=1&b=2");
    let expected: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(form.digest_hex(), expected);
}

#[test]
fn test_set_overwrites_existing_field() {
    let mut form = TransactionForm::new();
    form.set("orderId", "first");
    form.set("orderId", "second");

    assert_eq!(form.len(), 1);
    assert_eq!(form.get("orderId"), Some("second"));
}

#[test]
fn test_set_accepts_numbers() {
    let mut form = TransactionForm::new();
    form.set("txnAmt", 100u64);
    assert_eq!(form.get("txnAmt"), Some("100"));
}

#[test]
fn test_strip_empty_removes_only_empty_fields() {
    let mut form = TransactionForm::new();
    form.set("keep", "v");
    form.set("drop", "");
    form.strip_empty();

    assert_eq!(form.len(), 1);
    assert_eq!(form.get("drop"), None);
}

#[test]
fn test_escape_separators_only_touches_values_with_ampersand() {
    let mut form = TransactionForm::new();
    form.set("plain", "no separator here");
    form.set("tricky", "a&b=c%d");
    form.escape_separators();

    assert_eq!(form.get("plain"), Some("no separator here"));
    assert_eq!(form.get("tricky"), Some("a%26b%3Dc%25d"));
}

#[test]
fn test_parse_flat_splits_on_first_equals() {
    let form = TransactionForm::parse_flat("respCode=00&queryId=Q1&origRespCode=03");
    assert_eq!(form.len(), 3);
    assert_eq!(form.get("respCode"), Some("00"));
    assert_eq!(form.get("queryId"), Some("Q1"));
    assert_eq!(form.get("origRespCode"), Some("03"));

    // Values may themselves contain '=' (base64 padding in embedded certs).
    let form = TransactionForm::parse_flat("sig=AbCd==&respCode=00");
    assert_eq!(form.get("sig"), Some("AbCd=="));
}

#[test]
fn test_parse_flat_skips_malformed_pairs() {
    let form = TransactionForm::parse_flat("respCode=00&&novalue&=orphan");
    assert_eq!(form.len(), 1);
    assert_eq!(form.get("respCode"), Some("00"));
}

#[test]
fn test_parse_flat_last_duplicate_wins() {
    let form = TransactionForm::parse_flat("k=first&k=second");
    assert_eq!(form.get("k"), Some("second"));
}
