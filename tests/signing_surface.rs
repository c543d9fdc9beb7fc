//! Integration tests over the public signing surface: canonical projection,
//! merchant identity, and the sign/verify round trip as a caller sees them.

use rsa::{
    RsaPrivateKey,
    pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding},
};
use unionpay_gateway::{
    form::TransactionForm,
    gateway::GatewayConfig,
    sign::{FormSigner, verify_form},
    trust::{MerchantIdentity, MerchantProfile},
};

fn merchant_key() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap()
}

#[test]
fn test_order_payload_canonicalization() {
    let mut form = TransactionForm::new();
    form.set("txnAmt", 100u64);
    form.set("orderId", "ORD123");
    form.set("merId", "777290058110097");
    form.set("reqReserved", "");
    form.set("signature", "should-not-appear");

    assert_eq!(
        form.canonical_string(),
        "merId=777290058110097&orderId=ORD123&txnAmt=100"
    );
}

#[test]
fn test_identity_signing_round_trip() {
    let key = merchant_key();
    let private_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
    let public_pem = key.to_public_key().to_public_key_pem(LineEnding::LF).unwrap();

    let identity = MerchantIdentity::from_key_material(
        MerchantProfile {
            mer_id: "777290058110097".to_owned(),
            access_type: "0".to_owned(),
            channel_type: "08".to_owned(),
            currency_code: "156".to_owned(),
        },
        &private_pem,
        &public_pem,
        "65899331",
    )
    .unwrap();

    let signer = FormSigner::for_identity(&identity);
    let mut form = TransactionForm::new();
    form.set("orderId", "ORD123");
    form.set("txnAmt", 100u64);
    form.set("orderDesc", "");
    signer.sign_and_finalize(&mut form);

    // Finalization dropped the empty field and attached the envelope.
    assert_eq!(form.get("orderDesc"), None);
    assert_eq!(form.get("signMethod"), Some("01"));
    assert!(verify_form(&form, &public_pem).unwrap());

    // Any post-signing mutation is detected.
    form.set("txnAmt", 1u64);
    assert!(!verify_form(&form, &public_pem).unwrap());
}

#[test]
fn test_config_surface_rejects_bad_input_early() {
    let mut config: GatewayConfig = serde_json::from_value(serde_json::json!({
        "mer_id": "777290058110097",
        "key_material": { "container": "certs/sign.pfx" },
        "trust": { "root_ca": "certs/root.cer" },
        "callbacks": {
            "consume_notify_url": "https://shop.example.com/notify",
            "consume_return_url": "https://shop.example.com/return"
        }
    }))
    .unwrap();
    config.validate().unwrap();

    config.mer_id = String::new();
    assert!(config.validate().is_err());
}
