//! Integration tests for the openssl toolchain collaborator.
//!
//! These exercise the same external CLI the production client uses: a
//! throwaway CA and a PKCS#12 merchant container are generated on the fly,
//! then extraction, serial normalization, and chain validation run against
//! real toolchain output.

use std::path::Path;

use tokio::process::Command;
use unionpay_gateway::trust::{
    CertSource, KeyKind, MerchantIdentity, MerchantProfile, OpensslToolchain, TrustAnchors,
    serial_hex_to_decimal,
};

async fn openssl(args: &[&str], dir: &Path) {
    let output = Command::new("openssl")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .expect("openssl CLI is available");
    assert!(
        output.status.success(),
        "openssl {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// CA + leaf certificate + PKCS#12 container holding the leaf.
async fn provision(dir: &Path, passphrase: &str) {
    openssl(
        &[
            "req", "-x509", "-newkey", "rsa:2048", "-nodes", "-keyout", "ca.key", "-out",
            "ca.pem", "-days", "3650", "-subj", "/CN=ToolchainTestRoot",
        ],
        dir,
    )
    .await;
    openssl(
        &[
            "req", "-newkey", "rsa:2048", "-nodes", "-keyout", "leaf.key", "-out", "leaf.csr",
            "-subj", "/CN=ToolchainTestLeaf",
        ],
        dir,
    )
    .await;
    openssl(
        &[
            "x509", "-req", "-in", "leaf.csr", "-CA", "ca.pem", "-CAkey", "ca.key",
            "-CAcreateserial", "-out", "leaf.pem", "-days", "3650",
        ],
        dir,
    )
    .await;
    openssl(
        &[
            "pkcs12", "-export", "-inkey", "leaf.key", "-in", "leaf.pem", "-out", "leaf.p12",
            "-passout", &format!("pass:{passphrase}"),
        ],
        dir,
    )
    .await;
}

#[tokio::test]
async fn test_pkcs12_extraction_yields_keys_and_serial() {
    let dir = tempfile::tempdir().unwrap();
    provision(dir.path(), "000000").await;
    let toolchain = OpensslToolchain::new();

    let container = CertSource::Path(dir.path().join("leaf.p12"));
    let bundle = toolchain.x509_from_pkcs12(&container, Some("000000")).await.unwrap();
    assert!(bundle.contains("BEGIN CERTIFICATE"));

    let bundle = CertSource::Pem(bundle);
    let private_pem = toolchain.key_from_x509(&bundle, KeyKind::Private).await.unwrap();
    assert!(private_pem.contains("PRIVATE KEY"));

    let public_pem = toolchain.key_from_x509(&bundle, KeyKind::Public).await.unwrap();
    assert!(public_pem.contains("BEGIN PUBLIC KEY"));

    let serial_hex = toolchain.serial_from_x509(&bundle).await.unwrap();
    let cert_id = serial_hex_to_decimal(&serial_hex).unwrap();
    assert!(!cert_id.is_empty());
    assert!(cert_id.bytes().all(|b| b.is_ascii_digit()), "certId must be decimal: {cert_id}");
}

#[tokio::test]
async fn test_pkcs12_extraction_with_wrong_passphrase_fails() {
    let dir = tempfile::tempdir().unwrap();
    provision(dir.path(), "000000").await;
    let toolchain = OpensslToolchain::new();

    let container = CertSource::Path(dir.path().join("leaf.p12"));
    let result = toolchain.x509_from_pkcs12(&container, Some("wrong")).await;
    assert!(result.is_err(), "wrong passphrase must fail, not prompt");
}

#[tokio::test]
async fn test_chain_validates_against_issuing_root_only() {
    let dir = tempfile::tempdir().unwrap();
    provision(dir.path(), "000000").await;
    let other_dir = tempfile::tempdir().unwrap();
    provision(other_dir.path(), "000000").await;
    let toolchain = OpensslToolchain::new();

    let leaf = CertSource::Path(dir.path().join("leaf.pem"));
    let issuing = TrustAnchors::new(CertSource::Path(dir.path().join("ca.pem")), Vec::new());
    let foreign =
        TrustAnchors::new(CertSource::Path(other_dir.path().join("ca.pem")), Vec::new());

    assert!(toolchain.verify_chain(&leaf, &issuing).await.unwrap());
    assert!(!toolchain.verify_chain(&leaf, &foreign).await.unwrap());
}

#[tokio::test]
async fn test_chain_accepts_in_memory_pem_anchors() {
    let dir = tempfile::tempdir().unwrap();
    provision(dir.path(), "000000").await;
    let toolchain = OpensslToolchain::new();

    let leaf_pem = std::fs::read_to_string(dir.path().join("leaf.pem")).unwrap();
    let ca_pem = std::fs::read_to_string(dir.path().join("ca.pem")).unwrap();

    let verified = toolchain
        .verify_chain(
            &CertSource::Pem(leaf_pem),
            &TrustAnchors::new(CertSource::Pem(ca_pem), Vec::new()),
        )
        .await
        .unwrap();
    assert!(verified);
}

#[tokio::test]
async fn test_merchant_identity_from_pkcs12() {
    let dir = tempfile::tempdir().unwrap();
    provision(dir.path(), "secret").await;

    let profile = MerchantProfile {
        mer_id: "777290058110097".to_owned(),
        access_type: "0".to_owned(),
        channel_type: "08".to_owned(),
        currency_code: "156".to_owned(),
    };
    let identity = MerchantIdentity::from_pkcs12(
        profile,
        &CertSource::Path(dir.path().join("leaf.p12")),
        Some("secret"),
        &OpensslToolchain::new(),
    )
    .await
    .unwrap();

    assert_eq!(identity.mer_id(), "777290058110097");
    assert!(identity.cert_id().bytes().all(|b| b.is_ascii_digit()));
}
