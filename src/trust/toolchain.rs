//! External cryptographic toolchain: the `openssl` CLI behind a structured
//! success/failure interface.
//!
//! Four primitives are exposed: extract an X.509 bundle from a
//! password-protected PKCS#12 container, extract a public or private key
//! from that bundle, read a certificate serial number, and validate a
//! certificate chain. Success is decided by process exit status (plus an
//! exact-prefix parse where a value is read back), never by scanning free
//! text for "OK": ambiguous output is failure.

use std::{
    ffi::OsString,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};

use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::{
    error::{GatewayError, Result},
    trust::{CertSource, TrustAnchors},
};

/// Which half of the key pair to extract from an X.509 bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// The RSA public key, in SPKI PEM form.
    Public,
    /// The RSA private key.
    Private,
}

/// Invokes the `openssl` CLI as an external toolchain collaborator.
///
/// Certificates and keys supplied as in-memory PEM are materialized to
/// scratch files only for the duration of the call; filesystem paths are
/// passed through untouched.
///
/// All invocations are non-interactive: a passphrase (possibly empty) is
/// always supplied on the command line so a malformed container fails
/// instead of blocking on a prompt.
#[derive(Debug, Clone)]
pub struct OpensslToolchain {
    program: PathBuf,
}

impl Default for OpensslToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl OpensslToolchain {
    /// Creates a toolchain that resolves `openssl` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self { program: PathBuf::from("openssl") }
    }

    /// Creates a toolchain invoking a specific `openssl` binary.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Extracts the X.509 bundle (certificate + unencrypted key) from a
    /// PKCS#12 key container, returning it as PEM text.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::KeyExtraction`] if the toolchain rejects the
    /// container or passphrase, [`GatewayError::Io`] if it cannot be spawned.
    #[instrument(skip(self, container, passphrase))]
    pub async fn x509_from_pkcs12(
        &self,
        container: &CertSource,
        passphrase: Option<&str>,
    ) -> Result<String> {
        let input = materialize(container)?;
        let output_file = NamedTempFile::new()?;

        let mut args: Vec<OsString> = vec![
            "pkcs12".into(),
            "-in".into(),
            input.path().into(),
            "-nodes".into(),
            "-out".into(),
            output_file.path().into(),
            "-passin".into(),
        ];
        args.push(format!("pass:{}", passphrase.unwrap_or_default()).into());

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(GatewayError::KeyExtraction(format!(
                "pkcs12 extraction failed: {}",
                stderr_excerpt(&output.stderr)
            )));
        }

        let pem = tokio::fs::read_to_string(output_file.path()).await?;
        if pem.trim().is_empty() {
            return Err(GatewayError::KeyExtraction(
                "pkcs12 extraction produced no output".to_owned(),
            ));
        }
        Ok(pem)
    }

    /// Extracts one half of the RSA key pair from an X.509 PEM bundle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::KeyExtraction`] if no usable key is produced.
    #[instrument(skip(self, bundle))]
    pub async fn key_from_x509(&self, bundle: &CertSource, kind: KeyKind) -> Result<String> {
        let input = materialize(bundle)?;
        let output_file = NamedTempFile::new()?;

        let mut args: Vec<OsString> = vec![
            "rsa".into(),
            "-in".into(),
            input.path().into(),
            "-out".into(),
            output_file.path().into(),
        ];
        if kind == KeyKind::Public {
            args.push("-pubout".into());
        }

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(GatewayError::KeyExtraction(format!(
                "key extraction failed: {}",
                stderr_excerpt(&output.stderr)
            )));
        }

        let pem = tokio::fs::read_to_string(output_file.path()).await?;
        if pem.trim().is_empty() {
            return Err(GatewayError::KeyExtraction("key extraction produced no key".to_owned()));
        }
        Ok(pem)
    }

    /// Reads the serial number of a certificate, as the toolchain reports it:
    /// an uppercase hexadecimal string.
    ///
    /// Only an exact `serial=` line on stdout is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::KeyExtraction`] if the serial cannot be read.
    #[instrument(skip(self, certificate))]
    pub async fn serial_from_x509(&self, certificate: &CertSource) -> Result<String> {
        let input = materialize(certificate)?;

        let args: Vec<OsString> =
            vec!["x509".into(), "-in".into(), input.path().into(), "-serial".into(), "-noout".into()];

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(GatewayError::KeyExtraction(format!(
                "serial read failed: {}",
                stderr_excerpt(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find_map(|line| line.trim().strip_prefix("serial="))
            .map(|serial| serial.trim().to_owned())
            .filter(|serial| !serial.is_empty())
            .ok_or_else(|| {
                GatewayError::KeyExtraction("toolchain reported no serial number".to_owned())
            })
    }

    /// Validates `leaf` against the trust anchors: root as the CA file,
    /// intermediates as untrusted-but-permitted path members.
    ///
    /// Success is the toolchain's exit status and nothing else; any failure
    /// or ambiguity validates as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] only when the toolchain cannot be
    /// spawned or scratch files cannot be written.
    #[instrument(skip(self, leaf, anchors))]
    pub async fn verify_chain(&self, leaf: &CertSource, anchors: &TrustAnchors) -> Result<bool> {
        let leaf_file = materialize(leaf)?;
        let root_file = materialize(anchors.root())?;

        let mut intermediate_files = Vec::with_capacity(anchors.intermediates().len());
        for intermediate in anchors.intermediates() {
            intermediate_files.push(materialize(intermediate)?);
        }

        let mut args: Vec<OsString> =
            vec!["verify".into(), "-CAfile".into(), root_file.path().into()];
        for intermediate in &intermediate_files {
            args.push("-untrusted".into());
            args.push(intermediate.path().into());
        }
        args.push(leaf_file.path().into());

        let output = self.run(&args).await?;
        let verified = output.status.success();
        if verified {
            debug!("certificate chain validated");
        } else {
            warn!(stderr = %stderr_excerpt(&output.stderr), "certificate chain validation failed");
        }
        Ok(verified)
    }

    async fn run(&self, args: &[OsString]) -> Result<std::process::Output> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }
}

/// Normalizes a hexadecimal serial number to the decimal string the gateway
/// expects as `certId`.
///
/// # Errors
///
/// Returns [`GatewayError::KeyExtraction`] if `hex` is not hexadecimal.
///
/// # Examples
///
/// ```
/// use unionpay_gateway::trust::serial_hex_to_decimal;
///
/// assert_eq!(serial_hex_to_decimal("03ED8B43").unwrap(), "65899331");
/// ```
pub fn serial_hex_to_decimal(hex: &str) -> Result<String> {
    let trimmed = hex.trim().trim_start_matches("0x").trim_start_matches("0X");
    rsa::BigUint::parse_bytes(trimmed.as_bytes(), 16)
        .map(|serial| serial.to_str_radix(10))
        .ok_or_else(|| {
            GatewayError::KeyExtraction(format!("serial number is not hexadecimal: {hex}"))
        })
}

/// A certificate source made usable as a filesystem path.
///
/// In-memory PEM lands in a scratch file that lives as long as this value.
enum Scratch {
    Borrowed(PathBuf),
    Owned(NamedTempFile),
}

impl Scratch {
    fn path(&self) -> &Path {
        match self {
            Self::Borrowed(path) => path,
            Self::Owned(file) => file.path(),
        }
    }
}

fn materialize(source: &CertSource) -> Result<Scratch> {
    match source {
        CertSource::Path(path) => Ok(Scratch::Borrowed(path.clone())),
        CertSource::Pem(pem) => {
            let mut file = NamedTempFile::new()?;
            file.write_all(pem.as_bytes())?;
            file.flush()?;
            Ok(Scratch::Owned(file))
        }
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "(no diagnostic output)".to_owned()
    } else {
        trimmed.lines().next().unwrap_or(trimmed).to_owned()
    }
}
