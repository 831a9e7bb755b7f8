//! Ed25519 signatures over compliance reports.
//!
//! The signed message is the canonical JSON of the report with its
//! `signature` field removed.

use crate::bal::canonical::to_canonical_string;
use crate::compliance::report::{ComplianceReport, ReportSignature};
use crate::core::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use std::path::Path;

/// Algorithm label attached to signatures.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// Report signing key.
#[derive(Clone)]
pub struct ReportSigner {
    signing_key: SigningKey,
}

impl ReportSigner {
    /// Create a signer with a random key.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        let mut seed = [0u8; 32];
        csprng.fill_bytes(&mut seed);
        Self::from_bytes(&seed)
    }

    /// Create from a 32-byte seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load the seed at `path`, or generate one and save it there.
    ///
    /// A file of any length other than 32 bytes is an error; it is never
    /// overwritten.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            let bytes = std::fs::read(path)?;
            let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                Error::Signature(format!(
                    "key file {} holds {} bytes, expected 32",
                    path.display(),
                    bytes.len()
                ))
            })?;
            tracing::debug!(path = %path.display(), "Loaded report signing key");
            return Ok(Self::from_bytes(&seed));
        }

        let signer = Self::generate();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, signer.signing_key.to_bytes())?;
        tracing::info!(path = %path.display(), "Generated report signing key");
        Ok(signer)
    }

    /// Get the verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hex-encoded verifying key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().to_bytes())
    }

    /// Sign `report`, replacing any signature it already carries.
    pub fn sign(&self, report: &mut ComplianceReport) -> Result<()> {
        let message = signing_message(report)?;
        let signature = self.signing_key.sign(message.as_bytes());

        report.signature = Some(ReportSignature {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            public_key: self.public_key_hex(),
            signature: BASE64.encode(signature.to_bytes()),
        });
        Ok(())
    }
}

/// Check the signature attached to `report` against its embedded public key.
pub fn verify_report(report: &ComplianceReport) -> Result<()> {
    let attached = report
        .signature
        .as_ref()
        .ok_or_else(|| Error::Signature("report is not signed".to_string()))?;

    if attached.algorithm != SIGNATURE_ALGORITHM {
        return Err(Error::Signature(format!(
            "unsupported algorithm: {}",
            attached.algorithm
        )));
    }

    let key_bytes: [u8; 32] = hex::decode(&attached.public_key)
        .map_err(|e| Error::Signature(format!("public key is not hex: {e}")))?
        .try_into()
        .map_err(|_| Error::Signature("public key must be 32 bytes".to_string()))?;
    let public_key = VerifyingKey::from_bytes(&key_bytes)?;

    let sig_bytes: [u8; 64] = BASE64
        .decode(&attached.signature)
        .map_err(|e| Error::Signature(format!("signature is not base64: {e}")))?
        .try_into()
        .map_err(|_| Error::Signature("signature must be 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    let message = signing_message(report)?;
    public_key.verify(message.as_bytes(), &signature)?;
    Ok(())
}

fn signing_message(report: &ComplianceReport) -> Result<String> {
    let mut value = serde_json::to_value(report)?;
    if let Some(fields) = value.as_object_mut() {
        fields.remove("signature");
    }
    Ok(to_canonical_string(&value))
}
