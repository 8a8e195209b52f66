//! # Detached Signatures & the Verification Engine
//!
//! Clients sign the request body with the EdDSA signing procedure and send
//! the signature in a header. The service never checks that signature
//! inline: it hands `{gql, eddsa_signature, eddsa_public_key}` to a
//! [`VerificationEngine`], which evaluates the fixed verification procedure
//! ([`VERIFY_PROCEDURE`]) and prints a JSON document whose first output
//! slot is `"1"` when the signature is authentic.
//!
//! ## Canonical payload
//!
//! Both sides strip every ASCII whitespace byte from the decoded body
//! before signing or verifying, so the JSON may be re-indented in transit
//! without breaking the signature.
//!
//! ## Engines
//!
//! [`Ed25519Engine`] is the built-in engine. Anything that honours the
//! same input/output contract (a sandboxed script runner, a remote
//! service) can be plugged into the authenticator instead.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{WalletKeypair, WalletPublicKey, WalletSignature};
use crate::config::AUTHENTIC_SENTINEL;

/// The verification procedure evaluated for every mutation request.
pub const VERIFY_PROCEDURE: &str = include_str!("verify_graphql.zen");

/// Errors raised by an engine that could not produce a verdict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown verification procedure")]
    UnknownProcedure,

    #[error("malformed engine input: {0}")]
    MalformedInput(String),

    #[error("engine failure: {0}")]
    Failed(String),
}

/// Input document of the verification procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationInput {
    /// Base64 of the raw request body.
    pub gql: String,
    /// Base64 detached signature.
    pub eddsa_signature: String,
    /// Base58 public key of the signer.
    pub eddsa_public_key: String,
}

/// What an engine run produced: its printed output (a JSON document) and
/// a free-form log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRun {
    pub output: String,
    pub logs: String,
}

/// Parsed form of [`EngineRun::output`].
#[derive(Debug, Clone, Deserialize)]
pub struct EngineOutput {
    pub output: Vec<String>,
}

impl EngineOutput {
    /// Whether the procedure's verdict slot holds the truthy sentinel.
    pub fn is_authentic(&self) -> bool {
        self.output.first().map(String::as_str) == Some(AUTHENTIC_SENTINEL)
    }
}

/// A capability that evaluates a verification procedure over an input
/// document.
///
/// Implementations must be pure with respect to the wallet: no caching of
/// verdicts, no side effects visible to the ledger.
pub trait VerificationEngine: Send + Sync + 'static {
    fn execute(&self, procedure: &str, input: &VerificationInput)
        -> Result<EngineRun, EngineError>;
}

/// Strip all ASCII whitespace from a payload.
pub fn canonicalize(payload: &[u8]) -> Vec<u8> {
    payload
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

/// Client side of the protocol: sign the canonical form of `body`.
pub fn sign_payload(keypair: &WalletKeypair, body: &[u8]) -> WalletSignature {
    keypair.sign(&canonicalize(body))
}

/// Check a detached signature over `body` without going through an engine.
pub fn verify_payload(
    public_key: &WalletPublicKey,
    body: &[u8],
    signature: &WalletSignature,
) -> bool {
    public_key.verify(&canonicalize(body), signature)
}

// ---------------------------------------------------------------------------
// Ed25519Engine
// ---------------------------------------------------------------------------

/// Built-in engine evaluating [`VERIFY_PROCEDURE`] with ed25519-dalek.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Engine;

impl VerificationEngine for Ed25519Engine {
    fn execute(
        &self,
        procedure: &str,
        input: &VerificationInput,
    ) -> Result<EngineRun, EngineError> {
        if procedure != VERIFY_PROCEDURE {
            return Err(EngineError::UnknownProcedure);
        }

        let body = BASE64
            .decode(input.gql.trim())
            .map_err(|e| EngineError::MalformedInput(format!("gql: {e}")))?;
        let public_key = WalletPublicKey::from_base58(&input.eddsa_public_key)
            .map_err(|e| EngineError::MalformedInput(e.to_string()))?;
        let signature = WalletSignature::from_base64(&input.eddsa_signature)
            .map_err(|e| EngineError::MalformedInput(e.to_string()))?;

        let authentic = verify_payload(&public_key, &body, &signature);
        let verdict = if authentic { AUTHENTIC_SENTINEL } else { "0" };

        let output = serde_json::json!({ "output": [verdict] }).to_string();
        let logs = format!(
            "[ed25519] procedure={} bytes={} key={} verdict={}",
            procedure.lines().next().unwrap_or_default(),
            body.len(),
            public_key,
            verdict
        );

        Ok(EngineRun { output, logs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_for(kp: &WalletKeypair, body: &[u8], signed: &[u8]) -> VerificationInput {
        VerificationInput {
            gql: BASE64.encode(body),
            eddsa_signature: sign_payload(kp, signed).to_base64(),
            eddsa_public_key: kp.public_key().to_base58(),
        }
    }

    fn verdict(run: &EngineRun) -> bool {
        serde_json::from_str::<EngineOutput>(&run.output)
            .unwrap()
            .is_authentic()
    }

    #[test]
    fn canonicalize_removes_ascii_whitespace() {
        let body = b"{ \"owner\": \"alice\",\n\t\"amount\": 10 }";
        assert_eq!(canonicalize(body), b"{\"owner\":\"alice\",\"amount\":10}".to_vec());
    }

    #[test]
    fn reindented_body_still_verifies() {
        let kp = WalletKeypair::generate();
        let sig = sign_payload(&kp, b"{\"amount\":10}");
        assert!(verify_payload(&kp.public_key(), b"{ \"amount\" : 10 }", &sig));
    }

    #[test]
    fn engine_accepts_authentic_signature() {
        let kp = WalletKeypair::generate();
        let body = br#"{"owner":"alice","token":"idea","amount":100}"#;
        let run = Ed25519Engine
            .execute(VERIFY_PROCEDURE, &input_for(&kp, body, body))
            .unwrap();
        assert!(verdict(&run));
        assert!(run.logs.contains("verdict=1"));
    }

    #[test]
    fn engine_rejects_signature_over_other_body() {
        let kp = WalletKeypair::generate();
        let body = br#"{"owner":"alice","token":"idea","amount":100}"#;
        let other = br#"{"owner":"alice","token":"idea","amount":999}"#;
        let run = Ed25519Engine
            .execute(VERIFY_PROCEDURE, &input_for(&kp, body, other))
            .unwrap();
        assert!(!verdict(&run));
    }

    #[test]
    fn engine_rejects_foreign_key() {
        let signer = WalletKeypair::generate();
        let claimed = WalletKeypair::generate();
        let body = b"{}";
        let mut input = input_for(&signer, body, body);
        input.eddsa_public_key = claimed.public_key().to_base58();
        let run = Ed25519Engine.execute(VERIFY_PROCEDURE, &input).unwrap();
        assert!(!verdict(&run));
    }

    #[test]
    fn engine_errors_on_undecodable_input() {
        let kp = WalletKeypair::generate();
        let mut input = input_for(&kp, b"{}", b"{}");
        input.eddsa_signature = "not base64 at all!".into();
        assert!(matches!(
            Ed25519Engine.execute(VERIFY_PROCEDURE, &input),
            Err(EngineError::MalformedInput(_))
        ));
    }

    #[test]
    fn engine_refuses_other_procedures() {
        let kp = WalletKeypair::generate();
        let input = input_for(&kp, b"{}", b"{}");
        assert_eq!(
            Ed25519Engine.execute("Scenario ecdh: something else", &input),
            Err(EngineError::UnknownProcedure)
        );
    }

    #[test]
    fn empty_output_is_not_authentic() {
        let out = EngineOutput { output: vec![] };
        assert!(!out.is_authentic());
    }
}
