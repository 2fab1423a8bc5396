// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verifiable Presentation construction and verification.
//!
//! A VP is a compact three-part token,
//! `base64url(header).base64url(payload).base64url(signature)`, whose
//! signature is the holder wallet's EIP-191 signature over the
//! `header.payload` text (the wallet's native scheme, not the gateway's
//! JWT key). Embedded Verifiable Credentials are compact tokens of the same
//! shape, each signed by its *issuer* over `keccak256(header.payload)`.
//!
//! Building happens in two phases: [`VpEngine::prepare_signing`] returns the
//! exact signing-input string for the client wallet, and
//! [`VpEngine::assemble`] attaches the returned signature. Verification
//! reuses the original base64url text verbatim as the signing input; decoded
//! JSON is only ever used for field access. Re-serializing it would not be
//! byte-stable across key ordering or whitespace, and would produce false
//! negatives.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::signature::{self, SignatureError};

/// Presentations live for one hour.
pub const VP_TTL: Duration = Duration::from_secs(3_600);

/// Sentinel bound to sessions that carry no presentation.
pub const EMPTY_VP: &str = "EMPTY";

/// Recoverable secp256k1 over Keccak-256, the wallet ecosystem's JWT alg id.
const VP_ALGORITHM: &str = "ES256K-R";

const W3C_CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

#[derive(Debug, Serialize, Deserialize)]
struct VpHeader {
    alg: String,
    typ: String,
}

/// VP payload following the W3C data model, carried as JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpPayload {
    /// Holder DID; the outer signature must recover to this address.
    pub iss: String,
    pub aud: String,
    pub nbf: i64,
    pub exp: i64,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub vp: VpBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpBody {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub holder: String,
    #[serde(rename = "verifiableCredential")]
    pub verifiable_credential: Vec<String>,
}

/// Only the issuer is needed from an embedded credential's payload.
#[derive(Debug, Deserialize)]
struct VcClaims {
    iss: String,
}

/// Material the client wallet must sign to complete a presentation.
#[derive(Debug, Clone)]
pub struct VpSigningMaterial {
    pub payload: VpPayload,
    /// The exact `base64url(header).base64url(payload)` text to sign.
    /// Verification later reuses this same text; clients must return it
    /// unmodified alongside the signature.
    pub signing_input: String,
}

#[derive(Debug, Error)]
pub enum VpError {
    #[error("malformed presentation: {0}")]
    Malformed(String),
    #[error("unsupported presentation algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("presentation has expired")]
    Expired,
    #[error("holder signature does not recover to {expected}")]
    HolderSignatureMismatch { expected: String },
    #[error("credential signature does not recover to its issuer {expected}")]
    IssuerSignatureMismatch { expected: String },
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Per-credential verification outcome, kept for the failure details list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VcCheck {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a full presentation verification.
///
/// `verified` is all-or-nothing: the holder signature and every embedded
/// credential must check out.
#[derive(Debug, Clone)]
pub struct VpVerification {
    pub verified: bool,
    /// Holder DID, present when the outer token parsed and recovered.
    pub holder: Option<String>,
    pub vcs: Vec<VcCheck>,
    pub error: Option<String>,
}

/// Verification seam used by the session guard.
///
/// Concretely implemented by [`VpEngine`]; tests substitute counting
/// wrappers to observe the cache fast path.
pub trait PresentationVerifier: Send + Sync {
    fn verify_vp(&self, vp_jwt: &str) -> VpVerification;
}

/// Builds and verifies presentations for one DID method/network.
pub struct VpEngine {
    did_prefix: String,
    audience: String,
}

impl VpEngine {
    pub fn new(did_prefix: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            did_prefix: did_prefix.into(),
            audience: audience.into(),
        }
    }

    /// DID for a wallet address, e.g. `did:ethr:besu:0xabc...`.
    pub fn did(&self, address: &str) -> String {
        format!("{}:{}", self.did_prefix, address)
    }

    /// The address component of a DID (everything after the last `:`).
    pub fn address_of_did(did: &str) -> &str {
        did.rsplit(':').next().unwrap_or(did)
    }

    /// Phase 1: build the unsigned payload and its signing input.
    pub fn prepare_signing(
        &self,
        holder_address: &str,
        vc_jwts: Vec<String>,
        purpose: Option<String>,
    ) -> Result<VpSigningMaterial, VpError> {
        let now = chrono::Utc::now().timestamp();
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let did = self.did(holder_address);
        let header = VpHeader {
            alg: VP_ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let payload = VpPayload {
            iss: did.clone(),
            aud: self.audience.clone(),
            nbf: now,
            exp: now + VP_TTL.as_secs() as i64,
            nonce: hex::encode(nonce),
            purpose,
            vp: VpBody {
                context: vec![W3C_CREDENTIALS_CONTEXT.to_string()],
                types: vec!["VerifiablePresentation".to_string()],
                holder: did,
                verifiable_credential: vc_jwts,
            },
        };

        let signing_input = format!("{}.{}", encode_json(&header)?, encode_json(&payload)?);

        Ok(VpSigningMaterial {
            payload,
            signing_input,
        })
    }

    /// Phase 2: verify the holder's signature over `signed_data` (the exact
    /// signing input from phase 1) and append it to form the compact VP.
    pub fn assemble(&self, signed_data: &str, signature_hex: &str) -> Result<String, VpError> {
        let (header_b64, payload_b64) = signed_data
            .split_once('.')
            .ok_or_else(|| VpError::Malformed("signing input is not header.payload".into()))?;
        if payload_b64.contains('.') {
            return Err(VpError::Malformed("signing input has too many parts".into()));
        }

        let header: VpHeader = decode_json(header_b64)?;
        if header.alg != VP_ALGORITHM {
            return Err(VpError::UnsupportedAlgorithm(header.alg));
        }

        let payload: VpPayload = decode_json(payload_b64)?;
        let holder_address = Self::address_of_did(&payload.iss);

        let recovered = signature::recover_personal(signed_data, signature_hex)?;
        if !recovered.eq_ignore_ascii_case(holder_address) {
            return Err(VpError::HolderSignatureMismatch {
                expected: holder_address.to_string(),
            });
        }

        let sig_bytes = hex::decode(signature_hex.trim_start_matches("0x"))
            .map_err(|e| VpError::Malformed(format!("signature hex: {e}")))?;
        if sig_bytes.len() != 65 {
            return Err(VpError::Malformed(format!(
                "signature must be 65 bytes, got {}",
                sig_bytes.len()
            )));
        }

        Ok(format!(
            "{signed_data}.{}",
            URL_SAFE_NO_PAD.encode(sig_bytes)
        ))
    }

    /// Verify one embedded credential, returning its issuer DID.
    pub fn verify_credential(&self, vc_jwt: &str) -> Result<String, VpError> {
        let (header_b64, payload_b64, signature_b64) = split_compact(vc_jwt)?;
        // The issuer signed these exact bytes.
        let signing_input = &vc_jwt[..header_b64.len() + 1 + payload_b64.len()];

        let claims: VcClaims = decode_json(payload_b64)?;
        let issuer_address = Self::address_of_did(&claims.iss).to_string();

        let sig_hex = signature_hex_from_b64(signature_b64)?;
        let digest = signature::keccak256(signing_input.as_bytes());
        let recovered = signature::recover_digest(&digest, &sig_hex)?;

        if !recovered.eq_ignore_ascii_case(&issuer_address) {
            return Err(VpError::IssuerSignatureMismatch {
                expected: issuer_address,
            });
        }

        Ok(claims.iss)
    }

    fn check_presentation(&self, vp_jwt: &str) -> Result<(String, Vec<VcCheck>), VpError> {
        let (header_b64, payload_b64, signature_b64) = split_compact(vp_jwt)?;
        // Holder signed these exact bytes; never rebuild them from JSON.
        let signing_input = &vp_jwt[..header_b64.len() + 1 + payload_b64.len()];

        let header: VpHeader = decode_json(header_b64)?;
        if header.alg != VP_ALGORITHM {
            return Err(VpError::UnsupportedAlgorithm(header.alg));
        }

        let payload: VpPayload = decode_json(payload_b64)?;
        if payload.exp < chrono::Utc::now().timestamp() {
            return Err(VpError::Expired);
        }

        let sig_hex = signature_hex_from_b64(signature_b64)?;
        let recovered = signature::recover_personal(signing_input, &sig_hex)?;
        let holder_address = Self::address_of_did(&payload.iss);
        if !recovered.eq_ignore_ascii_case(holder_address) {
            return Err(VpError::HolderSignatureMismatch {
                expected: holder_address.to_string(),
            });
        }

        let vcs = payload
            .vp
            .verifiable_credential
            .iter()
            .enumerate()
            .map(|(index, vc_jwt)| match self.verify_credential(vc_jwt) {
                Ok(issuer) => VcCheck {
                    index,
                    issuer: Some(issuer),
                    verified: true,
                    error: None,
                },
                Err(e) => VcCheck {
                    index,
                    issuer: None,
                    verified: false,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        Ok((payload.iss, vcs))
    }
}

impl PresentationVerifier for VpEngine {
    fn verify_vp(&self, vp_jwt: &str) -> VpVerification {
        match self.check_presentation(vp_jwt) {
            Ok((holder, vcs)) => {
                let all_verified = vcs.iter().all(|check| check.verified);
                VpVerification {
                    verified: all_verified,
                    holder: Some(holder),
                    error: (!all_verified)
                        .then(|| "one or more embedded credentials failed verification".to_string()),
                    vcs,
                }
            }
            Err(e) => VpVerification {
                verified: false,
                holder: None,
                vcs: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, VpError> {
    let json = serde_json::to_vec(value).map_err(|e| VpError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_json<T: serde::de::DeserializeOwned>(part: &str) -> Result<T, VpError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| VpError::Malformed(format!("base64url: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| VpError::Malformed(format!("json: {e}")))
}

fn split_compact(token: &str) -> Result<(&str, &str, &str), VpError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
            Ok((h, p, s))
        }
        _ => Err(VpError::Malformed(
            "token must have exactly three non-empty parts".into(),
        )),
    }
}

fn signature_hex_from_b64(part: &str) -> Result<String, VpError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| VpError::Malformed(format!("signature base64url: {e}")))?;
    if bytes.len() != 65 {
        return Err(VpError::Malformed(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::keccak256;
    use k256::ecdsa::SigningKey;

    const DID_PREFIX: &str = "did:ethr:besu";
    const AUDIENCE: &str = "http://localhost:8080";

    fn engine() -> VpEngine {
        VpEngine::new(DID_PREFIX, AUDIENCE)
    }

    fn wallet() -> (SigningKey, String) {
        let key = SigningKey::random(&mut OsRng);
        let point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        (key, format!("0x{}", hex::encode(&hash[12..])))
    }

    fn sign_hex(key: &SigningKey, digest: &[u8; 32]) -> String {
        let (signature, recovery_id) = key.sign_prehash_recoverable(digest).expect("sign");
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    fn sign_personal(key: &SigningKey, message: &str) -> String {
        let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
        sign_hex(key, &keccak256(prefixed.as_bytes()))
    }

    /// Issue a credential the way the issuance service does: raw recoverable
    /// signature over keccak256(header.payload).
    fn make_vc(issuer_key: &SigningKey, issuer_address: &str, subject_did: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256K-R","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"iss":"{DID_PREFIX}:{issuer_address}","sub":"{subject_did}","vc":{{"type":["VerifiableCredential","PetOwnership"]}}}}"#
        ));
        let signing_input = format!("{header}.{payload}");
        let sig_hex = sign_hex(issuer_key, &keccak256(signing_input.as_bytes()));
        let sig_bytes = hex::decode(sig_hex.trim_start_matches("0x")).unwrap();
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig_bytes))
    }

    fn build_vp(holder_key: &SigningKey, holder_address: &str, vcs: Vec<String>) -> String {
        let engine = engine();
        let material = engine
            .prepare_signing(holder_address, vcs, Some("authentication".to_string()))
            .unwrap();
        let signature = sign_personal(holder_key, &material.signing_input);
        engine.assemble(&material.signing_input, &signature).unwrap()
    }

    #[test]
    fn prepare_signing_sets_window_and_holder() {
        let material = engine()
            .prepare_signing("0xabc", vec![], None)
            .unwrap();

        assert_eq!(material.payload.iss, "did:ethr:besu:0xabc");
        assert_eq!(material.payload.vp.holder, "did:ethr:besu:0xabc");
        assert_eq!(material.payload.aud, AUDIENCE);
        assert_eq!(
            material.payload.exp - material.payload.nbf,
            VP_TTL.as_secs() as i64
        );
        assert_eq!(material.signing_input.matches('.').count(), 1);
    }

    #[test]
    fn empty_presentation_roundtrip() {
        let (key, address) = wallet();
        let vp_jwt = build_vp(&key, &address, vec![]);

        let result = engine().verify_vp(&vp_jwt);
        assert!(result.verified, "error: {:?}", result.error);
        assert_eq!(result.holder.unwrap(), format!("{DID_PREFIX}:{address}"));
        assert!(result.vcs.is_empty());
    }

    #[test]
    fn presentation_with_credentials_verifies_each_issuer() {
        let (holder_key, holder_address) = wallet();
        let (issuer_key, issuer_address) = wallet();
        let subject = format!("{DID_PREFIX}:{holder_address}");

        let vcs = vec![
            make_vc(&issuer_key, &issuer_address, &subject),
            make_vc(&issuer_key, &issuer_address, &subject),
        ];
        let vp_jwt = build_vp(&holder_key, &holder_address, vcs);

        let result = engine().verify_vp(&vp_jwt);
        assert!(result.verified, "error: {:?}", result.error);
        assert_eq!(result.vcs.len(), 2);
        assert!(result.vcs.iter().all(|c| c.verified));
        assert_eq!(
            result.vcs[0].issuer.as_deref(),
            Some(format!("{DID_PREFIX}:{issuer_address}").as_str())
        );
    }

    #[test]
    fn one_tampered_credential_invalidates_the_presentation() {
        let (holder_key, holder_address) = wallet();
        let (issuer_key, issuer_address) = wallet();
        let subject = format!("{DID_PREFIX}:{holder_address}");

        let mut vcs = vec![
            make_vc(&issuer_key, &issuer_address, &subject),
            make_vc(&issuer_key, &issuer_address, &subject),
            make_vc(&issuer_key, &issuer_address, &subject),
        ];
        // Claim a different issuer without re-signing: the signature no
        // longer recovers to the claimed iss.
        let (other_key, other_address) = wallet();
        let forged = {
            let real = make_vc(&other_key, &other_address, &subject);
            let (_, _, sig) = split_compact(&real).unwrap();
            let (h, p, _) = split_compact(&vcs[0]).unwrap();
            format!("{h}.{p}.{sig}")
        };
        vcs.push(forged);

        let vp_jwt = build_vp(&holder_key, &holder_address, vcs);
        let result = engine().verify_vp(&vp_jwt);

        assert!(!result.verified);
        assert!(result.error.is_some());
        assert_eq!(result.vcs.iter().filter(|c| c.verified).count(), 3);
        let failing = result.vcs.iter().find(|c| !c.verified).unwrap();
        assert_eq!(failing.index, 3);
        assert!(failing.error.is_some());
    }

    #[test]
    fn tampered_outer_signature_fails() {
        let (key, address) = wallet();
        let vp_jwt = build_vp(&key, &address, vec![]);

        // Flip a byte of the signature part.
        let (h, p, s) = split_compact(&vp_jwt).unwrap();
        let mut sig = URL_SAFE_NO_PAD.decode(s).unwrap();
        sig[10] ^= 0xff;
        let tampered = format!("{h}.{p}.{}", URL_SAFE_NO_PAD.encode(sig));

        let result = engine().verify_vp(&tampered);
        assert!(!result.verified);
        assert!(result.error.is_some());
    }

    #[test]
    fn wrong_holder_signature_is_rejected_at_assembly() {
        let (_, holder_address) = wallet();
        let (other_key, _) = wallet();

        let material = engine()
            .prepare_signing(&holder_address, vec![], None)
            .unwrap();
        let signature = sign_personal(&other_key, &material.signing_input);

        let err = engine()
            .assemble(&material.signing_input, &signature)
            .unwrap_err();
        assert!(matches!(err, VpError::HolderSignatureMismatch { .. }));
    }

    #[test]
    fn expired_presentation_fails() {
        let (key, address) = wallet();
        let did = format!("{DID_PREFIX}:{address}");

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256K-R","typ":"JWT"}"#);
        let now = chrono::Utc::now().timestamp();
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"iss":"{did}","aud":"{AUDIENCE}","nbf":{},"exp":{},"nonce":"x","vp":{{"@context":[],"type":["VerifiablePresentation"],"holder":"{did}","verifiableCredential":[]}}}}"#,
            now - 7_200,
            now - 3_600,
        ));
        let signing_input = format!("{header}.{payload}");
        let signature = sign_personal(&key, &signing_input);
        let vp_jwt = engine().assemble(&signing_input, &signature);
        // Assembly does not check expiry; verification does.
        let vp_jwt = vp_jwt.unwrap();

        let result = engine().verify_vp(&vp_jwt);
        assert!(!result.verified);
        assert!(result.error.unwrap().contains("expired"));
    }

    #[test]
    fn malformed_tokens_report_errors() {
        let result = engine().verify_vp("only.two");
        assert!(!result.verified);
        assert!(result.error.is_some());

        let result = engine().verify_vp("a.b.c.d");
        assert!(!result.verified);
    }

    #[test]
    fn address_of_did_takes_last_segment() {
        assert_eq!(VpEngine::address_of_did("did:ethr:besu:0xabc"), "0xabc");
        assert_eq!(VpEngine::address_of_did("0xabc"), "0xabc");
    }
}
