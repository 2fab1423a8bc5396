// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature recovery.
//!
//! Two recovery paths share the secp256k1 machinery but must never be
//! conflated:
//!
//! - [`recover_personal`]: EIP-191 `personal_sign` messages. The wallet
//!   prefixes the message with `"\x19Ethereum Signed Message:\n{len}"`
//!   before Keccak-256 hashing. Used for login challenges and VP holder
//!   signatures.
//! - [`recover_digest`]: recovery over a caller-supplied 32-byte digest
//!   with no prefix. Used for embedded VC issuer signatures, which the
//!   issuance service signs over `keccak256(header.payload)` directly.
//!
//! Recovered addresses are always lowercase `0x`-prefixed hex.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature encoding: {0}")]
    Encoding(String),
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Parse a 65-byte `r || s || v` hex signature, normalizing `v`.
fn parse_signature(signature_hex: &str) -> Result<(Signature, RecoveryId), SignatureError> {
    let bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|e| SignatureError::Encoding(e.to_string()))?;

    if bytes.len() != 65 {
        return Err(SignatureError::Encoding(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }

    let (rs, v_byte) = bytes.split_at(64);
    let v = match v_byte[0] {
        0 | 27 => 0u8,
        1 | 28 => 1u8,
        v => return Err(SignatureError::InvalidRecoveryId(v)),
    };

    let signature =
        Signature::from_slice(rs).map_err(|e| SignatureError::Encoding(e.to_string()))?;

    Ok((signature, RecoveryId::new(v != 0, false)))
}

/// Ethereum address of a verifying key: last 20 bytes of the Keccak-256 of
/// the uncompressed public key (without the 0x04 tag byte).
fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the signer address from a raw 32-byte digest.
pub fn recover_digest(digest: &[u8; 32], signature_hex: &str) -> Result<String, SignatureError> {
    let (signature, recovery_id) = parse_signature(signature_hex)?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;
    Ok(address_from_key(&key))
}

/// Recover the signer address of an EIP-191 `personal_sign` message.
pub fn recover_personal(message: &str, signature_hex: &str) -> Result<String, SignatureError> {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    recover_digest(&keccak256(prefixed.as_bytes()), signature_hex)
}

/// Whether `signature_hex` over `message` recovers to `expected`.
///
/// Address comparison is case-insensitive; the rest of the system stores
/// addresses lowercase.
pub fn verify_personal(message: &str, signature_hex: &str, expected: &str) -> bool {
    matches!(
        recover_personal(message, signature_hex),
        Ok(recovered) if recovered.eq_ignore_ascii_case(expected)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn test_wallet() -> (SigningKey, String) {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = address_from_key(signing_key.verifying_key());
        (signing_key, address)
    }

    fn sign_personal(key: &SigningKey, message: &str) -> String {
        let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
        let digest = keccak256(prefixed.as_bytes());
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).expect("sign");

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn keccak256_known_vector() {
        assert_eq!(
            hex::encode(keccak256(b"hello")),
            "1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn personal_sign_roundtrip() {
        let (key, address) = test_wallet();
        let message = "Sign this message to authenticate";
        let signature = sign_personal(&key, message);

        let recovered = recover_personal(message, &signature).unwrap();
        assert_eq!(recovered, address);
        assert!(verify_personal(message, &signature, &address));
    }

    #[test]
    fn verify_is_case_insensitive() {
        let (key, address) = test_wallet();
        let signature = sign_personal(&key, "msg");

        assert!(verify_personal("msg", &signature, &address.to_uppercase()));
    }

    #[test]
    fn wrong_message_fails_verify() {
        let (key, address) = test_wallet();
        let signature = sign_personal(&key, "msg");

        assert!(!verify_personal("other msg", &signature, &address));
    }

    #[test]
    fn digest_and_personal_recovery_differ() {
        // A signature over the bare digest must not verify as a personal
        // message of the same content, and vice versa.
        let (key, address) = test_wallet();
        let digest = keccak256(b"payload");
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte() + 27);
        let sig_hex = format!("0x{}", hex::encode(bytes));

        assert_eq!(recover_digest(&digest, &sig_hex).unwrap(), address);
        assert!(!verify_personal("payload", &sig_hex, &address));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(matches!(
            recover_personal("msg", "0xzz"),
            Err(SignatureError::Encoding(_))
        ));
        assert!(matches!(
            recover_personal("msg", "0x1234"),
            Err(SignatureError::Encoding(_))
        ));

        let bad_v = format!("0x{}{:02x}", "11".repeat(64), 9);
        assert!(matches!(
            recover_personal("msg", &bad_v),
            Err(SignatureError::InvalidRecoveryId(9))
        ));
    }

    #[test]
    fn v_byte_accepts_both_conventions() {
        let (key, address) = test_wallet();
        let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", 3, "msg");
        let digest = keccak256(prefixed.as_bytes());
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();

        for v in [recovery_id.to_byte(), recovery_id.to_byte() + 27] {
            let mut bytes = Vec::with_capacity(65);
            bytes.extend_from_slice(&signature.to_bytes());
            bytes.push(v);
            let sig_hex = format!("0x{}", hex::encode(&bytes));
            assert_eq!(recover_personal("msg", &sig_hex).unwrap(), address);
        }
    }
}
