// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared helpers: test wallets and wallet-side signing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;

use did_gateway::auth::signature::keccak256;

pub struct TestWallet {
    pub key: SigningKey,
    pub address: String,
}

/// Generate a wallet with its lowercase Ethereum address.
pub fn wallet() -> TestWallet {
    let key = SigningKey::random(&mut OsRng);
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    TestWallet {
        address: format!("0x{}", hex::encode(&hash[12..])),
        key,
    }
}

fn sign_prehash(key: &SigningKey, digest: &[u8; 32]) -> String {
    let (signature, recovery_id) = key.sign_prehash_recoverable(digest).expect("signing failed");
    let mut bytes = Vec::with_capacity(65);
    bytes.extend_from_slice(&signature.to_bytes());
    bytes.push(recovery_id.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

/// EIP-191 `personal_sign`, as the wallet does for challenges and VPs.
pub fn sign_personal(wallet: &TestWallet, message: &str) -> String {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    sign_prehash(&wallet.key, &keccak256(prefixed.as_bytes()))
}

/// Issue a credential the way the issuance service does: a compact token
/// signed by the issuer over `keccak256(header.payload)`.
pub fn make_vc(issuer: &TestWallet, subject_did: &str, vc_type: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256K-R","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"iss":"did:ethr:besu:{}","sub":"{subject_did}","vc":{{"type":["VerifiableCredential","{vc_type}"]}}}}"#,
        issuer.address,
    ));
    let signing_input = format!("{header}.{payload}");
    let signature_hex = sign_prehash(&issuer.key, &keccak256(signing_input.as_bytes()));
    let signature_bytes = hex::decode(signature_hex.trim_start_matches("0x")).unwrap();
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature_bytes))
}
