//! Personal-message signature verification
//!
//! Verifies Ethereum `personal_sign` signatures by recovering the signing
//! address from the message digest. Verification never returns an error:
//! malformed input, a bad signature, and a genuine mismatch all look the
//! same to the caller, so the result leaks nothing about which check
//! failed.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::wallet::keys;

/// Domain-separation prefix prepended by signing wallets
const PERSONAL_SIGN_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Compute the keccak-256 digest a wallet signs for `message`.
///
/// A `0x`-prefixed hex message is decoded to raw bytes first; anything
/// else is taken as UTF-8 text. The ASCII length in the prefix is the
/// length of the ORIGINAL message string, not of the decoded bytes. That
/// matches what the counterpart used when it asked the wallet to sign.
pub fn hash_personal_message(message: &str) -> [u8; 32] {
    let payload: Vec<u8> = match message.strip_prefix("0x").map(hex::decode) {
        Some(Ok(bytes)) => bytes,
        _ => message.as_bytes().to_vec(),
    };

    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_SIGN_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(&payload);

    hasher.finalize().into()
}

/// Recover the address that signed `message`.
///
/// Expects a 65-byte `r || s || v` signature in hex (`0x` tolerated),
/// with `v` in {0, 1, 27, 28}. Returns None on any malformed input.
pub fn recover_address(message: &str, signature: &str) -> Option<String> {
    let sig_bytes = hex::decode(signature.trim_start_matches("0x")).ok()?;
    if sig_bytes.len() != 65 {
        return None;
    }

    let v = sig_bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)?;
    let signature = Signature::from_slice(&sig_bytes[..64]).ok()?;

    let digest = hash_personal_message(message);
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).ok()?;

    Some(keys::derive_address(&verifying_key))
}

/// Verify that `signature` over `message` was produced by the key owning
/// `claimed_address`. Address comparison is case-insensitive; hex case
/// carries no meaning here.
pub fn verify_personal_sign(message: &str, signature: &str, claimed_address: &str) -> bool {
    match recover_address(message, signature) {
        Some(recovered) => addresses_match(&recovered, claimed_address),
        None => false,
    }
}

fn addresses_match(a: &str, b: &str) -> bool {
    let a = a.strip_prefix("0x").unwrap_or(a);
    let b = b.strip_prefix("0x").unwrap_or(b);
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}
