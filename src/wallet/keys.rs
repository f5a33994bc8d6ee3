//! Key derivation
//!
//! Derives public keys, addresses, and decentralized identifiers from
//! secp256k1 private keys.
//!
//! Canonical public-key encoding: the uncompressed SEC1 point, hex, with
//! no `0x` prefix. The DID is `did:key:` followed by exactly that string.
//! Addresses keep the conventional `0x` prefix; their hex case carries no
//! meaning and comparisons are case-insensitive.

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::types::WicketError;

/// Prefix for decentralized identifiers bound to a public key
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Parse a hex private key (`0x` tolerated) into a signing key.
///
/// The intermediate byte buffer is wiped before returning.
pub fn signing_key_from_hex(private_key: &str) -> Result<SigningKey, WicketError> {
    let mut bytes = hex::decode(private_key.trim_start_matches("0x"))
        .map_err(|_| WicketError::Crypto("private key is not valid hex".into()))?;

    let result = SigningKey::from_slice(&bytes)
        .map_err(|_| WicketError::Crypto("private key is not a valid secp256k1 scalar".into()));
    bytes.zeroize();

    result
}

/// Derive the canonical public-key string for a private key
pub fn derive_public_key(private_key: &str) -> Result<String, WicketError> {
    let signing_key = signing_key_from_hex(private_key)?;
    let verifying_key = VerifyingKey::from(&signing_key);

    Ok(hex::encode(verifying_key.to_encoded_point(false).as_bytes()))
}

/// Derive the `did:key:` identifier for a private key
pub fn derive_did(private_key: &str) -> Result<String, WicketError> {
    let public_key = derive_public_key(private_key)?;
    Ok(format!("{DID_KEY_PREFIX}{public_key}"))
}

/// Derive an Ethereum-style address from a verifying key.
///
/// Keccak-256 of the uncompressed SEC1 point without its 0x04 tag byte,
/// keeping the last 20 bytes.
pub fn derive_address(verifying_key: &VerifyingKey) -> String {
    let point = verifying_key.to_encoded_point(false);
    let mut hasher = Keccak256::new();
    hasher.update(&point.as_bytes()[1..]);
    let hash = hasher.finalize();

    format!("0x{}", hex::encode(&hash[hash.len() - 20..]))
}

/// Derive the address owned by a private key
pub fn address_for_private_key(private_key: &str) -> Result<String, WicketError> {
    let signing_key = signing_key_from_hex(private_key)?;
    Ok(derive_address(&VerifyingKey::from(&signing_key)))
}

/// Syntactic address check: `0x` followed by 40 hex digits
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(body) => body.len() == 40 && body.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_public_key_matches_signing_key() {
        let signing_key = SigningKey::random(&mut OsRng);
        let private_hex = hex::encode(signing_key.to_bytes());

        let public_key = derive_public_key(&private_hex).unwrap();
        let expected = hex::encode(
            VerifyingKey::from(&signing_key)
                .to_encoded_point(false)
                .as_bytes(),
        );

        assert_eq!(public_key, expected);
        // Uncompressed SEC1: 65 bytes, 130 hex chars, no 0x prefix
        assert_eq!(public_key.len(), 130);
        assert!(public_key.starts_with("04"));
    }

    #[test]
    fn test_prefix_tolerated() {
        let signing_key = SigningKey::random(&mut OsRng);
        let bare = hex::encode(signing_key.to_bytes());
        let prefixed = format!("0x{bare}");

        assert_eq!(
            derive_public_key(&bare).unwrap(),
            derive_public_key(&prefixed).unwrap()
        );
    }

    #[test]
    fn test_did_uses_canonical_public_key() {
        let signing_key = SigningKey::random(&mut OsRng);
        let private_hex = hex::encode(signing_key.to_bytes());

        let did = derive_did(&private_hex).unwrap();
        let public_key = derive_public_key(&private_hex).unwrap();

        assert_eq!(did, format!("did:key:{public_key}"));
    }

    #[test]
    fn test_bad_key_material() {
        assert!(signing_key_from_hex("zz-not-hex").is_err());
        assert!(signing_key_from_hex("").is_err());
        // All-zero scalar is not a valid private key
        assert!(signing_key_from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_address_shape() {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = derive_address(&VerifyingKey::from(&signing_key));

        assert!(is_valid_address(&address));
        assert_eq!(address.len(), 42);
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        ));
        assert!(!is_valid_address("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_valid_address("0x123"));
        assert!(!is_valid_address("0xZZdA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_valid_address(""));
    }
}
