//! Lit Addresses
//!
//! A lit address is the bech32 encoding (HRP `ln`) of the first 20 bytes of
//! the double SHA-256 of a node's compressed public key.

use bech32::{FromBase32, ToBase32, Variant};
use sha2::{Digest, Sha256};

/// Human readable part of every lit address
pub const LIT_ADDRESS_HRP: &str = "ln";

/// Payload length of a lit address, in bytes
const PKH_LEN: usize = 20;

/// Derive the lit address for a compressed public key
pub fn lit_address_from_pubkey(pubkey: &[u8; 33]) -> String {
    let double = Sha256::digest(Sha256::digest(pubkey));
    // Encoding a valid HRP with a short payload cannot fail
    bech32::encode(LIT_ADDRESS_HRP, (&double[..PKH_LEN]).to_base32(), Variant::Bech32)
        .unwrap_or_default()
}

/// Check that a string is a well-formed lit address
pub fn lit_address_ok(adr: &str) -> bool {
    let Ok((hrp, data, variant)) = bech32::decode(adr) else {
        return false;
    };
    if hrp != LIT_ADDRESS_HRP || variant != Variant::Bech32 {
        return false;
    }
    Vec::<u8>::from_base32(&data)
        .map(|payload| payload.len() == PKH_LEN)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pubkey() -> [u8; 33] {
        let mut key = [0x11u8; 33];
        key[0] = 0x02;
        key
    }

    #[test]
    fn test_derived_address_is_valid() {
        let adr = lit_address_from_pubkey(&sample_pubkey());
        assert!(adr.starts_with("ln1"));
        assert!(lit_address_ok(&adr));
    }

    #[test]
    fn test_derivation_is_stable() {
        assert_eq!(
            lit_address_from_pubkey(&sample_pubkey()),
            lit_address_from_pubkey(&sample_pubkey())
        );
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(!lit_address_ok(""));
        assert!(!lit_address_ok("not-an-address"));
        assert!(!lit_address_ok("ln1qqqqqqqq"));
    }

    #[test]
    fn test_rejects_corrupted_checksum() {
        let mut adr = lit_address_from_pubkey(&sample_pubkey());
        let last = adr.pop().unwrap();
        adr.push(if last == 'q' { 'p' } else { 'q' });
        assert!(!lit_address_ok(&adr));
    }

    #[test]
    fn test_rejects_other_hrp() {
        let other = bech32::encode("bc", [7u8; 20].to_base32(), Variant::Bech32).unwrap();
        assert!(!lit_address_ok(&other));
    }
}
