//! Hardened BIP32 derivation of the node's local-client key
//!
//! A node running on this machine keeps its root secret in `privkey.hex`.
//! Local connections authenticate with a key derived from that root along
//! [`LOCAL_CLIENT_PATH`], so no separate key file is needed.

use hmac::{Hmac, Mac};
use k256::SecretKey;
use sha2::Sha512;

use super::{LndcError, LndcResult};

const HARDENED: u32 = 1 << 31;

/// m/44'/513'/9'/1'/0'
pub const LOCAL_CLIENT_PATH: [u32; 5] = [
    44 | HARDENED,
    513 | HARDENED,
    9 | HARDENED,
    1 | HARDENED,
    HARDENED,
];

struct ExtendedKey {
    key: SecretKey,
    chain_code: [u8; 32],
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> LndcResult<[u8; 64]> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|e| LndcError::InvalidKey(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split_output(out: &[u8; 64]) -> LndcResult<(SecretKey, [u8; 32])> {
    let key = SecretKey::from_slice(&out[..32])
        .map_err(|_| LndcError::InvalidKey("derived key out of range".to_string()))?;
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&out[32..]);
    Ok((key, chain_code))
}

impl ExtendedKey {
    fn master(seed: &[u8]) -> LndcResult<Self> {
        let (key, chain_code) = split_output(&hmac_sha512(b"Bitcoin seed", &[seed])?)?;
        Ok(Self { key, chain_code })
    }

    fn hardened_child(&self, index: u32) -> LndcResult<Self> {
        if index & HARDENED == 0 {
            return Err(LndcError::InvalidKey(format!(
                "non-hardened index {} needs a public parent",
                index
            )));
        }
        let parent = self.key.to_bytes();
        let index_bytes = index.to_be_bytes();
        let out = hmac_sha512(
            &self.chain_code,
            &[&[0u8][..], parent.as_slice(), &index_bytes[..]],
        )?;
        let (tweak, chain_code) = split_output(&out)?;
        let child = *tweak.to_nonzero_scalar() + *self.key.to_nonzero_scalar();
        let key = SecretKey::from_bytes(&child.to_bytes())
            .map_err(|_| LndcError::InvalidKey("derived key is zero".to_string()))?;
        Ok(Self { key, chain_code })
    }
}

/// Derive the key at `path` from a 32-byte root seed
pub fn derive_path(seed: &[u8; 32], path: &[u32]) -> LndcResult<SecretKey> {
    let mut node = ExtendedKey::master(seed)?;
    for index in path {
        node = node.hardened_child(*index)?;
    }
    Ok(node.key)
}

/// Key a local client presents to the node owning `seed`
pub fn local_client_key(seed: &[u8; 32]) -> LndcResult<SecretKey> {
    derive_path(seed, &LOCAL_CLIENT_PATH)
}
