//! Noise XX Handshake
//!
//! `Noise_XX_secp256k1_ChaChaPoly_SHA256` with prologue `lit`. Every act on
//! the wire is prefixed with a version byte:
//!
//! ```text
//! act one   -> e                 1 + 33           = 34 bytes
//! act two   <- e, ee, s, es      1 + 33 + 49 + 16 = 99 bytes
//! act three -> s, se             1 + 49 + 16      = 66 bytes
//! ```
//!
//! Both roles finish with a pair of [`CipherState`]s for the transport.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use super::{LndcError, LndcResult};

pub const PROTOCOL_NAME: &[u8] = b"Noise_XX_secp256k1_ChaChaPoly_SHA256";
pub const PROLOGUE: &[u8] = b"lit";
pub const HANDSHAKE_VERSION: u8 = 0;

pub const ACT_ONE_LEN: usize = 1 + 33;
pub const ACT_TWO_LEN: usize = 1 + 33 + 49 + 16;
pub const ACT_THREE_LEN: usize = 1 + 49 + 16;

pub const MAC_LEN: usize = 16;

/// Messages sent under one key before it is rotated
const KEY_ROTATION_INTERVAL: u64 = 1000;

/// Compressed SEC1 encoding of a public key
pub fn serialize_pubkey(key: &PublicKey) -> [u8; 33] {
    let mut out = [0u8; 33];
    out.copy_from_slice(key.to_encoded_point(true).as_bytes());
    out
}

fn parse_pubkey(bytes: &[u8]) -> LndcResult<PublicKey> {
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| LndcError::HandshakeFailed("invalid public key".to_string()))
}

/// SHA-256 of the compressed shared point
pub fn ecdh(local: &SecretKey, remote: &PublicKey) -> [u8; 32] {
    let shared = AffinePoint::from(remote.to_projective() * *local.to_nonzero_scalar());
    Sha256::digest(shared.to_encoded_point(true).as_bytes()).into()
}

/// HKDF-SHA256 with `salt` as the chaining key, split into two 32-byte keys
fn hkdf_pair(salt: &[u8; 32], ikm: &[u8]) -> LndcResult<([u8; 32], [u8; 32])> {
    let mut okm = [0u8; 64];
    Hkdf::<Sha256>::new(Some(&salt[..]), ikm)
        .expand(&[], &mut okm)
        .map_err(|e| LndcError::HandshakeFailed(format!("hkdf: {}", e)))?;
    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&okm[..32]);
    second.copy_from_slice(&okm[32..]);
    Ok((first, second))
}

/// One direction of an encrypted channel
pub struct CipherState {
    key: [u8; 32],
    nonce: u64,
    /// Chaining key used for rotation; `None` during the handshake
    ck: Option<[u8; 32]>,
}

impl CipherState {
    fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            nonce: 0,
            ck: None,
        }
    }

    fn with_rotation(key: [u8; 32], ck: [u8; 32]) -> Self {
        Self {
            key,
            nonce: 0,
            ck: Some(ck),
        }
    }

    fn nonce_bytes(&self) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[4..].copy_from_slice(&self.nonce.to_le_bytes());
        nonce
    }

    fn advance(&mut self) -> LndcResult<()> {
        self.nonce += 1;
        if let Some(ck) = self.ck {
            if self.nonce == KEY_ROTATION_INTERVAL {
                let (new_ck, new_key) = hkdf_pair(&ck, &self.key)?;
                self.ck = Some(new_ck);
                self.key = new_key;
                self.nonce = 0;
            }
        }
        Ok(())
    }

    pub fn encrypt(&mut self, ad: &[u8], plaintext: &[u8]) -> LndcResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = self.nonce_bytes();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: ad })
            .map_err(|_| LndcError::HandshakeFailed("encryption failed".to_string()))?;
        self.advance()?;
        Ok(ciphertext)
    }

    pub fn decrypt(&mut self, ad: &[u8], ciphertext: &[u8]) -> LndcResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = self.nonce_bytes();
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad: ad })
            .map_err(|_| LndcError::Decrypt)?;
        self.advance()?;
        Ok(plaintext)
    }
}

/// Chaining key, handshake hash and the current handshake cipher
struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    cipher: Option<CipherState>,
}

impl SymmetricState {
    fn initialize() -> Self {
        let h: [u8; 32] = Sha256::digest(PROTOCOL_NAME).into();
        let mut state = Self {
            ck: h,
            h,
            cipher: None,
        };
        state.mix_hash(PROLOGUE);
        state
    }

    fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    fn mix_key(&mut self, ikm: &[u8; 32]) -> LndcResult<()> {
        let (ck, temp_k) = hkdf_pair(&self.ck, ikm)?;
        self.ck = ck;
        self.cipher = Some(CipherState::new(temp_k));
        Ok(())
    }

    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> LndcResult<Vec<u8>> {
        let h = self.h;
        let ciphertext = match self.cipher.as_mut() {
            Some(cipher) => cipher.encrypt(&h, plaintext)?,
            None => plaintext.to_vec(),
        };
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> LndcResult<Vec<u8>> {
        let h = self.h;
        let plaintext = match self.cipher.as_mut() {
            Some(cipher) => cipher
                .decrypt(&h, ciphertext)
                .map_err(|_| LndcError::HandshakeFailed("bad handshake mac".to_string()))?,
            None => ciphertext.to_vec(),
        };
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Transport keys: (first, second) where the initiator sends with first
    fn split(&self) -> LndcResult<(CipherState, CipherState)> {
        let (k1, k2) = hkdf_pair(&self.ck, &[])?;
        Ok((
            CipherState::with_rotation(k1, self.ck),
            CipherState::with_rotation(k2, self.ck),
        ))
    }
}

fn check_version(act: &[u8], name: &str) -> LndcResult<()> {
    if act.first() != Some(&HANDSHAKE_VERSION) {
        return Err(LndcError::HandshakeFailed(format!(
            "{}: unknown handshake version",
            name
        )));
    }
    Ok(())
}

/// Completed handshake: transport ciphers plus the peer's static key
pub struct HandshakeOutput {
    pub send: CipherState,
    pub recv: CipherState,
    pub remote_static: PublicKey,
}

/// Initiator side of the handshake
pub struct Initiator {
    state: SymmetricState,
    local_static: SecretKey,
    ephemeral: SecretKey,
    remote_ephemeral: Option<PublicKey>,
    remote_static: Option<PublicKey>,
}

impl Initiator {
    pub fn new(local_static: SecretKey) -> Self {
        Self {
            state: SymmetricState::initialize(),
            local_static,
            ephemeral: SecretKey::random(&mut OsRng),
            remote_ephemeral: None,
            remote_static: None,
        }
    }

    pub fn act_one(&mut self) -> LndcResult<[u8; ACT_ONE_LEN]> {
        let e = serialize_pubkey(&self.ephemeral.public_key());
        self.state.mix_hash(&e);
        self.state.encrypt_and_hash(&[])?;

        let mut act = [0u8; ACT_ONE_LEN];
        act[0] = HANDSHAKE_VERSION;
        act[1..].copy_from_slice(&e);
        Ok(act)
    }

    /// Processes act two and returns the responder's static key
    pub fn recv_act_two(&mut self, act: &[u8; ACT_TWO_LEN]) -> LndcResult<PublicKey> {
        check_version(act, "act two")?;

        let re = parse_pubkey(&act[1..34])?;
        self.state.mix_hash(&act[1..34]);
        self.state.mix_key(&ecdh(&self.ephemeral, &re))?;

        let rs_bytes = self.state.decrypt_and_hash(&act[34..83])?;
        let rs = parse_pubkey(&rs_bytes)?;
        self.state.mix_key(&ecdh(&self.ephemeral, &rs))?;
        self.state.decrypt_and_hash(&act[83..])?;

        self.remote_ephemeral = Some(re);
        self.remote_static = Some(rs.clone());
        Ok(rs)
    }

    pub fn act_three(mut self) -> LndcResult<([u8; ACT_THREE_LEN], HandshakeOutput)> {
        let (re, rs) = match (self.remote_ephemeral.take(), self.remote_static.take()) {
            (Some(re), Some(rs)) => (re, rs),
            _ => {
                return Err(LndcError::HandshakeFailed(
                    "act three before act two".to_string(),
                ))
            }
        };

        let s = serialize_pubkey(&self.local_static.public_key());
        let enc_s = self.state.encrypt_and_hash(&s)?;
        self.state.mix_key(&ecdh(&self.local_static, &re))?;
        let tag = self.state.encrypt_and_hash(&[])?;

        let mut act = [0u8; ACT_THREE_LEN];
        act[0] = HANDSHAKE_VERSION;
        act[1..50].copy_from_slice(&enc_s);
        act[50..].copy_from_slice(&tag);

        let (send, recv) = self.state.split()?;
        Ok((
            act,
            HandshakeOutput {
                send,
                recv,
                remote_static: rs,
            },
        ))
    }
}

/// Responder side of the handshake
pub struct Responder {
    state: SymmetricState,
    local_static: SecretKey,
    ephemeral: SecretKey,
    remote_ephemeral: Option<PublicKey>,
}

impl Responder {
    pub fn new(local_static: SecretKey) -> Self {
        Self {
            state: SymmetricState::initialize(),
            local_static,
            ephemeral: SecretKey::random(&mut OsRng),
            remote_ephemeral: None,
        }
    }

    pub fn recv_act_one(&mut self, act: &[u8; ACT_ONE_LEN]) -> LndcResult<()> {
        check_version(act, "act one")?;
        let re = parse_pubkey(&act[1..])?;
        self.state.mix_hash(&act[1..]);
        self.state.decrypt_and_hash(&[])?;
        self.remote_ephemeral = Some(re);
        Ok(())
    }

    pub fn act_two(&mut self) -> LndcResult<[u8; ACT_TWO_LEN]> {
        let re = self
            .remote_ephemeral
            .clone()
            .ok_or_else(|| LndcError::HandshakeFailed("act two before act one".to_string()))?;

        let e = serialize_pubkey(&self.ephemeral.public_key());
        self.state.mix_hash(&e);
        self.state.mix_key(&ecdh(&self.ephemeral, &re))?;

        let s = serialize_pubkey(&self.local_static.public_key());
        let enc_s = self.state.encrypt_and_hash(&s)?;
        self.state.mix_key(&ecdh(&self.local_static, &re))?;
        let tag = self.state.encrypt_and_hash(&[])?;

        let mut act = [0u8; ACT_TWO_LEN];
        act[0] = HANDSHAKE_VERSION;
        act[1..34].copy_from_slice(&e);
        act[34..83].copy_from_slice(&enc_s);
        act[83..].copy_from_slice(&tag);
        Ok(act)
    }

    pub fn recv_act_three(mut self, act: &[u8; ACT_THREE_LEN]) -> LndcResult<HandshakeOutput> {
        check_version(act, "act three")?;

        let rs_bytes = self.state.decrypt_and_hash(&act[1..50])?;
        let rs = parse_pubkey(&rs_bytes)?;
        self.state.mix_key(&ecdh(&self.ephemeral, &rs))?;
        self.state.decrypt_and_hash(&act[50..])?;

        let (recv, send) = self.state.split()?;
        Ok(HandshakeOutput {
            send,
            recv,
            remote_static: rs,
        })
    }
}
