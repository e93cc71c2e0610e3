//! Symmetric encryption for sensitive record fields.
//!
//! Values are stored as `hex(iv):hex(tag):hex(ciphertext)` using AES-256-GCM
//! with a random 16-byte IV per call. Decryption never fails loudly: a broken
//! or foreign envelope degrades to [`DecryptOutcome::Corrupted`] so a damaged
//! column can never take down a read path.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray},
    aes::Aes256,
    AeadInPlace, AesGcm, KeyInit,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// AES-256-GCM parameterized over the envelope's 16-byte IV.
type EnvelopeCipher = AesGcm<Aes256, U16>;

pub const IV_LENGTH: usize = 16;
pub const TAG_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("malformed ciphertext envelope")]
    MalformedEnvelope,
}

/// Result of reading a protected field back from storage.
///
/// `Corrupted` and `Absent` both serialize to JSON null at the API boundary,
/// but callers inside the crate must not confuse "no data" with
/// "undecryptable data".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    Present(String),
    Corrupted,
    Absent,
}

impl DecryptOutcome {
    pub fn into_option(self) -> Option<String> {
        match self {
            DecryptOutcome::Present(value) => Some(value),
            DecryptOutcome::Corrupted | DecryptOutcome::Absent => None,
        }
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, DecryptOutcome::Corrupted)
    }
}

/// Field-level cipher holding the process-wide key.
///
/// The key is validated at startup by `Config::from_env`; once constructed
/// the cipher assumes it is well-formed.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: EnvelopeCipher,
}

impl FieldCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: EnvelopeCipher::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypt one plaintext value into an envelope string.
    ///
    /// A fresh random IV is drawn per call; reusing an IV under a fixed key
    /// breaks GCM entirely, so the IV is never caller-suppliable.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(&buffer)
        ))
    }

    /// Decrypt a stored envelope. `None`/empty input is `Absent`; anything
    /// that fails to parse or authenticate is `Corrupted`.
    pub fn decrypt(&self, stored: Option<&str>) -> DecryptOutcome {
        let envelope = match stored {
            Some(value) if !value.is_empty() => value,
            _ => return DecryptOutcome::Absent,
        };

        match self.open_envelope(envelope) {
            Ok(plaintext) => DecryptOutcome::Present(plaintext),
            Err(_) => DecryptOutcome::Corrupted,
        }
    }

    fn open_envelope(&self, envelope: &str) -> Result<String, CryptoError> {
        let parts: Vec<&str> = envelope.split(':').collect();
        if parts.len() != 3 {
            return Err(CryptoError::MalformedEnvelope);
        }

        let iv = hex::decode(parts[0]).map_err(|_| CryptoError::MalformedEnvelope)?;
        let tag = hex::decode(parts[1]).map_err(|_| CryptoError::MalformedEnvelope)?;
        let mut buffer = hex::decode(parts[2]).map_err(|_| CryptoError::MalformedEnvelope)?;

        if iv.len() != IV_LENGTH || tag.len() != TAG_LENGTH {
            return Err(CryptoError::MalformedEnvelope);
        }

        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(buffer).map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(b"0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_round_trip() {
        let c = cipher();
        let envelope = c.encrypt("Maria da Silva").unwrap();
        assert_eq!(
            c.decrypt(Some(&envelope)),
            DecryptOutcome::Present("Maria da Silva".to_string())
        );
    }

    #[test]
    fn test_round_trip_unicode() {
        let c = cipher();
        let envelope = c.encrypt("João; obs: \"não\" veio").unwrap();
        assert_eq!(
            c.decrypt(Some(&envelope)).into_option().as_deref(),
            Some("João; obs: \"não\" veio")
        );
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let c = cipher();
        let a = c.encrypt("same input").unwrap();
        let b = c.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_envelope_layout() {
        let c = cipher();
        let envelope = c.encrypt("abc").unwrap();
        let parts: Vec<&str> = envelope.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LENGTH * 2);
        assert_eq!(parts[1].len(), TAG_LENGTH * 2);
        assert_eq!(parts[2].len(), "abc".len() * 2);
    }

    #[test]
    fn test_absent_on_none_or_empty() {
        let c = cipher();
        assert_eq!(c.decrypt(None), DecryptOutcome::Absent);
        assert_eq!(c.decrypt(Some("")), DecryptOutcome::Absent);
    }

    #[test]
    fn test_corrupted_on_truncated_envelope() {
        let c = cipher();
        let envelope = c.encrypt("secret").unwrap();
        let truncated = &envelope[..envelope.len() - 4];
        assert_eq!(c.decrypt(Some(truncated)), DecryptOutcome::Corrupted);
    }

    #[test]
    fn test_corrupted_on_reordered_parts() {
        let c = cipher();
        let envelope = c.encrypt("secret").unwrap();
        let parts: Vec<&str> = envelope.split(':').collect();
        let reordered = format!("{}:{}:{}", parts[2], parts[1], parts[0]);
        assert_eq!(c.decrypt(Some(&reordered)), DecryptOutcome::Corrupted);
    }

    #[test]
    fn test_corrupted_on_wrong_key() {
        let envelope = cipher().encrypt("secret").unwrap();
        let other = FieldCipher::new(b"ffffffffffffffffffffffffffffffff");
        assert_eq!(other.decrypt(Some(&envelope)), DecryptOutcome::Corrupted);
    }

    #[test]
    fn test_corrupted_on_tampered_ciphertext() {
        let c = cipher();
        let envelope = c.encrypt("secret").unwrap();
        let mut parts: Vec<String> = envelope.split(':').map(String::from).collect();
        let flipped = if parts[2].ends_with('0') { "1" } else { "0" };
        let last = parts[2].len() - 1;
        parts[2].replace_range(last.., flipped);
        let tampered = parts.join(":");
        assert_eq!(c.decrypt(Some(&tampered)), DecryptOutcome::Corrupted);
    }

    #[test]
    fn test_corrupted_on_garbage() {
        let c = cipher();
        assert_eq!(c.decrypt(Some("not an envelope")), DecryptOutcome::Corrupted);
        assert_eq!(c.decrypt(Some("zz:zz:zz")), DecryptOutcome::Corrupted);
        assert_eq!(c.decrypt(Some("aa:bb")), DecryptOutcome::Corrupted);
    }
}
