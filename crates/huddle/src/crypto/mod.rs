//! Chunked RSA encryption for service notices.
//!
//! Notices are split into [`CHUNK_CHARS`]-character pieces, each piece is
//! encrypted on its own with RSA PKCS#1 v1.5 and base64-encoded, and the
//! pieces are joined with [`CHUNK_SEPARATOR`]. Clients reverse the process
//! with their private key.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

/// Maximum number of characters encrypted per chunk.
pub const CHUNK_CHARS: usize = 25;

/// Separator placed between encrypted chunks.
pub const CHUNK_SEPARATOR: &str = ":|:";

/// Errors from importing keys or encrypting/decrypting notices.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key could not be imported as an RSA public key.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// Encryption of a chunk failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// A chunk could not be decoded or decrypted.
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// A recipient's public key, ready for encrypting notices.
#[derive(Debug, Clone)]
pub struct NoticeKey {
    inner: RsaPublicKey,
}

impl NoticeKey {
    /// Import a PEM public key (SPKI `PUBLIC KEY` or PKCS#1 `RSA PUBLIC KEY`).
    pub fn parse(pem: &str) -> Result<Self, CryptoError> {
        let pem = pem.trim();
        if pem.is_empty() {
            return Err(CryptoError::InvalidKey("empty key".to_string()));
        }

        let inner = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self { inner })
    }

    /// Encrypt `plaintext` chunk by chunk and join the chunks.
    ///
    /// An empty plaintext produces an empty string.
    pub fn encrypt_notice(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut rng = rand::thread_rng();
        let mut encrypted = Vec::new();

        for chunk in chunk_text(plaintext, CHUNK_CHARS) {
            let cipher = self
                .inner
                .encrypt(&mut rng, Pkcs1v15Encrypt, chunk.as_bytes())
                .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
            encrypted.push(BASE64.encode(cipher));
        }

        Ok(encrypted.join(CHUNK_SEPARATOR))
    }
}

/// Decrypt a notice produced by [`NoticeKey::encrypt_notice`].
pub fn decrypt_notice(key: &RsaPrivateKey, ciphertext: &str) -> Result<String, CryptoError> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }

    let mut plaintext = String::new();
    for piece in ciphertext.split(CHUNK_SEPARATOR) {
        let raw = BASE64
            .decode(piece)
            .map_err(|e| CryptoError::Decrypt(format!("bad base64: {e}")))?;
        let bytes = key
            .decrypt(Pkcs1v15Encrypt, &raw)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| CryptoError::Decrypt(format!("chunk is not UTF-8: {e}")))?;
        plaintext.push_str(&text);
    }

    Ok(plaintext)
}

/// Split `text` into pieces of at most `size` characters.
pub fn chunk_text(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}


#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::{EncodeRsaPublicKey, LineEnding};

    fn sample_text(len: usize) -> String {
        "Zoë joined the café group ✓ "
            .chars()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_chunk_text_boundaries() {
        assert!(chunk_text("", CHUNK_CHARS).is_empty());
        assert_eq!(chunk_text("a", CHUNK_CHARS), vec!["a"]);
        assert_eq!(chunk_text(&"x".repeat(25), CHUNK_CHARS).len(), 1);
        assert_eq!(chunk_text(&"x".repeat(26), CHUNK_CHARS).len(), 2);
        assert_eq!(chunk_text(&"x".repeat(500), CHUNK_CHARS).len(), 20);
    }

    #[test]
    fn test_chunk_text_counts_characters_not_bytes() {
        let text = "ąęśćżźółń".repeat(3);
        let chunks = chunk_text(&text, CHUNK_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 25);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_notice_round_trip_lengths() {
        let key = NoticeKey::parse(&test_keys::public_pem(0)).unwrap();
        let private = test_keys::private_key(0);

        for len in [0, 1, 24, 25, 26, 500] {
            let plaintext = sample_text(len);
            let encrypted = key.encrypt_notice(&plaintext).unwrap();

            let expected_chunks = len.div_ceil(CHUNK_CHARS);
            let actual_chunks = if encrypted.is_empty() {
                0
            } else {
                encrypted.split(CHUNK_SEPARATOR).count()
            };
            assert_eq!(actual_chunks, expected_chunks, "chunk count for len {len}");

            let decrypted = decrypt_notice(&private, &encrypted).unwrap();
            assert_eq!(decrypted, plaintext, "round trip for len {len}");
        }
    }

    #[test]
    fn test_parse_accepts_pkcs1_pem() {
        let public = RsaPublicKey::from(&test_keys::private_key(1));
        let pem = public.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert!(NoticeKey::parse(&pem).is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage_and_empty() {
        assert!(matches!(
            NoticeKey::parse(""),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            NoticeKey::parse("-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let key = NoticeKey::parse(&test_keys::public_pem(0)).unwrap();
        let encrypted = key.encrypt_notice("secret notice").unwrap();
        assert!(decrypt_notice(&test_keys::private_key(1), &encrypted).is_err());
    }
}
