// Note: Deprecation warnings from generic-array 0.14.x are expected
// These will be resolved when aes-gcm upgrades to 0.11.0 (currently in RC)
// which uses generic-array 1.x
#![allow(deprecated)]

//! Symmetric encryption of personally identifiable fields at rest.
//!
//! Two strategies implement [`Cipher`]:
//! - [`AesCbcCipher`]: AES-256-CBC with PKCS#7 padding and a process-wide IV.
//!   Deterministic, identical plaintexts produce identical ciphertexts.
//! - [`AesGcmCipher`]: AES-256-GCM with a random nonce stored in front of
//!   every ciphertext. Opt-in through [`CipherMode::Gcm`].

use aes::Aes256;
use aes_gcm::{
    aead::{Aead, KeyInit},
    AeadCore, Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Encryption key is not configured")]
    MissingKey,

    #[error("Encryption IV is not configured")]
    MissingIv,

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Invalid encryption IV: {0}")]
    InvalidIv(String),

    #[error("Encryption error: {0}")]
    Encrypt(String),

    #[error("Decryption error: {0}")]
    Decrypt(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Unknown cipher mode '{0}'")]
    UnknownMode(String),
}

/// Encryption strategy used by the repositories.
///
/// Implementors only provide [`Cipher::seal`] and [`Cipher::open`]; the
/// nullability rules (empty or absent input stays absent) live in the
/// provided methods so every strategy behaves the same way.
pub trait Cipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Option<Vec<u8>>, CipherError> {
        if plaintext.is_empty() {
            return Ok(None);
        }
        self.seal(plaintext).map(Some)
    }

    fn decrypt_bytes(&self, ciphertext: &[u8]) -> Result<Option<Vec<u8>>, CipherError> {
        if ciphertext.is_empty() {
            return Ok(None);
        }
        self.open(ciphertext).map(Some)
    }

    /// Encrypts text and returns the ciphertext as base64
    fn encrypt_text(&self, plaintext: Option<&str>) -> Result<Option<String>, CipherError> {
        match plaintext {
            Some(text) if !text.is_empty() => {
                let sealed = self.seal(text.as_bytes())?;
                Ok(Some(BASE64.encode(sealed)))
            }
            _ => Ok(None),
        }
    }

    /// Decrypts base64 ciphertext produced by [`Cipher::encrypt_text`]
    fn decrypt_text(&self, ciphertext: Option<&str>) -> Result<Option<String>, CipherError> {
        match ciphertext {
            Some(encoded) if !encoded.is_empty() => {
                let data = BASE64
                    .decode(encoded)
                    .map_err(|e| CipherError::Encoding(format!("Base64 decode error: {}", e)))?;
                let plain = self.open(&data)?;
                String::from_utf8(plain)
                    .map(Some)
                    .map_err(|e| CipherError::Encoding(format!("UTF-8 decode failed: {}", e)))
            }
            _ => Ok(None),
        }
    }
}

/// Which [`Cipher`] implementation to build at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherMode {
    #[default]
    Cbc,
    Gcm,
}

impl std::fmt::Display for CipherMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CipherMode::Cbc => write!(f, "cbc"),
            CipherMode::Gcm => write!(f, "gcm"),
        }
    }
}

impl std::str::FromStr for CipherMode {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cbc" | "aes-cbc" => Ok(CipherMode::Cbc),
            "gcm" | "aes-gcm" => Ok(CipherMode::Gcm),
            other => Err(CipherError::UnknownMode(other.to_string())),
        }
    }
}

/// Builds the configured strategy. The IV is only required for CBC.
pub fn build_cipher(
    mode: CipherMode,
    key: Option<&str>,
    iv: Option<&str>,
) -> Result<Arc<dyn Cipher>, CipherError> {
    match mode {
        CipherMode::Cbc => Ok(Arc::new(AesCbcCipher::new(key, iv)?)),
        CipherMode::Gcm => Ok(Arc::new(AesGcmCipher::new(key)?)),
    }
}

fn decode_key(key: Option<&str>) -> Result<[u8; KEY_LENGTH], CipherError> {
    let key = key
        .filter(|k| !k.trim().is_empty())
        .ok_or(CipherError::MissingKey)?;
    let bytes = BASE64
        .decode(key.trim())
        .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CipherError::InvalidKey(format!(
            "Key must be exactly {} bytes, got {}",
            KEY_LENGTH,
            b.len()
        ))
    })
}

fn decode_iv(iv: Option<&str>) -> Result<[u8; IV_LENGTH], CipherError> {
    let iv = iv
        .filter(|v| !v.trim().is_empty())
        .ok_or(CipherError::MissingIv)?;
    let bytes = BASE64
        .decode(iv.trim())
        .map_err(|e| CipherError::InvalidIv(e.to_string()))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CipherError::InvalidIv(format!(
            "IV must be exactly {} bytes, got {}",
            IV_LENGTH,
            b.len()
        ))
    })
}

/// AES-256-CBC with a fixed key and IV, both supplied base64-encoded
pub struct AesCbcCipher {
    key: [u8; KEY_LENGTH],
    iv: [u8; IV_LENGTH],
}

impl std::fmt::Debug for AesCbcCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcCipher").finish_non_exhaustive()
    }
}

impl AesCbcCipher {
    pub fn new(key: Option<&str>, iv: Option<&str>) -> Result<Self, CipherError> {
        Ok(Self {
            key: decode_key(key)?,
            iv: decode_iv(iv)?,
        })
    }
}

impl Cipher for AesCbcCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let encryptor = Aes256CbcEnc::new(&self.key.into(), &self.iv.into());
        Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let decryptor = Aes256CbcDec::new(&self.key.into(), &self.iv.into());
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| CipherError::Decrypt(e.to_string()))
    }
}

/// AES-256-GCM; output layout is `nonce || ciphertext`
pub struct AesGcmCipher {
    key: [u8; KEY_LENGTH],
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    pub fn new(key: Option<&str>) -> Result<Self, CipherError> {
        Ok(Self {
            key: decode_key(key)?,
        })
    }
}

impl Cipher for AesGcmCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new(self.key.as_slice().into());
        let nonce = Aes256Gcm::generate_nonce(&mut aes_gcm::aead::OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend(ciphertext);
        Ok(combined)
    }

    fn open(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < NONCE_LENGTH {
            return Err(CipherError::Decrypt("Invalid encrypted data".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LENGTH);
        let cipher = Aes256Gcm::new(self.key.as_slice().into());

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CipherError::Decrypt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 32-byte key and 16-byte IV, base64 encoded
    const KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
    const IV: &str = "YWJjZGVmMDEyMzQ1Njc4OQ==";

    fn cbc() -> AesCbcCipher {
        AesCbcCipher::new(Some(KEY), Some(IV)).unwrap()
    }

    #[test]
    fn test_cbc_text_round_trip() {
        let cipher = cbc();
        let original = "ada.lovelace@example.com";

        let encrypted = cipher.encrypt_text(Some(original)).unwrap().unwrap();
        assert_ne!(encrypted, original);

        let decrypted = cipher.decrypt_text(Some(&encrypted)).unwrap();
        assert_eq!(decrypted.as_deref(), Some(original));
    }

    #[test]
    fn test_cbc_bytes_round_trip() {
        let cipher = cbc();
        let original = b"Binary data \x00\x01\x02\xFF";

        let encrypted = cipher.encrypt_bytes(original).unwrap().unwrap();
        // PKCS#7 always pads to a full block
        assert_eq!(encrypted.len() % 16, 0);

        let decrypted = cipher.decrypt_bytes(&encrypted).unwrap().unwrap();
        assert_eq!(decrypted, original.to_vec());
    }

    #[test]
    fn test_cbc_is_deterministic() {
        let cipher = cbc();
        let first = cipher.encrypt_text(Some("same input")).unwrap();
        let second = cipher.encrypt_text(Some("same input")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_absent_and_empty_inputs_stay_absent() {
        let cipher = cbc();
        assert_eq!(cipher.encrypt_text(None).unwrap(), None);
        assert_eq!(cipher.encrypt_text(Some("")).unwrap(), None);
        assert_eq!(cipher.decrypt_text(None).unwrap(), None);
        assert_eq!(cipher.decrypt_text(Some("")).unwrap(), None);
        assert_eq!(cipher.encrypt_bytes(&[]).unwrap(), None);
        assert_eq!(cipher.decrypt_bytes(&[]).unwrap(), None);
    }

    #[test]
    fn test_unicode_round_trip() {
        let cipher = cbc();
        let original = "Grüezi 世界! 🦀";
        let encrypted = cipher.encrypt_text(Some(original)).unwrap();
        let decrypted = cipher.decrypt_text(encrypted.as_deref()).unwrap();
        assert_eq!(decrypted.as_deref(), Some(original));
    }

    #[test]
    fn test_missing_key_or_iv_is_a_configuration_error() {
        assert!(matches!(
            AesCbcCipher::new(None, Some(IV)),
            Err(CipherError::MissingKey)
        ));
        assert!(matches!(
            AesCbcCipher::new(Some(""), Some(IV)),
            Err(CipherError::MissingKey)
        ));
        assert!(matches!(
            AesCbcCipher::new(Some(KEY), None),
            Err(CipherError::MissingIv)
        ));
    }

    #[test]
    fn test_wrong_key_length_is_rejected() {
        let short_key = BASE64.encode(b"short");
        let result = AesCbcCipher::new(Some(&short_key), Some(IV));
        assert!(matches!(result, Err(CipherError::InvalidKey(_))));

        let short_iv = BASE64.encode(b"short");
        let result = AesCbcCipher::new(Some(KEY), Some(&short_iv));
        assert!(matches!(result, Err(CipherError::InvalidIv(_))));
    }

    #[test]
    fn test_decrypt_invalid_base64() {
        let result = cbc().decrypt_text(Some("not base64 !!"));
        assert!(matches!(result, Err(CipherError::Encoding(_))));
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails_or_differs() {
        let other_key = BASE64.encode([7u8; 32]);
        let other = AesCbcCipher::new(Some(&other_key), Some(IV)).unwrap();

        let encrypted = cbc().encrypt_text(Some("Hello, World!")).unwrap();
        let result = other.decrypt_text(encrypted.as_deref());
        // CBC has no authentication; a wrong key either breaks padding or yields garbage
        match result {
            Ok(value) => assert_ne!(value.as_deref(), Some("Hello, World!")),
            Err(_) => {}
        }
    }

    #[test]
    fn test_gcm_round_trip_and_random_nonce() {
        let cipher = AesGcmCipher::new(Some(KEY)).unwrap();

        let first = cipher.encrypt_text(Some("Hello, World!")).unwrap().unwrap();
        let second = cipher.encrypt_text(Some("Hello, World!")).unwrap().unwrap();
        assert_ne!(first, second);

        assert_eq!(
            cipher.decrypt_text(Some(&first)).unwrap().as_deref(),
            Some("Hello, World!")
        );
        assert_eq!(
            cipher.decrypt_text(Some(&second)).unwrap().as_deref(),
            Some("Hello, World!")
        );
    }

    #[test]
    fn test_gcm_rejects_truncated_data() {
        let cipher = AesGcmCipher::new(Some(KEY)).unwrap();
        let result = cipher.decrypt_bytes(b"short");
        assert!(matches!(result, Err(CipherError::Decrypt(_))));
    }

    #[test]
    fn test_build_cipher_by_mode() {
        let cbc = build_cipher(CipherMode::Cbc, Some(KEY), Some(IV)).unwrap();
        let sealed = cbc.seal(b"payload").unwrap();
        assert_eq!(cbc.open(&sealed).unwrap(), b"payload".to_vec());

        // GCM does not need an IV
        let gcm = build_cipher(CipherMode::Gcm, Some(KEY), None).unwrap();
        let sealed = gcm.seal(b"payload").unwrap();
        assert_eq!(gcm.open(&sealed).unwrap(), b"payload".to_vec());

        assert!(build_cipher(CipherMode::Cbc, Some(KEY), None).is_err());
    }

    #[test]
    fn test_cipher_mode_parsing() {
        assert_eq!("cbc".parse::<CipherMode>().unwrap(), CipherMode::Cbc);
        assert_eq!("AES-GCM".parse::<CipherMode>().unwrap(), CipherMode::Gcm);
        assert!("rot13".parse::<CipherMode>().is_err());
        assert_eq!(CipherMode::default().to_string(), "cbc");
    }
}
