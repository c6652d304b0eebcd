//! AES-256-CBC with PKCS#7 padding

use crate::domain::EncryptionError;
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes
pub const IV_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// One-shot symmetric key material; the key is wiped on drop
pub struct SymmetricKey {
    key: Zeroizing<[u8; KEY_LEN]>,
    iv: [u8; IV_LEN],
}

impl SymmetricKey {
    /// Draws a fresh key and IV from the thread CSPRNG
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(key.as_mut());
        rng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    /// Rebuilds key material from raw bytes
    pub fn from_parts(key: &[u8], iv: &[u8]) -> Result<Self, EncryptionError> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            EncryptionError::MalformedArtifact(format!(
                "symmetric key is {} bytes, expected {KEY_LEN}",
                key.len()
            ))
        })?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| {
            EncryptionError::MalformedArtifact(format!(
                "initialization vector is {} bytes, expected {IV_LEN}",
                iv.len()
            ))
        })?;
        Ok(Self {
            key: Zeroizing::new(key),
            iv,
        })
    }

    pub fn key(&self) -> &[u8] {
        self.key.as_ref()
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let cipher = Aes256CbcEnc::new_from_slices(self.key.as_ref(), &self.iv)
            .map_err(|e| EncryptionError::Cipher(e.to_string()))?;
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let cipher = Aes256CbcDec::new_from_slices(self.key.as_ref(), &self.iv)
            .map_err(|e| EncryptionError::Cipher(e.to_string()))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| EncryptionError::Cipher(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let key = SymmetricKey::generate();
        let plaintext = b"{\"type\":\"Speed\",\"kph\":12.0}";
        let ciphertext = key.encrypt(plaintext).unwrap();

        assert_ne!(&ciphertext[..], &plaintext[..]);
        assert_eq!(ciphertext.len() % 16, 0);
        assert_eq!(key.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_block_aligned_input_gets_full_padding_block() {
        let key = SymmetricKey::generate();
        let ciphertext = key.encrypt(&[7u8; 32]).unwrap();
        assert_eq!(ciphertext.len(), 48);
    }

    #[test]
    fn test_wrong_key_fails_or_differs() {
        let key = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let ciphertext = key.encrypt(b"sensitive").unwrap();

        match other.decrypt(&ciphertext) {
            Ok(bytes) => assert_ne!(bytes, b"sensitive"),
            Err(e) => assert!(matches!(e, EncryptionError::Cipher(_))),
        }
    }

    #[test]
    fn test_from_parts_checks_lengths() {
        assert!(SymmetricKey::from_parts(&[0u8; 16], &[0u8; 16]).is_err());
        assert!(SymmetricKey::from_parts(&[0u8; 32], &[0u8; 8]).is_err());
        assert!(SymmetricKey::from_parts(&[0u8; 32], &[0u8; 16]).is_ok());
    }
}
