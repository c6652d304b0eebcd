//! RSA key handling
//!
//! Public keys are configured as base64 DER SubjectPublicKeyInfo (whitespace
//! is ignored so a key can be pasted across several lines). Private keys are
//! accepted as PKCS#8 PEM or as bare base64 PKCS#8 DER.

use crate::domain::EncryptionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}

/// Public half used to wrap per-artifact symmetric keys
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPublicKey(RsaPublicKey);

impl ArtifactPublicKey {
    /// Parses a base64 DER SubjectPublicKeyInfo
    pub fn from_base64_der(text: &str) -> Result<Self, EncryptionError> {
        if text.trim().is_empty() {
            return Err(EncryptionError::InvalidPublicKey(
                "public key is empty".to_string(),
            ));
        }
        let der = decode_base64(text).map_err(|e| EncryptionError::InvalidPublicKey(e.to_string()))?;
        RsaPublicKey::from_public_key_der(&der)
            .map(Self)
            .map_err(|e| EncryptionError::InvalidPublicKey(e.to_string()))
    }

    /// Base64 DER form, as written to configuration files
    pub fn to_base64_der(&self) -> Result<String, EncryptionError> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| EncryptionError::InvalidPublicKey(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// RSA PKCS#1 v1.5 encryption of a short secret
    pub fn wrap(&self, secret: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        self.0
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, secret)
            .map_err(|e| EncryptionError::KeyWrap(e.to_string()))
    }
}

/// Private half used offline to open artifacts
#[derive(Clone)]
pub struct ArtifactPrivateKey(RsaPrivateKey);

impl ArtifactPrivateKey {
    /// Parses PKCS#8 PEM, or bare base64 PKCS#8 DER
    pub fn parse(text: &str) -> Result<Self, EncryptionError> {
        let text = text.trim();
        if text.starts_with("-----BEGIN") {
            return RsaPrivateKey::from_pkcs8_pem(text)
                .map(Self)
                .map_err(|e| EncryptionError::InvalidPrivateKey(e.to_string()));
        }

        let der = Zeroizing::new(
            decode_base64(text).map_err(|e| EncryptionError::InvalidPrivateKey(e.to_string()))?,
        );
        RsaPrivateKey::from_pkcs8_der(&der)
            .map(Self)
            .map_err(|e| EncryptionError::InvalidPrivateKey(e.to_string()))
    }

    /// Generates a fresh key pair of the given modulus size
    pub fn generate(bits: usize) -> Result<Self, EncryptionError> {
        RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map(Self)
            .map_err(|e| EncryptionError::InvalidPrivateKey(e.to_string()))
    }

    pub fn public_key(&self) -> ArtifactPublicKey {
        ArtifactPublicKey(RsaPublicKey::from(&self.0))
    }

    /// PKCS#8 PEM form
    pub fn to_pem(&self) -> Result<Zeroizing<String>, EncryptionError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| EncryptionError::InvalidPrivateKey(e.to_string()))
    }

    /// Reverses [`ArtifactPublicKey::wrap`]
    pub fn unwrap_secret(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
        self.0
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map(Zeroizing::new)
            .map_err(|e| EncryptionError::KeyWrap(e.to_string()))
    }
}

impl std::fmt::Debug for ArtifactPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ArtifactPrivateKey(**redacted**)")
    }
}
