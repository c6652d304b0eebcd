//! Hybrid encryption of completed artifacts
//!
//! Each artifact gets a fresh AES-256 key and IV ([`symmetric`]); both are
//! wrapped with the study's RSA public key ([`keys`]) and framed ahead of the
//! ciphertext ([`envelope`]). Only the holder of the private key can open an
//! artifact.

pub mod envelope;
pub mod keys;
pub mod symmetric;

pub use envelope::{decrypt_artifact, encrypt_artifact, encrypt_file};
pub use keys::{ArtifactPrivateKey, ArtifactPublicKey};
pub use symmetric::SymmetricKey;
