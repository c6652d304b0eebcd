//! Encrypted artifact layout
//!
//! An encrypted artifact is, little-endian:
//!
//! ```text
//! i32    wrapped key length
//! [u8]   RSA-wrapped 256-bit AES key
//! i32    wrapped IV length
//! [u8]   RSA-wrapped 128-bit IV
//! [u8]   AES-256-CBC ciphertext of the gzip artifact
//! ```

use super::keys::{ArtifactPrivateKey, ArtifactPublicKey};
use super::symmetric::SymmetricKey;
use crate::domain::EncryptionError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Encrypts `plaintext` under a fresh symmetric key wrapped for `public_key`
pub fn encrypt_artifact(
    plaintext: &[u8],
    public_key: &ArtifactPublicKey,
) -> Result<Vec<u8>, EncryptionError> {
    let symmetric = SymmetricKey::generate();
    let wrapped_key = public_key.wrap(symmetric.key())?;
    let wrapped_iv = public_key.wrap(symmetric.iv())?;
    let ciphertext = symmetric.encrypt(plaintext)?;

    let mut out = Vec::with_capacity(8 + wrapped_key.len() + wrapped_iv.len() + ciphertext.len());
    write_prefixed(&mut out, &wrapped_key)?;
    write_prefixed(&mut out, &wrapped_iv)?;
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Reverses [`encrypt_artifact`]
pub fn decrypt_artifact(
    artifact: &[u8],
    private_key: &ArtifactPrivateKey,
) -> Result<Vec<u8>, EncryptionError> {
    let (wrapped_key, rest) = read_prefixed(artifact, "key")?;
    let (wrapped_iv, ciphertext) = read_prefixed(rest, "initialization vector")?;

    let key = private_key.unwrap_secret(wrapped_key)?;
    let iv = private_key.unwrap_secret(wrapped_iv)?;
    SymmetricKey::from_parts(&key, &iv)?.decrypt(ciphertext)
}

/// Encrypts the file at `source` into a new file at `destination`
///
/// The destination is synced before returning. On error a partially written
/// destination is removed.
pub fn encrypt_file(
    source: &Path,
    destination: &Path,
    public_key: &ArtifactPublicKey,
) -> Result<(), EncryptionError> {
    let plaintext = std::fs::read(source)?;
    let artifact = encrypt_artifact(&plaintext, public_key)?;

    let written = File::create(destination).and_then(|mut file| {
        file.write_all(&artifact)?;
        file.sync_all()
    });

    if let Err(e) = written {
        let _ = std::fs::remove_file(destination);
        return Err(e.into());
    }
    Ok(())
}

fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncryptionError> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| EncryptionError::KeyWrap(format!("wrapped value too long: {}", bytes.len())))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn read_prefixed<'a>(
    bytes: &'a [u8],
    what: &str,
) -> Result<(&'a [u8], &'a [u8]), EncryptionError> {
    let (len_bytes, rest) = bytes
        .split_first_chunk::<4>()
        .ok_or_else(|| EncryptionError::MalformedArtifact(format!("missing {what} length")))?;

    let len = i32::from_le_bytes(*len_bytes);
    let len = usize::try_from(len)
        .map_err(|_| EncryptionError::MalformedArtifact(format!("negative {what} length {len}")))?;

    if len > rest.len() {
        return Err(EncryptionError::MalformedArtifact(format!(
            "{what} length {len} exceeds remaining {} bytes",
            rest.len()
        )));
    }
    Ok(rest.split_at(len))
}
