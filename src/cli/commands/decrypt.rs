//! Decrypt command implementation
//!
//! Opens an encrypted artifact with the study's private key.

use crate::encryption::{decrypt_artifact, ArtifactPrivateKey};
use clap::Args;
use flate2::read::MultiGzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Arguments for the decrypt command
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Encrypted artifact (`.gz.bin`)
    pub input: String,

    /// Private key file (PKCS#8 PEM or base64 DER)
    #[arg(short = 'k', long, env = "SENSORVAULT_PRIVATE_KEY_FILE")]
    pub private_key: String,

    /// Output path; defaults to the input without its `.bin` suffix
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write the decompressed JSON records instead of the gzip artifact
    #[arg(long)]
    pub decompress: bool,
}

impl DecryptArgs {
    /// Execute the decrypt command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let key_text = fs::read_to_string(&self.private_key)?;
        let private_key = match ArtifactPrivateKey::parse(&key_text) {
            Ok(key) => key,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let artifact = fs::read(&self.input)?;
        let plain = match decrypt_artifact(&artifact, &private_key) {
            Ok(plain) => plain,
            Err(e) => {
                tracing::error!(input = %self.input, error = %e, "Decryption failed");
                eprintln!("❌ Could not decrypt {}: {e}", self.input);
                return Ok(1);
            }
        };

        let output = self.output_path();
        let bytes = if self.decompress {
            let mut text = Vec::new();
            MultiGzDecoder::new(plain.as_slice()).read_to_end(&mut text)?;
            text
        } else {
            plain
        };
        fs::write(&output, &bytes)?;

        println!("🔓 Decrypted {} -> {}", self.input, output.display());
        Ok(0)
    }

    fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return PathBuf::from(output);
        }
        let input = Path::new(&self.input);
        let stem = self
            .input
            .strip_suffix(".bin")
            .map(PathBuf::from)
            .unwrap_or_else(|| input.with_extension("gz"));
        if self.decompress {
            stem.with_extension("json")
        } else {
            stem
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: &str, output: Option<&str>, decompress: bool) -> DecryptArgs {
        DecryptArgs {
            input: input.to_string(),
            private_key: "key.pem".to_string(),
            output: output.map(str::to_string),
            decompress,
        }
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            args("/a/3f1c.gz.bin", None, false).output_path(),
            PathBuf::from("/a/3f1c.gz")
        );
        assert_eq!(
            args("/a/3f1c.gz.bin", None, true).output_path(),
            PathBuf::from("/a/3f1c.json")
        );
        assert_eq!(
            args("/a/3f1c.gz.bin", Some("/tmp/out"), true).output_path(),
            PathBuf::from("/tmp/out")
        );
    }
}
