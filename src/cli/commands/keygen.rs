//! Keygen command implementation
//!
//! Generates the RSA key pair a study uses to encrypt artifacts. The private
//! key stays with the study; the public key goes into every device's
//! configuration.

use crate::encryption::ArtifactPrivateKey;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the keygen command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// RSA modulus size in bits
    #[arg(long, default_value_t = 2048)]
    pub bits: usize,

    /// Where to write the private key (PKCS#8 PEM)
    #[arg(short, long, default_value = "sensorvault_private.pem")]
    pub output: String,

    /// Overwrite an existing private key file
    #[arg(long)]
    pub force: bool,
}

impl KeygenArgs {
    /// Execute the keygen command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        if !(2048..=8192).contains(&self.bits) {
            eprintln!("❌ Key size must be between 2048 and 8192 bits");
            return Ok(2);
        }
        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Private key file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        println!("🔑 Generating {}-bit RSA key pair...", self.bits);
        let bits = self.bits;
        let private_key =
            tokio::task::spawn_blocking(move || ArtifactPrivateKey::generate(bits)).await??;
        let public_key = private_key.public_key().to_base64_der()?;

        write_private_key(Path::new(&self.output), private_key.to_pem()?.as_bytes())?;
        tracing::info!(output = %self.output, bits = self.bits, "Generated artifact key pair");

        println!("✅ Private key written to {}", self.output);
        println!("   Keep it off the devices that collect data.");
        println!();
        println!("Add the public key to the device configuration:");
        println!();
        println!("[local_store]");
        println!("encrypt = true");
        println!("public_key = \"{public_key}\"");
        println!();
        Ok(0)
    }
}

fn write_private_key(path: &Path, pem: &[u8]) -> std::io::Result<()> {
    fs::write(path, pem)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
