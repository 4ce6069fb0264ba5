//! Local RSA keypair generation for `create keypair`.
//!
//! The private key stays on disk under the keys directory; only the public
//! half, in OpenSSH `authorized_keys` form, is sent to the provider.

use super::DriverError;
use base64::Engine;
use openssl::rsa::Rsa;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const KEY_BITS: u32 = 4096;

pub struct KeyPair {
    pub private_pem: Vec<u8>,
    pub public_ssh: String,
}

/// Generate an RSA key of `bits` bits.
pub fn generate(bits: u32) -> Result<KeyPair, DriverError> {
    let gen_err = |e: openssl::error::ErrorStack| DriverError::Other(format!("generating key: {}", e));
    let rsa = Rsa::generate(bits).map_err(gen_err)?;
    let private_pem = rsa.private_key_to_pem().map_err(gen_err)?;
    let public_ssh = ssh_public_key(&rsa.e().to_vec(), &rsa.n().to_vec());
    Ok(KeyPair {
        private_pem,
        public_ssh,
    })
}

fn put_string(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

/// SSH `mpint`: big-endian, with a leading zero when the high bit is set.
fn put_mpint(buf: &mut Vec<u8>, magnitude: &[u8]) {
    if magnitude.first().is_some_and(|b| b & 0x80 != 0) {
        let mut padded = Vec::with_capacity(magnitude.len() + 1);
        padded.push(0);
        padded.extend_from_slice(magnitude);
        put_string(buf, &padded);
    } else {
        put_string(buf, magnitude);
    }
}

fn ssh_public_key(e: &[u8], n: &[u8]) -> String {
    let mut blob = Vec::new();
    put_string(&mut blob, b"ssh-rsa");
    put_mpint(&mut blob, e);
    put_mpint(&mut blob, n);
    format!("ssh-rsa {}", base64::engine::general_purpose::STANDARD.encode(blob))
}

/// `<keys_dir>/<name>.pem`, failing when the directory is unset or the file
/// already exists.
pub fn private_key_path(keys_dir: Option<&Path>, name: &str) -> Result<PathBuf, DriverError> {
    let dir = keys_dir.ok_or_else(|| {
        DriverError::Other(format!(
            "empty env var '{}'",
            crate::core::settings::KEYS_DIR_ENV
        ))
    })?;
    let path = dir.join(format!("{}.pem", name));
    if path.exists() {
        return Err(DriverError::Other(format!(
            "file already exists at path: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Write the private key with mode 0600. Never overwrites.
pub fn write_private_key(path: &Path, pem: &[u8]) -> Result<(), DriverError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts
        .open(path)
        .map_err(|e| DriverError::Other(format!("saving private key: {}", e)))?;
    file.write_all(pem)?;
    Ok(())
}
