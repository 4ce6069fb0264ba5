//! Credentials file appends for `create accesskey`.
//!
//! The file is only ever appended to: one `[profile]` section per new key.

use super::DriverError;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub profile: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

fn key_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9/+=]{20,60}$").ok())
        .as_ref()
}

fn well_formed(key: &str) -> bool {
    key_pattern().is_some_and(|re| re.is_match(key))
}

impl Credentials {
    pub fn validate(&self) -> Result<(), DriverError> {
        let fail = |m: &str| Err(DriverError::Other(m.to_string()));
        if self.secret_access_key.is_empty() {
            return fail("given empty secret access key");
        }
        if !well_formed(&self.secret_access_key) {
            return fail("given invalid secret access key");
        }
        if self.access_key_id.is_empty() {
            return fail("given empty access key");
        }
        if !well_formed(&self.access_key_id) {
            return fail("given invalid access key");
        }
        Ok(())
    }

    /// Profile section as appended to the file.
    pub fn section(&self) -> String {
        format!(
            "\n[{}]\naws_access_key_id = {}\naws_secret_access_key = {}\n",
            self.profile, self.access_key_id, self.secret_access_key
        )
    }
}

/// Append `creds` to the credentials file at `path`, creating its directory
/// (0700) and the file (0600) when missing. Returns whether the directory was
/// created.
pub fn append_credentials(path: &Path, creds: &Credentials) -> Result<bool, DriverError> {
    creds.validate()?;
    let mut created = false;
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            create_private_dir(dir)
                .map_err(|e| DriverError::Other(format!("creating '{}': {}", dir.display(), e)))?;
            created = true;
        }
    }
    let mut opts = std::fs::OpenOptions::new();
    opts.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts
        .open(path)
        .map_err(|e| DriverError::Other(format!("appending to '{}': {}", path.display(), e)))?;
    file.write_all(creds.section().as_bytes())?;
    Ok(created)
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
