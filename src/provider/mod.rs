//! CS-020: Provider boundary. The SDK seam the drivers call through.
//!
//! Requests are typed [`Record`]s; responses come back as JSON documents.

pub mod sim;

use crate::binder::Record;
use std::io::{Read, Seek};

/// Error returned by the provider, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: &str, message: &str) -> Self {
        ProviderError {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Codes the dry-run pipeline treats as success.
    pub fn is_dry_run_success(&self) -> bool {
        self.code == "DryRunOperation" || self.code.ends_with("NotFound")
    }

    pub fn is_not_found(&self) -> bool {
        self.code.ends_with("NotFound") || self.code.ends_with("NotFoundException")
    }
}

/// Readable, seekable upload body.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Cloud provider API.
pub trait CloudApi: Send + Sync {
    /// Invoke `service.operation` with `input`.
    fn call(
        &self,
        service: &str,
        operation: &str,
        input: &Record,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Upload a streamed body alongside `input`. The default reads the whole
    /// body and sends it base64-encoded under `Body`.
    fn upload(
        &self,
        service: &str,
        operation: &str,
        input: &Record,
        body: &mut dyn ReadSeek,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .map_err(|e| ProviderError::new("ReadError", &e.to_string()))?;
        let mut input = input.clone();
        input
            .put("Body", base64_of(&bytes), crate::binder::SetterKind::Str)
            .map_err(|e| ProviderError::new("SerializationError", &e.to_string()))?;
        self.call(service, operation, &input)
    }
}

fn base64_of(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
