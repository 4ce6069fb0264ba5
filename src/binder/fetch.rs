//! File, inline and URL sources for file-backed setters, plus the small
//! `{{ .key }}` template renderer applied to user data.

use super::BindError;
use crate::core::types::Params;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Read a local file.
pub fn read_file(path: &str) -> Result<Vec<u8>, BindError> {
    std::fs::read(path).map_err(|e| BindError::Fetch {
        url: path.to_string(),
        cause: e.to_string(),
    })
}

/// Read content from one of three sources:
/// - text starting with `#` is the content itself (`\n` and `\t` expanded)
/// - `http://` or `https://` is downloaded with `timeout`
/// - anything else is a file path
pub fn read_source(source: &str, timeout: Duration) -> Result<Vec<u8>, BindError> {
    if source.starts_with('#') {
        return Ok(source.replace("\\n", "\n").replace("\\t", "\t").into_bytes());
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        return download(source, timeout);
    }
    read_file(source)
}

fn download(url: &str, timeout: Duration) -> Result<Vec<u8>, BindError> {
    let fail = |cause: String| BindError::Fetch {
        url: url.to_string(),
        cause,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| fail(e.to_string()))?;
    let resp = client.get(url).send().map_err(|e| fail(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(fail(format!("unexpected status {}", status)));
    }
    resp.bytes()
        .map(|b| b.to_vec())
        .map_err(|e| fail(e.to_string()))
}

fn placeholder() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*\.([A-Za-z0-9_.-]+)\s*\}\}").ok())
        .as_ref()
}

/// Replace each `{{ .key }}` with the value of `key` in `data`.
pub fn render_template(text: &str, data: &Params) -> Result<String, String> {
    let re = placeholder().ok_or("template pattern unavailable")?;
    let mut missing = None;
    let out = re.replace_all(text, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match data.get(key) {
            Some(v) => v.to_string(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });
    if let Some(key) = missing {
        return Err(format!("no value for '{}'", key));
    }
    let rendered = out.into_owned();
    if rendered.contains("{{") {
        return Err("unclosed or invalid action".to_string());
    }
    Ok(rendered)
}
