//! The `.env` file written from fetched secrets.

use crate::CoreError;
use stack_runtime::SecretValue;
use std::fmt::Write as _;
use std::path::Path;

pub const ENV_FILE_NAME: &str = ".env";

const BANNER: &str = "#\n# THIS IS AN AUTO-GENERATED FILE CONTAINING SENSITIVE SECRETS FOR THE STACK\n#\n";

/// Render a secret as `.env` content. Structured secrets become upper-cased
/// `KEY=value` lines under a warning banner; string values are written as
/// is, everything else as JSON. Raw secrets are returned unchanged.
pub fn render_env_file(secret: &SecretValue) -> Vec<u8> {
    match secret {
        SecretValue::Structured(map) => {
            let mut out = String::from(BANNER);
            out.push('\n');
            for (key, value) in map {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let _ = writeln!(out, "{}={value}", key.to_uppercase());
            }
            out.into_bytes()
        }
        SecretValue::Raw(bytes) => bytes.clone(),
    }
}

pub fn write_env_file(path: &Path, secret: &SecretValue) -> Result<(), CoreError> {
    std::fs::write(path, render_env_file(secret))?;
    Ok(())
}
