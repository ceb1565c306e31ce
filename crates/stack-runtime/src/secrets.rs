//! Remote secret storage.
//!
//! The AWS backend shells out to `aws secretsmanager get-secret-value` and
//! classifies failures by the service exception named in its stderr.

use crate::process::{argv, CommandRunner};
use crate::{RuntimeError, SecretError};
use base64::Engine as _;
use serde::Deserialize;
use stack_schema::SecretsSpec;
use std::sync::Arc;
use tracing::debug;

/// A fetched secret: a JSON object of settings, or an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretValue {
    Structured(serde_json::Map<String, serde_json::Value>),
    Raw(Vec<u8>),
}

impl SecretValue {
    /// Interpret a secret string: a JSON object is structured, anything else
    /// is kept as raw bytes.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => Self::Structured(map),
            _ => Self::Raw(text.as_bytes().to_vec()),
        }
    }
}

pub trait SecretStore: Send + Sync {
    fn fetch(&self, spec: &SecretsSpec) -> Result<SecretValue, SecretError>;
}

pub struct AwsSecretsManager {
    runner: Arc<dyn CommandRunner>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueOutput {
    #[serde(default)]
    secret_string: Option<String>,
    #[serde(default)]
    secret_binary: Option<String>,
}

impl AwsSecretsManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn command(spec: &SecretsSpec) -> Vec<String> {
        let mut args = argv([
            "aws",
            "secretsmanager",
            "get-secret-value",
            "--secret-id",
            spec.name.as_str(),
            "--output",
            "json",
        ]);
        if let Some(profile) = &spec.profile {
            args.push("--profile".to_owned());
            args.push(profile.clone());
        }
        if let Some(region) = &spec.region {
            args.push("--region".to_owned());
            args.push(region.clone());
        }
        args
    }
}

impl SecretStore for AwsSecretsManager {
    fn fetch(&self, spec: &SecretsSpec) -> Result<SecretValue, SecretError> {
        debug!("fetching secret '{}'", spec.name);
        let out = self.runner.capture(&Self::command(spec), None)?;
        if !out.success() {
            return Err(classify_failure(&spec.name, out.code, &out.stderr));
        }
        parse_response(&out.stdout)
    }
}

fn parse_response(stdout: &str) -> Result<SecretValue, SecretError> {
    let response: GetSecretValueOutput =
        serde_json::from_str(stdout).map_err(|e| SecretError::Malformed(e.to_string()))?;
    if let Some(text) = response.secret_string {
        return Ok(SecretValue::from_text(&text));
    }
    if let Some(encoded) = response.secret_binary {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SecretError::Malformed(e.to_string()))?;
        return Ok(SecretValue::Raw(bytes));
    }
    Err(SecretError::Malformed(
        "response has neither SecretString nor SecretBinary".to_owned(),
    ))
}

fn classify_failure(name: &str, code: i32, stderr: &str) -> SecretError {
    let message = stderr.trim().to_owned();
    if stderr.contains("ResourceNotFoundException") {
        SecretError::NotFound(name.to_owned())
    } else if stderr.contains("DecryptionFailure") {
        SecretError::DecryptionFailure(name.to_owned())
    } else if stderr.contains("InternalServiceError") {
        SecretError::InternalService(message)
    } else if stderr.contains("InvalidParameterException") {
        SecretError::InvalidParameter(message)
    } else if stderr.contains("InvalidRequestException") {
        SecretError::InvalidRequest(message)
    } else if message.is_empty() {
        SecretError::Runtime(RuntimeError::CommandFailed {
            command: "aws secretsmanager get-secret-value".to_owned(),
            code,
        })
    } else {
        SecretError::Other(message)
    }
}
