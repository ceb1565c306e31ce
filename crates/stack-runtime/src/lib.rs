//! External capabilities the stack orchestrator drives.
//!
//! This crate implements the execution layer: a `CommandRunner` that streams
//! child stdout/stderr into the log without deadlocking, the `HookRunner`
//! for optional lifecycle scripts, and trait-fronted backends for the
//! container engine (`docker`), the compose CLI, version control (`git
//! subtree`), remote secrets (`aws secretsmanager`), and database
//! administration (`mysql`). Every backend has an in-memory counterpart in
//! [`mock`] so orchestration can be exercised without any of those tools.

pub mod compose;
pub mod confirm;
pub mod database;
pub mod engine;
pub mod hooks;
pub mod mock;
pub mod prereq;
pub mod process;
pub mod secrets;
pub mod vcs;

pub use compose::Compose;
pub use confirm::{Confirm, FixedAnswer, TerminalConfirm};
pub use database::{quote_identifier, ConnectParams, DatabaseAdmin, DatabaseSession, MysqlCli};
pub use engine::{strip_tag, ContainerEngine, ContainerInfo, DockerCli, ImageInfo, ImageLookup};
pub use hooks::HookRunner;
pub use prereq::{check_tool_prereqs, format_missing, MissingPrereq};
pub use process::{CapturedOutput, CommandRunner, ProcessRunner, StreamKind};
pub use secrets::{AwsSecretsManager, SecretStore, SecretValue};
pub use vcs::{GitCli, Vcs};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("empty command")]
    EmptyCommand,
    #[error("'{command}' exited with code {code}")]
    CommandFailed { command: String, code: i32 },
    #[error("database error: {0}")]
    Database(String),
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("no secret could be found for name '{0}'")]
    NotFound(String),
    #[error("secret '{0}' could not be decrypted with the configured key")]
    DecryptionFailure(String),
    #[error("secret service internal error: {0}")]
    InternalService(String),
    #[error("invalid parameter for secret request: {0}")]
    InvalidParameter(String),
    #[error("invalid secret request: {0}")]
    InvalidRequest(String),
    #[error("malformed secret payload: {0}")]
    Malformed(String),
    #[error("secret retrieval failed: {0}")]
    Other(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl SecretError {
    /// A missing secret is reported but does not fail the command.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
