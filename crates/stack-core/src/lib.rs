//! Lifecycle orchestration for a local compose stack.
//!
//! This crate ties the manifests from `stack-schema` to the capabilities in
//! `stack-runtime`: the `ServiceResolver` applies three-tier property
//! precedence, the `PreconditionChecker` validates build contexts, mounts
//! and images, and the `Orchestrator` sequences every lifecycle operation
//! with its hooks. It also provides the stack lock and interrupt handling.

pub mod check;
pub mod concurrency;
pub mod envfile;
pub mod flags;
pub mod orchestrator;
pub mod resolver;

pub use check::PreconditionChecker;
pub use concurrency::{install_signal_handler, shutdown_requested, StackLock};
pub use envfile::{render_env_file, write_env_file, ENV_FILE_NAME};
pub use flags::{down_flags, recreate_flags, translate_flags, up_flags};
pub use orchestrator::{
    Backends, CheckoutOptions, DownOptions, LogOptions, Orchestrator, ReupOptions, SecretsOutcome,
    ServiceStatus, UpOptions,
};
pub use resolver::ServiceResolver;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Schema(#[from] stack_schema::SchemaError),
    #[error("runtime error: {0}")]
    Runtime(#[from] stack_runtime::RuntimeError),
    #[error("secrets error: {0}")]
    Secret(#[from] stack_runtime::SecretError),
    #[error("configuration error: service '{0}' is not defined in the compose manifest")]
    ServiceNotFound(String),
    #[error("configuration error: ({service}) no '{property}' configured")]
    PropertyNotFound { service: String, property: String },
    #[error("configuration error: ({service}) invalid '{property}': {reason}")]
    InvalidProperty {
        service: String,
        property: String,
        reason: String,
    },
    #[error("configuration error: stack property '{0}' is not configured")]
    StackPropertyNotFound(String),
    #[error("stack is invalid: ensure all paths and images are correct and try again")]
    InvalidStack,
    #[error("dirty working tree: commit or stash local changes before changing app subtrees")]
    DirtyWorkingTree,
    #[error("({service}) a subtree already exists at {path}, use checkout to change branches")]
    SubtreeExists { service: String, path: String },
    #[error("({service}) no subtree at {path}, run clone first")]
    SubtreeMissing { service: String, path: String },
    #[error("({service}) build context is invalid")]
    InvalidBuildContext { service: String },
    #[error("({service}) build failed with exit code {code}")]
    BuildFailed { service: String, code: i32 },
    #[error("({service}) {operation} failed with exit code {code}")]
    ProcessFailed {
        service: String,
        operation: String,
        code: i32,
    },
    #[error("({0}) container is not running")]
    NotRunning(String),
    #[error("(package {package}) {reason}")]
    PackageFailed { package: String, reason: String },
    #[error("({service}) purge failed: {reason}")]
    PurgeFailed { service: String, reason: String },
    #[error("{failed} of {total} services failed to {operation}")]
    Partial {
        operation: &'static str,
        failed: usize,
        total: usize,
    },
    #[error("interrupted")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
