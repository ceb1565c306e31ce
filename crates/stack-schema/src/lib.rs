//! Manifest parsing and configuration lookup for stack.
//!
//! This crate defines the schema layer: the compose-style service topology
//! (`ServiceManifest`), the stack policy file (`StackManifest`), manifest
//! discovery inside a stack root, and the `ConfigStore` that parses each
//! manifest at most once per process.

pub mod compose;
pub mod config;
pub mod stack;
pub mod types;

pub use compose::{
    parse_compose_file, parse_compose_str, scalar_to_string, BuildSpec, KeyValues, PortEntry,
    ServiceDescriptor, ServiceManifest, VolumeEntry,
};
pub use config::{find_manifest, ConfigStore, COMPOSE_FILE_NAMES, STACK_FILE_NAMES};
pub use stack::{
    parse_stack_file, parse_stack_str, AppOverrides, CommandSpec, DatabaseSpec, IndexSpec,
    PackageSpec, SecretsSpec, StackManifest, DEFAULT_APPS_DIRECTORY, DEFAULT_COMPOSE_COMMAND,
    DEFAULT_HOOKS_DIRECTORY,
};
pub use types::ServiceName;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse manifest: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("no {kind} manifest found in {root} (looked for {candidates})")]
    Missing {
        kind: &'static str,
        root: PathBuf,
        candidates: String,
    },
}
