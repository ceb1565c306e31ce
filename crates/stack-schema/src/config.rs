use crate::compose::{parse_compose_file, ServiceManifest};
use crate::stack::{parse_stack_file, StackManifest};
use crate::SchemaError;
use once_cell::sync::{Lazy, OnceCell};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

pub const COMPOSE_FILE_NAMES: &[&str] = &["docker-compose.yml", "docker-compose.yaml"];
pub const STACK_FILE_NAMES: &[&str] = &["stack.yml", "stack.yaml"];

static EMPTY_STACK: Lazy<StackManifest> = Lazy::new(StackManifest::default);

/// Return the first of `names` that exists under `root`.
pub fn find_manifest(root: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| root.join(n)).find(|p| p.is_file())
}

/// Both manifests of one stack, each parsed at most once.
///
/// A parse failure is not cached, so it surfaces again on every access
/// instead of degrading into a partial structure.
pub struct ConfigStore {
    root: PathBuf,
    stack: OnceCell<Option<StackManifest>>,
    services: OnceCell<ServiceManifest>,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            stack: OnceCell::new(),
            services: OnceCell::new(),
        }
    }

    /// Build a store around manifests that are already in memory.
    pub fn from_manifests(
        root: impl Into<PathBuf>,
        services: ServiceManifest,
        stack: Option<StackManifest>,
    ) -> Self {
        let store = Self::new(root);
        let _ = store.services.set(services);
        let _ = store.stack.set(stack);
        store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compose_file(&self) -> Option<PathBuf> {
        find_manifest(&self.root, COMPOSE_FILE_NAMES)
    }

    pub fn stack_file(&self) -> Option<PathBuf> {
        find_manifest(&self.root, STACK_FILE_NAMES)
    }

    /// The stack policy manifest, or `None` when the stack has no
    /// `stack.yml`.
    pub fn load_stack(&self) -> Result<Option<&StackManifest>, SchemaError> {
        let stack = self.stack.get_or_try_init(|| match self.stack_file() {
            Some(path) => {
                debug!("loading stack manifest {}", path.display());
                parse_stack_file(&path).map(Some)
            }
            None => {
                warn!("stack configuration file does not exist in {}", self.root.display());
                Ok(None)
            }
        })?;
        Ok(stack.as_ref())
    }

    /// The stack policy manifest, falling back to all-defaults when absent.
    pub fn stack(&self) -> Result<&StackManifest, SchemaError> {
        Ok(self.load_stack()?.unwrap_or(&EMPTY_STACK))
    }

    pub fn load_services(&self) -> Result<&ServiceManifest, SchemaError> {
        self.services.get_or_try_init(|| {
            let path = self.compose_file().ok_or_else(|| SchemaError::Missing {
                kind: "compose",
                root: self.root.clone(),
                candidates: COMPOSE_FILE_NAMES.join(", "),
            })?;
            debug!("loading compose manifest {}", path.display());
            parse_compose_file(&path)
        })
    }

    pub fn get_stack_property(&self, name: &str) -> Result<Option<Value>, SchemaError> {
        let value = self.load_stack()?.and_then(|s| s.property(name));
        if value.is_none() {
            debug!("stack property '{name}' does not exist");
        }
        Ok(value)
    }

    /// Verify that both manifests exist and parse. Every problem is logged.
    pub fn check_stack(&self) -> bool {
        let mut valid = true;
        if self.stack_file().is_none() {
            error!(
                "no stack manifest in {} (expected one of: {})",
                self.root.display(),
                STACK_FILE_NAMES.join(", ")
            );
            valid = false;
        } else if let Err(e) = self.load_stack() {
            error!("{e}");
            valid = false;
        }
        if let Err(e) = self.load_services() {
            error!("{e}");
            valid = false;
        }
        valid
    }
}
