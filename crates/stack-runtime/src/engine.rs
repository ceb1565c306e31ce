use crate::process::CommandRunner;
use crate::RuntimeError;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLookup {
    /// Only the local image store.
    Local,
    /// The local store, then the remote registry by exact name.
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
    pub status: String,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// The container engine, as far as the orchestrator needs it.
pub trait ContainerEngine: Send + Sync {
    fn get_image(&self, image: &str) -> Result<Option<ImageInfo>, RuntimeError>;

    /// Names in the remote registry matching `image`.
    fn search_registry(&self, image: &str) -> Result<Vec<String>, RuntimeError>;

    fn remove_image(&self, image: &str) -> Result<(), RuntimeError>;

    fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError>;

    fn image_exists(&self, image: &str, lookup: ImageLookup) -> Result<bool, RuntimeError> {
        if self.get_image(image)?.is_some() {
            return Ok(true);
        }
        if lookup == ImageLookup::Local {
            return Ok(false);
        }
        let name = strip_tag(image);
        Ok(self.search_registry(image)?.iter().any(|n| n == name))
    }

    /// Status string of a named container, `None` when no such container.
    fn container_status(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        Ok(self.get_container(name)?.map(|c| c.status))
    }
}

/// Drop a trailing `:tag`; registry searches match repository names only.
pub fn strip_tag(image: &str) -> &str {
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => name,
        _ => image,
    }
}

/// `docker` CLI backend.
pub struct DockerCli {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl DockerCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: "docker".to_owned(),
            runner,
        }
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec![self.program.clone()];
        args.extend(rest.iter().map(|s| (*s).to_owned()));
        args
    }
}

impl ContainerEngine for DockerCli {
    fn get_image(&self, image: &str) -> Result<Option<ImageInfo>, RuntimeError> {
        let out = self
            .runner
            .capture(&self.args(&["image", "inspect", "--format", "{{.Id}}", image]), None)?;
        if !out.success() {
            debug!("image '{image}' not found locally");
            return Ok(None);
        }
        Ok(Some(ImageInfo {
            name: image.to_owned(),
            id: out.stdout.trim().to_owned(),
        }))
    }

    fn search_registry(&self, image: &str) -> Result<Vec<String>, RuntimeError> {
        let term = strip_tag(image);
        let out = self.runner.capture(
            &self.args(&["search", "--no-trunc", "--format", "{{.Name}}", term]),
            None,
        )?;
        if !out.success() {
            warn!("registry search for '{image}' failed: {}", out.stderr.trim());
            return Ok(Vec::new());
        }
        Ok(out.stdout.lines().map(str::to_owned).collect())
    }

    fn remove_image(&self, image: &str) -> Result<(), RuntimeError> {
        let args = self.args(&["image", "rm", "--force", image]);
        let code = self.runner.run(&args, None, "docker")?;
        if code == 0 {
            Ok(())
        } else {
            Err(RuntimeError::CommandFailed {
                command: args.join(" "),
                code,
            })
        }
    }

    fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let out = self.runner.capture(
            &self.args(&["container", "inspect", "--format", "{{.State.Status}}", name]),
            None,
        )?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(ContainerInfo {
            name: name.to_owned(),
            status: out.stdout.trim().to_owned(),
        }))
    }
}
