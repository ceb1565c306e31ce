//! Build and run preconditions.
//!
//! Checks never fail with an error: every problem is logged against its
//! service and folded into the returned boolean, so one run of `check`
//! shows every broken service at once.

use crate::resolver::ServiceResolver;
use crate::CoreError;
use stack_runtime::{ContainerEngine, ImageLookup};
use std::path::Path;
use tracing::{debug, error, info, warn};

pub struct PreconditionChecker<'a> {
    resolver: ServiceResolver<'a>,
    engine: &'a dyn ContainerEngine,
}

impl<'a> PreconditionChecker<'a> {
    pub fn new(resolver: ServiceResolver<'a>, engine: &'a dyn ContainerEngine) -> Self {
        Self { resolver, engine }
    }

    fn root(&self) -> &'a Path {
        self.resolver.config().root()
    }

    /// True when the service has nothing to build, or its context directory,
    /// its Dockerfile, and every bind-mounted host path exist.
    pub fn check_build_context(&self, service: &str) -> bool {
        match self.build_context_problems(service) {
            Ok(problems) => {
                for problem in &problems {
                    error!("({service}) {problem}");
                }
                problems.is_empty()
            }
            Err(e) => {
                error!("({service}) {e}");
                false
            }
        }
    }

    fn build_context_problems(&self, service: &str) -> Result<Vec<String>, CoreError> {
        let Some(build) = self.resolver.get_build(service)? else {
            debug!("({service}) no build context, nothing to check");
            return Ok(Vec::new());
        };

        let mut problems = Vec::new();
        let context = self.root().join(build.context());
        if context.is_dir() {
            let dockerfile = context.join(build.dockerfile());
            if !dockerfile.is_file() {
                problems.push(format!("build file missing: {}", dockerfile.display()));
            }
        } else {
            problems.push(format!("build context missing: {}", context.display()));
        }

        for volume in self.resolver.get_volumes(service)? {
            let Some(source) = volume.bind_source() else {
                continue;
            };
            let host = self.root().join(source);
            if !host.exists() {
                problems.push(format!("bind mount source missing: {}", host.display()));
            }
        }
        Ok(problems)
    }

    /// True when the service's image is in the local store or, with
    /// `allow_registry`, listed in the registry under its exact name.
    pub fn check_image(&self, service: &str, allow_registry: bool) -> bool {
        let image = match self.resolver.get_image_name(service) {
            Ok(Some(image)) => image,
            Ok(None) => {
                error!("({service}) no image configured");
                return false;
            }
            Err(e) => {
                error!("({service}) {e}");
                return false;
            }
        };
        let lookup = if allow_registry {
            ImageLookup::Registry
        } else {
            ImageLookup::Local
        };
        match self.engine.image_exists(&image, lookup) {
            Ok(true) => true,
            Ok(false) => {
                warn!("({service}) image '{image}' not found");
                false
            }
            Err(e) => {
                error!("({service}) image lookup for '{image}' failed: {e}");
                false
            }
        }
    }

    /// Built services are validated on their build context, all others on
    /// the presence of their image.
    pub fn check_service(&self, service: &str) -> bool {
        match self.resolver.is_built(service) {
            Ok(true) => self.check_build_context(service),
            Ok(false) => self.check_image(service, true),
            Err(e) => {
                error!("({service}) {e}");
                false
            }
        }
    }

    /// Check one service, or every service without stopping at the first
    /// failure.
    pub fn check(&self, service: Option<&str>) -> bool {
        if let Some(service) = service {
            return self.check_service(service);
        }
        let services = match self.resolver.list_services() {
            Ok(services) => services,
            Err(e) => {
                error!("{e}");
                return false;
            }
        };
        let mut valid = true;
        for service in &services {
            if self.check_service(service) {
                debug!("({service}) ok");
            } else {
                valid = false;
            }
        }
        if valid {
            info!("all {} services are valid", services.len());
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_runtime::mock::MockEngine;
    use stack_schema::{parse_compose_str, ConfigStore};

    fn store(root: &Path, compose: &str) -> ConfigStore {
        ConfigStore::from_manifests(root, parse_compose_str(compose).unwrap(), None)
    }

    #[test]
    fn service_without_build_is_vacuously_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config = store(dir.path(), "services:\n  db:\n    image: mysql\n");
        let engine = MockEngine::new();
        let checker = PreconditionChecker::new(ServiceResolver::new(&config), &engine);
        assert!(checker.check_build_context("db"));
    }

    #[test]
    fn missing_context_fails_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let config = store(
            dir.path(),
            "services:\n  web:\n    build: ./apps/web\n  db:\n    image: mysql\n",
        );
        let engine = MockEngine::new().with_local_image("mysql");
        let checker = PreconditionChecker::new(ServiceResolver::new(&config), &engine);
        assert!(!checker.check_build_context("web"));
        assert!(!checker.check(None));
        assert!(checker.check(Some("db")));
    }

    #[test]
    fn context_needs_dockerfile_and_bind_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        let compose = "services:\n  web:\n    build:\n      context: ./apps/web\n    volumes:\n      - ./data:/data\n      - named:/var/lib\n      - /tmp/cache\n";
        let config = store(dir.path(), compose);
        let engine = MockEngine::new();
        let checker = PreconditionChecker::new(ServiceResolver::new(&config), &engine);
        assert!(!checker.check_build_context("web"));

        std::fs::write(dir.path().join("apps/web/Dockerfile"), "FROM scratch\n").unwrap();
        assert!(!checker.check_build_context("web"));

        std::fs::create_dir(dir.path().join("data")).unwrap();
        assert!(checker.check_build_context("web"));
    }

    #[test]
    fn image_lookup_falls_back_to_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = store(dir.path(), "services:\n  cache:\n    image: redis:7\n");
        let engine = MockEngine::new().with_registry_image("redis");
        let checker = PreconditionChecker::new(ServiceResolver::new(&config), &engine);
        assert!(!checker.check_image("cache", false));
        assert!(checker.check_image("cache", true));
    }

    #[test]
    fn unknown_service_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config = store(dir.path(), "services: {}\n");
        let engine = MockEngine::new();
        let checker = PreconditionChecker::new(ServiceResolver::new(&config), &engine);
        assert!(!checker.check(Some("ghost")));
        assert!(checker.check(None));
    }
}
