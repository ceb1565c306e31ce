//! Effective per-service configuration.
//!
//! A property is looked up in `apps.<service>` of the stack manifest, then in
//! the service's compose descriptor, then in the descriptor's labels. The
//! first source that has the key wins, even when its value is empty.

use crate::CoreError;
use serde_yaml::Value;
use stack_schema::{
    scalar_to_string, BuildSpec, ConfigStore, KeyValues, PortEntry, ServiceDescriptor,
    ServiceName, VolumeEntry,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

pub struct ServiceResolver<'a> {
    config: &'a ConfigStore,
}

impl<'a> ServiceResolver<'a> {
    pub fn new(config: &'a ConfigStore) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a ConfigStore {
        self.config
    }

    fn descriptor(&self, service: &str) -> Result<&'a ServiceDescriptor, CoreError> {
        self.config
            .load_services()?
            .services
            .get(service)
            .ok_or_else(|| CoreError::ServiceNotFound(service.to_owned()))
    }

    /// Fail unless `service` is declared in the compose manifest.
    pub fn require(&self, service: &str) -> Result<ServiceName, CoreError> {
        self.descriptor(service)?;
        Ok(ServiceName::from(service))
    }

    pub fn resolve(&self, service: &str, property: &str) -> Result<Option<Value>, CoreError> {
        let descriptor = self.descriptor(service)?;
        if let Some(value) = self
            .config
            .stack()?
            .app(service)
            .and_then(|app| app.property(property))
        {
            return Ok(Some(value));
        }
        if let Some(value) = descriptor.property(property) {
            return Ok(Some(value));
        }
        let label = descriptor.label(property);
        if label.is_none() {
            debug!("({service}) no '{property}' property found");
        }
        Ok(label)
    }

    fn resolve_string(&self, service: &str, property: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .resolve(service, property)?
            .as_ref()
            .and_then(scalar_to_string))
    }

    fn resolve_typed<T: serde::de::DeserializeOwned>(
        &self,
        service: &str,
        property: &str,
    ) -> Result<Option<T>, CoreError> {
        self.resolve(service, property)?
            .map(|value| {
                serde_yaml::from_value(value).map_err(|e| CoreError::InvalidProperty {
                    service: service.to_owned(),
                    property: property.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn get_build(&self, service: &str) -> Result<Option<BuildSpec>, CoreError> {
        self.resolve_typed(service, "build")
    }

    /// The build context path as written in the manifest, if the service is
    /// built locally.
    pub fn get_build_context(&self, service: &str) -> Result<Option<String>, CoreError> {
        Ok(self.get_build(service)?.map(|b| b.context().to_owned()))
    }

    pub fn get_image_name(&self, service: &str) -> Result<Option<String>, CoreError> {
        self.resolve_string(service, "image")
    }

    pub fn get_container_name(&self, service: &str) -> Result<Option<String>, CoreError> {
        self.resolve_string(service, "container_name")
    }

    pub fn get_repo_url(&self, service: &str) -> Result<Option<String>, CoreError> {
        self.resolve_string(service, "repository")
    }

    pub fn get_repo_branch(&self, service: &str) -> Result<Option<String>, CoreError> {
        self.resolve_string(service, "branch")
    }

    pub fn get_ports(&self, service: &str) -> Result<Vec<PortEntry>, CoreError> {
        Ok(self.resolve_typed(service, "ports")?.unwrap_or_default())
    }

    pub fn get_volumes(&self, service: &str) -> Result<Vec<VolumeEntry>, CoreError> {
        Ok(self.resolve_typed(service, "volumes")?.unwrap_or_default())
    }

    pub fn get_environment(&self, service: &str) -> Result<BTreeMap<String, String>, CoreError> {
        Ok(self
            .resolve_typed::<KeyValues>(service, "environment")?
            .as_ref()
            .map(KeyValues::to_map)
            .unwrap_or_default())
    }

    /// Names of the stack packages the service installs.
    pub fn get_packages(&self, service: &str) -> Result<Vec<String>, CoreError> {
        Ok(self.resolve_typed(service, "packages")?.unwrap_or_default())
    }

    /// The host port published for the container's `internal` port.
    pub fn get_external_port(
        &self,
        service: &str,
        internal: &str,
    ) -> Result<Option<String>, CoreError> {
        let port = self
            .get_ports(service)?
            .iter()
            .find_map(|entry| entry.host_port_for(internal));
        if port.is_none() {
            debug!("({service}) no host port mapped to {internal}");
        }
        Ok(port)
    }

    pub fn list_services(&self) -> Result<Vec<ServiceName>, CoreError> {
        Ok(self.config.load_services()?.services.keys().cloned().collect())
    }

    pub fn list_built_services(&self) -> Result<Vec<ServiceName>, CoreError> {
        let mut built = Vec::new();
        for service in self.list_services()? {
            if self.get_build(&service)?.is_some() {
                built.push(service);
            }
        }
        Ok(built)
    }

    pub fn is_built(&self, service: &str) -> Result<bool, CoreError> {
        Ok(self.get_build(service)?.is_some())
    }

    /// `<apps-directory>/<service>`, relative to the stack root.
    pub fn subtree_prefix(&self, service: &str) -> Result<String, CoreError> {
        let apps = self.config.stack()?.apps_directory().trim_end_matches('/');
        Ok(format!("{apps}/{service}"))
    }

    /// Absolute path of the service's subtree.
    pub fn subtree_path(&self, service: &str) -> Result<PathBuf, CoreError> {
        Ok(self.config.root().join(self.subtree_prefix(service)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_schema::{parse_compose_str, parse_stack_str};

    const COMPOSE: &str = r#"
services:
  web:
    build: ./apps/web
    image: stack/web
    ports: ["8000:80"]
    labels:
      repository: B
      branch: develop
  db:
    image: mysql:5.7
    ports:
      - "3306"
    environment:
      MYSQL_ROOT_PASSWORD: secret
  worker:
    image: stack/worker
    volumes: []
"#;

    fn store(stack: &str) -> ConfigStore {
        ConfigStore::from_manifests(
            "/srv/stack",
            parse_compose_str(COMPOSE).unwrap(),
            Some(parse_stack_str(stack).unwrap()),
        )
    }

    #[test]
    fn stack_override_beats_label() {
        let config = store("apps:\n  web:\n    repository: A\n");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(resolver.get_repo_url("web").unwrap().as_deref(), Some("A"));
        assert_eq!(
            resolver.get_repo_branch("web").unwrap().as_deref(),
            Some("develop")
        );

        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(resolver.get_repo_url("web").unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn compose_value_beats_label() {
        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(
            resolver.get_image_name("web").unwrap().as_deref(),
            Some("stack/web")
        );
    }

    #[test]
    fn unknown_service_is_an_error() {
        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert!(matches!(
            resolver.resolve("ghost", "image"),
            Err(CoreError::ServiceNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn empty_value_is_not_absent() {
        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(
            resolver.resolve("worker", "volumes").unwrap(),
            Some(Value::Sequence(Vec::new()))
        );
        assert!(resolver.resolve("worker", "build").unwrap().is_none());
        assert!(!resolver.is_built("worker").unwrap());
    }

    #[test]
    fn external_ports() {
        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(
            resolver.get_external_port("web", "80").unwrap().as_deref(),
            Some("8000")
        );
        assert_eq!(
            resolver.get_external_port("db", "3306").unwrap().as_deref(),
            Some("3306")
        );
        assert!(resolver.get_external_port("worker", "80").unwrap().is_none());
    }

    #[test]
    fn lists_built_services() {
        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(resolver.list_services().unwrap().len(), 3);
        assert_eq!(resolver.list_built_services().unwrap(), vec!["web"]);
        assert_eq!(
            resolver.get_build_context("web").unwrap().as_deref(),
            Some("./apps/web")
        );
    }

    #[test]
    fn services_are_listed_in_manifest_order() {
        let config = store("");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(resolver.list_services().unwrap(), vec!["web", "db", "worker"]);
    }

    #[test]
    fn merged_descriptor_is_built() {
        let compose = r"
x-app: &app
  image: stack/web
  build: ./web
services:
  web:
    <<: *app
    container_name: web
";
        let config =
            ConfigStore::from_manifests("/srv/stack", parse_compose_str(compose).unwrap(), None);
        let resolver = ServiceResolver::new(&config);
        assert_eq!(
            resolver.get_image_name("web").unwrap().as_deref(),
            Some("stack/web")
        );
        assert_eq!(resolver.list_built_services().unwrap(), vec!["web"]);
    }

    #[test]
    fn numeric_branch_override() {
        let config = store("apps:\n  web:\n    branch: 2.0\n");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(
            resolver.get_repo_branch("web").unwrap().as_deref(),
            Some("2.0")
        );
    }

    #[test]
    fn packages_come_from_app_overrides() {
        let config = store("apps:\n  web:\n    packages: [shared-utils]\n");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(resolver.get_packages("web").unwrap(), vec!["shared-utils"]);
        assert!(resolver.get_packages("db").unwrap().is_empty());
    }

    #[test]
    fn environment_and_subtree_paths() {
        let config = store("apps-directory: src/\n");
        let resolver = ServiceResolver::new(&config);
        assert_eq!(resolver.get_environment("db").unwrap()["MYSQL_ROOT_PASSWORD"], "secret");
        assert_eq!(resolver.subtree_prefix("web").unwrap(), "src/web");
    }
}
