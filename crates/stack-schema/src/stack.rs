//! Stack policy file (`stack.yml`).
//!
//! Later revisions of the file wrap every property under a top-level
//! `stack:` key; both layouts parse to the same structure.

use crate::compose::{deserialize_scalar, parse_merged};
use crate::types::ServiceName;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_APPS_DIRECTORY: &str = "apps";
pub const DEFAULT_HOOKS_DIRECTORY: &str = "hooks";
pub const DEFAULT_COMPOSE_COMMAND: &str = "docker-compose";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct StackManifest {
    #[serde(default)]
    pub apps_directory: Option<String>,
    #[serde(default)]
    pub hooks_directory: Option<String>,
    #[serde(default)]
    pub compose_command: Option<String>,
    #[serde(default)]
    pub apps: BTreeMap<ServiceName, AppOverrides>,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(default)]
    pub index: Option<IndexSpec>,
    #[serde(default)]
    pub secrets: Option<SecretsSpec>,
    #[serde(default)]
    pub database: Option<DatabaseSpec>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StackManifest {
    pub fn apps_directory(&self) -> &str {
        self.apps_directory
            .as_deref()
            .unwrap_or(DEFAULT_APPS_DIRECTORY)
    }

    pub fn hooks_directory(&self) -> &str {
        self.hooks_directory
            .as_deref()
            .unwrap_or(DEFAULT_HOOKS_DIRECTORY)
    }

    /// The compose invocation split into program and leading arguments,
    /// e.g. `docker compose` becomes `["docker", "compose"]`.
    pub fn compose_command(&self) -> Vec<String> {
        self.compose_command
            .as_deref()
            .unwrap_or(DEFAULT_COMPOSE_COMMAND)
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }

    pub fn app(&self, service: &str) -> Option<&AppOverrides> {
        self.apps.get(service)
    }

    pub fn package(&self, name: &str) -> Option<&PackageSpec> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Look up a top-level property by its manifest key.
    pub fn property(&self, name: &str) -> Option<Value> {
        fn value_of<T: Serialize>(v: &T) -> Option<Value> {
            serde_yaml::to_value(v).ok()
        }
        match name {
            "apps-directory" => self.apps_directory.clone().map(Value::String),
            "hooks-directory" => self.hooks_directory.clone().map(Value::String),
            "compose-command" => self.compose_command.clone().map(Value::String),
            "apps" if !self.apps.is_empty() => value_of(&self.apps),
            "packages" if !self.packages.is_empty() => value_of(&self.packages),
            "index" => self.index.as_ref().and_then(value_of),
            "secrets" => self.secrets.as_ref().and_then(value_of),
            "database" => self.database.as_ref().and_then(value_of),
            "apps" | "packages" => None,
            other => self.extra.get(other).filter(|v| !v.is_null()).cloned(),
        }
    }
}

/// Per-service overrides under `apps.<service>`; the highest-precedence
/// source during property resolution.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppOverrides {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub branch: Option<String>,
    #[serde(default)]
    pub packages: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AppOverrides {
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "repository" => self.repository.clone().map(Value::String),
            "branch" => self.branch.clone().map(Value::String),
            "packages" => self
                .packages
                .as_ref()
                .and_then(|p| serde_yaml::to_value(p).ok()),
            other => self.extra.get(other).filter(|v| !v.is_null()).cloned(),
        }
    }
}

/// A locally developed package that apps install from the stack's index.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub path: String,
    pub build: CommandSpec,
}

/// A command given either as a shell string or an argument list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandSpec {
    Shell(String),
    Args(Vec<String>),
}

impl CommandSpec {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Shell(line) => vec!["sh".to_owned(), "-c".to_owned(), line.clone()],
            Self::Args(args) => args.clone(),
        }
    }
}

/// The package index service packages are uploaded to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct IndexSpec {
    #[serde(default = "default_index_service")]
    pub service: String,
    #[serde(default = "default_index_port")]
    pub port: String,
    #[serde(default = "default_index_path")]
    pub path: String,
    #[serde(default = "default_index_user")]
    pub user: String,
    #[serde(default = "default_index_password_variable")]
    pub password_variable: String,
}

fn default_index_service() -> String {
    "devpi".to_owned()
}

fn default_index_port() -> String {
    "3141".to_owned()
}

fn default_index_path() -> String {
    "/root/public/".to_owned()
}

fn default_index_user() -> String {
    "root".to_owned()
}

fn default_index_password_variable() -> String {
    "DEVPI_PASSWORD".to_owned()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SecretsSpec {
    pub name: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Where `reup --purge` finds the database to reset.
///
/// An explicit `service` wins; otherwise the single service whose image
/// contains `marker` is used.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseSpec {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default = "default_database_marker")]
    pub marker: String,
    #[serde(default = "default_database_port")]
    pub port: String,
    #[serde(default = "default_database_user")]
    pub user: String,
    #[serde(default = "default_database_password_variable")]
    pub password_variable: String,
}

impl Default for DatabaseSpec {
    fn default() -> Self {
        Self {
            service: None,
            marker: default_database_marker(),
            port: default_database_port(),
            user: default_database_user(),
            password_variable: default_database_password_variable(),
        }
    }
}

fn default_database_marker() -> String {
    "mysql".to_owned()
}

fn default_database_port() -> String {
    "3306".to_owned()
}

fn default_database_user() -> String {
    "root".to_owned()
}

fn default_database_password_variable() -> String {
    "MYSQL_ROOT_PASSWORD".to_owned()
}

/// Unwrap the optional top-level `stack:` key.
fn unwrap_stack_key(value: Value) -> Value {
    match value {
        Value::Mapping(mut map) if map.len() == 1 && map.contains_key("stack") => {
            map.remove("stack").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub fn parse_stack_str(input: &str) -> Result<StackManifest, SchemaError> {
    match unwrap_stack_key(parse_merged(input)?) {
        Value::Null => Ok(StackManifest::default()),
        value => Ok(serde_yaml::from_value(value)?),
    }
}

pub fn parse_stack_file(path: impl AsRef<Path>) -> Result<StackManifest, SchemaError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stack_str(&content).map_err(|e| match e {
        SchemaError::ParseYaml(source) => SchemaError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"
stack:
  apps-directory: src
  index:
    service: pypi
  secrets:
    name: dev/stack
    profile: dev
    region: us-east-1
  apps:
    web:
      repository: git@example.com:org/web.git
      branch: main
      packages: [shared-utils]
      tier: frontend
  packages:
    - name: shared-utils
      path: ./packages/shared-utils
      build: python setup.py sdist
  banner: hello
"#;

    #[test]
    fn parses_wrapped_manifest() {
        let stack = parse_stack_str(STACK).unwrap();
        assert_eq!(stack.apps_directory(), "src");
        assert_eq!(stack.hooks_directory(), "hooks");
        let web = stack.app("web").unwrap();
        assert_eq!(web.repository.as_deref(), Some("git@example.com:org/web.git"));
        assert_eq!(web.packages.as_deref(), Some(&["shared-utils".to_owned()][..]));
        assert_eq!(
            web.property("tier"),
            Some(Value::String("frontend".to_owned()))
        );
        let secrets = stack.secrets.as_ref().unwrap();
        assert_eq!(secrets.region.as_deref(), Some("us-east-1"));
        let index = stack.index.as_ref().unwrap();
        assert_eq!(index.service, "pypi");
        assert_eq!(index.port, "3141");
    }

    #[test]
    fn parses_unwrapped_manifest() {
        let stack = parse_stack_str("apps-directory: apps\ncustom: 3\n").unwrap();
        assert_eq!(stack.apps_directory(), "apps");
        assert_eq!(stack.property("custom"), Some(Value::Number(3.into())));
    }

    #[test]
    fn empty_file_is_default() {
        let stack = parse_stack_str("").unwrap();
        assert_eq!(stack, StackManifest::default());
        assert_eq!(stack.apps_directory(), DEFAULT_APPS_DIRECTORY);
    }

    #[test]
    fn property_lookup_reports_absence() {
        let stack = parse_stack_str(STACK).unwrap();
        assert_eq!(
            stack.property("banner"),
            Some(Value::String("hello".to_owned()))
        );
        assert!(stack.property("missing").is_none());
        assert!(stack.property("database").is_none());
        assert!(stack.property("apps").is_some());
        assert!(stack.property("hooks-directory").is_none());
    }

    #[test]
    fn package_build_command_forms() {
        let stack = parse_stack_str(STACK).unwrap();
        let pkg = stack.package("shared-utils").unwrap();
        assert_eq!(
            pkg.build.to_args(),
            vec!["sh", "-c", "python setup.py sdist"]
        );
        let args = CommandSpec::Args(vec!["make".to_owned(), "dist".to_owned()]);
        assert_eq!(args.to_args(), vec!["make", "dist"]);
    }

    #[test]
    fn compose_command_is_split() {
        let stack = parse_stack_str("compose-command: docker compose\n").unwrap();
        assert_eq!(stack.compose_command(), vec!["docker", "compose"]);
        assert_eq!(StackManifest::default().compose_command(), vec!["docker-compose"]);
    }

    #[test]
    fn database_defaults() {
        let stack = parse_stack_str("database:\n  service: db\n").unwrap();
        let db = stack.database.unwrap();
        assert_eq!(db.service.as_deref(), Some("db"));
        assert_eq!(db.marker, "mysql");
        assert_eq!(db.password_variable, "MYSQL_ROOT_PASSWORD");
    }

    #[test]
    fn numeric_branch_is_read_as_text() {
        let stack = parse_stack_str(
            "apps:\n  web:\n    repository: git@host/web.git\n    branch: 2.0\n  api:\n    branch: 2024\n",
        )
        .unwrap();
        assert_eq!(stack.app("web").unwrap().branch.as_deref(), Some("2.0"));
        assert_eq!(stack.app("api").unwrap().branch.as_deref(), Some("2024"));
        assert!(parse_stack_str("apps:\n  web:\n    branch: [a]\n").is_err());
    }

    #[test]
    fn merge_keys_are_applied() {
        let stack = parse_stack_str(
            "stack:\n  defaults: &defaults\n    branch: develop\n  apps:\n    web:\n      <<: *defaults\n      repository: git@host/web.git\n",
        )
        .unwrap();
        let web = stack.app("web").unwrap();
        assert_eq!(web.branch.as_deref(), Some("develop"));
        assert!(web.extra.is_empty());
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(parse_stack_str("apps: [").is_err());
        assert!(parse_stack_str("apps: 5").is_err());
    }
}
