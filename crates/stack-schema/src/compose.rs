//! Compose-style service topology (`docker-compose.yml`).
//!
//! Only the fields the orchestrator reasons about are typed; every other key
//! of a service descriptor is kept in `extra` so property resolution can
//! still reach it.

use crate::types::ServiceName;
use crate::SchemaError;
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceManifest {
    /// Services in the order the manifest declares them.
    pub services: IndexMap<ServiceName, ServiceDescriptor>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceDescriptor {
    #[serde(default)]
    pub build: Option<BuildSpec>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub ports: Option<Vec<PortEntry>>,
    #[serde(default)]
    pub volumes: Option<Vec<VolumeEntry>>,
    #[serde(default)]
    pub environment: Option<KeyValues>,
    #[serde(default)]
    pub labels: Option<KeyValues>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ServiceDescriptor {
    pub fn ports(&self) -> &[PortEntry] {
        self.ports.as_deref().unwrap_or_default()
    }

    pub fn volumes(&self) -> &[VolumeEntry] {
        self.volumes.as_deref().unwrap_or_default()
    }

    pub fn environment(&self) -> BTreeMap<String, String> {
        self.environment.as_ref().map(KeyValues::to_map).unwrap_or_default()
    }

    /// Look up a compose-level attribute by its manifest key.
    ///
    /// Returns `None` only when the key is absent (or explicitly null);
    /// an empty list is still `Some`.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "build" => self.build.as_ref().and_then(|b| serde_yaml::to_value(b).ok()),
            "image" => self.image.clone().map(Value::String),
            "container_name" => self.container_name.clone().map(Value::String),
            "ports" => self.ports.as_ref().and_then(|p| serde_yaml::to_value(p).ok()),
            "volumes" => self.volumes.as_ref().and_then(|v| serde_yaml::to_value(v).ok()),
            "environment" => self
                .environment
                .as_ref()
                .and_then(|e| serde_yaml::to_value(e).ok()),
            "labels" => self.labels.as_ref().and_then(|l| serde_yaml::to_value(l).ok()),
            other => self.extra.get(other).filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Look up a label, the lowest-precedence override source.
    pub fn label(&self, name: &str) -> Option<Value> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(name))
            .map(Value::String)
    }
}

/// `build:` is either a bare context path or a mapping with a `context`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BuildSpec {
    Context(String),
    Detailed {
        context: String,
        #[serde(default)]
        dockerfile: Option<String>,
        #[serde(flatten)]
        extra: BTreeMap<String, Value>,
    },
}

impl BuildSpec {
    pub fn context(&self) -> &str {
        match self {
            Self::Context(c) | Self::Detailed { context: c, .. } => c,
        }
    }

    pub fn dockerfile(&self) -> &str {
        match self {
            Self::Detailed {
                dockerfile: Some(d),
                ..
            } => d,
            _ => "Dockerfile",
        }
    }
}

/// One entry of `ports:`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PortEntry {
    Number(u32),
    Text(String),
    Long {
        target: u32,
        #[serde(default)]
        published: Option<Value>,
    },
}

impl PortEntry {
    /// The host-side port of this mapping when its container side is
    /// `internal`. A bare port equal to `internal` maps to itself.
    pub fn host_port_for(&self, internal: &str) -> Option<String> {
        match self {
            Self::Number(n) => (n.to_string() == internal).then(|| internal.to_owned()),
            Self::Long { target, published } => (target.to_string() == internal).then(|| {
                published
                    .as_ref()
                    .and_then(scalar_to_string)
                    .unwrap_or_else(|| target.to_string())
            }),
            Self::Text(spec) => {
                let spec = spec.split('/').next().unwrap_or(spec);
                let mut parts = spec.rsplit(':');
                let container = parts.next()?;
                if container != internal {
                    return None;
                }
                match parts.next() {
                    Some(host) if !host.is_empty() => Some(host.to_owned()),
                    Some(_) => None,
                    None => Some(container.to_owned()),
                }
            }
        }
    }
}

/// One entry of `volumes:`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum VolumeEntry {
    Short(String),
    Long {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        source: Option<String>,
        target: String,
    },
}

impl VolumeEntry {
    /// The host path of a bind mount. Named volumes and container-only
    /// paths return `None`.
    pub fn bind_source(&self) -> Option<&str> {
        match self {
            Self::Short(spec) => {
                let (host, _) = spec.split_once(':')?;
                host.contains('/').then_some(host)
            }
            Self::Long {
                kind: Some(kind),
                source: Some(source),
                ..
            } if kind == "bind" => Some(source),
            Self::Long { .. } => None,
        }
    }
}

/// `environment:` and `labels:` accept either a mapping or `KEY=value` list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum KeyValues {
    Map(BTreeMap<String, Value>),
    List(Vec<String>),
}

impl Default for KeyValues {
    fn default() -> Self {
        Self::Map(BTreeMap::new())
    }
}

impl KeyValues {
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::Map(map) => map.get(key).and_then(scalar_to_string),
            Self::List(list) => list.iter().find_map(|entry| {
                let (k, v) = entry.split_once('=')?;
                (k == key).then(|| v.to_owned())
            }),
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        match self {
            Self::Map(map) => map
                .iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
                .collect(),
            Self::List(list) => list
                .iter()
                .filter_map(|entry| {
                    let (k, v) = entry.split_once('=')?;
                    Some((k.to_owned(), v.to_owned()))
                })
                .collect(),
        }
    }
}

/// Render a scalar YAML value as text; mappings and sequences have none.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept any scalar where a string is expected (`branch: 2.0`).
pub(crate) fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a string, number, or boolean")),
    }
}

/// Parse YAML text with `<<: *anchor` merge keys resolved.
pub(crate) fn parse_merged(input: &str) -> Result<Value, SchemaError> {
    let mut value: Value = serde_yaml::from_str(input)?;
    value.apply_merge()?;
    Ok(value)
}

pub fn parse_compose_str(input: &str) -> Result<ServiceManifest, SchemaError> {
    Ok(serde_yaml::from_value(parse_merged(input)?)?)
}

pub fn parse_compose_file(path: impl AsRef<Path>) -> Result<ServiceManifest, SchemaError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_compose_str(&content).map_err(|e| match e {
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

    const COMPOSE: &str = r#"
version: "3.8"
services:
  db:
    image: mysql:5.7
    container_name: stack-db
    ports:
      - "3307:3306"
    environment:
      MYSQL_ROOT_PASSWORD: secret
      MYSQL_PORT: 3306
  web:
    build:
      context: ./apps/web
      dockerfile: Dockerfile.dev
    image: stack/web
    ports:
      - 8000
      - "127.0.0.1:8443:443/tcp"
    volumes:
      - ./apps/web:/app
      - static:/static
      - /var/cache
    labels:
      - repository=git@example.com:org/web.git
      - branch=develop
    depends_on:
      - db
  worker:
    build: ./apps/worker
"#;

    #[test]
    fn parses_services_and_typed_fields() {
        let manifest = parse_compose_str(COMPOSE).unwrap();
        assert_eq!(manifest.services.len(), 3);
        let web = &manifest.services[&ServiceName::from("web")];
        assert_eq!(web.build.as_ref().unwrap().context(), "./apps/web");
        assert_eq!(web.build.as_ref().unwrap().dockerfile(), "Dockerfile.dev");
        assert_eq!(web.image.as_deref(), Some("stack/web"));
        assert_eq!(web.volumes().len(), 3);
        assert!(web.extra.contains_key("depends_on"));
        assert!(manifest.extra.contains_key("version"));
    }

    #[test]
    fn bare_build_context_uses_default_dockerfile() {
        let manifest = parse_compose_str(COMPOSE).unwrap();
        let worker = &manifest.services[&ServiceName::from("worker")];
        let build = worker.build.as_ref().unwrap();
        assert_eq!(build.context(), "./apps/worker");
        assert_eq!(build.dockerfile(), "Dockerfile");
    }

    #[test]
    fn services_keep_declaration_order() {
        let manifest =
            parse_compose_str("services:\n  web: {}\n  db: {}\n  api: {}\n").unwrap();
        let names: Vec<&str> = manifest.services.keys().map(ServiceName::as_str).collect();
        assert_eq!(names, vec!["web", "db", "api"]);
    }

    #[test]
    fn merge_keys_are_applied() {
        let manifest = parse_compose_str(
            r"
x-app: &app
  image: stack/web
  build: ./web
services:
  web:
    <<: *app
    container_name: web
",
        )
        .unwrap();
        let web = &manifest.services["web"];
        assert_eq!(web.image.as_deref(), Some("stack/web"));
        assert_eq!(web.build.as_ref().map(BuildSpec::context), Some("./web"));
        assert_eq!(web.container_name.as_deref(), Some("web"));
        assert!(!web.extra.contains_key("<<"));
    }

    #[test]
    fn rejects_manifest_without_services() {
        assert!(parse_compose_str("version: '3'\n").is_err());
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(parse_compose_str("services: [unclosed").is_err());
    }

    #[test]
    fn port_matching_forms() {
        let mapped = PortEntry::Text("3307:3306".to_owned());
        assert_eq!(mapped.host_port_for("3306").as_deref(), Some("3307"));
        assert_eq!(mapped.host_port_for("3307"), None);

        let bare = PortEntry::Text("3306".to_owned());
        assert_eq!(bare.host_port_for("3306").as_deref(), Some("3306"));

        let number = PortEntry::Number(8000);
        assert_eq!(number.host_port_for("8000").as_deref(), Some("8000"));

        let with_ip = PortEntry::Text("127.0.0.1:8443:443/tcp".to_owned());
        assert_eq!(with_ip.host_port_for("443").as_deref(), Some("8443"));

        let long = PortEntry::Long {
            target: 80,
            published: Some(Value::Number(8080.into())),
        };
        assert_eq!(long.host_port_for("80").as_deref(), Some("8080"));
    }

    #[test]
    fn only_path_volumes_are_binds() {
        assert_eq!(
            VolumeEntry::Short("./apps/web:/app".to_owned()).bind_source(),
            Some("./apps/web")
        );
        assert_eq!(VolumeEntry::Short("static:/static".to_owned()).bind_source(), None);
        assert_eq!(VolumeEntry::Short("/var/cache".to_owned()).bind_source(), None);
        let long = VolumeEntry::Long {
            kind: Some("bind".to_owned()),
            source: Some("./data".to_owned()),
            target: "/data".to_owned(),
        };
        assert_eq!(long.bind_source(), Some("./data"));
    }

    #[test]
    fn key_values_accept_map_and_list() {
        let manifest = parse_compose_str(COMPOSE).unwrap();
        let db = &manifest.services[&ServiceName::from("db")];
        let env = db.environment();
        assert_eq!(env.get("MYSQL_ROOT_PASSWORD").map(String::as_str), Some("secret"));
        assert_eq!(env.get("MYSQL_PORT").map(String::as_str), Some("3306"));
        let web = &manifest.services[&ServiceName::from("web")];
        assert_eq!(
            web.label("branch"),
            Some(Value::String("develop".to_owned()))
        );
        assert_eq!(web.labels.as_ref().unwrap().to_map().len(), 2);
    }

    #[test]
    fn property_distinguishes_absent_from_empty() {
        let manifest = parse_compose_str(COMPOSE).unwrap();
        let empty = parse_compose_str("services:\n  x:\n    volumes: []\n").unwrap();
        let x = &empty.services[&ServiceName::from("x")];
        let volumes = x.property("volumes").unwrap();
        assert_eq!(volumes.as_sequence().map(Vec::len), Some(0));
        let worker = &manifest.services[&ServiceName::from("worker")];
        assert!(worker.property("image").is_none());
        assert!(worker.property("volumes").is_none());
        assert!(worker.volumes().is_empty());
        assert!(worker.property("depends_on").is_none());
        let web = &manifest.services[&ServiceName::from("web")];
        assert!(web.property("depends_on").is_some());
    }
}
