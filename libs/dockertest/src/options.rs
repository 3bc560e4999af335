// Container options and the resolved create request they produce
use crate::container::{noop_callback, ContainerCallback};
use bollard::container::Config;
use bollard::models::HostConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Host address every published port is bound to
pub const PUBLISH_HOST_IP: &str = "0.0.0.0";

const DEFAULT_NAME_PREFIX: &str = "dockertest";
const DEFAULT_IMAGE_TAG: &str = "latest";

/// Publish a container port on a specific host port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Container side, e.g. `3306` or `3306/tcp`
    pub container_port: String,
    pub host_port: u16,
}

impl PortBinding {
    pub fn new(container_port: impl Into<String>, host_port: u16) -> Self {
        Self {
            container_port: container_port.into(),
            host_port,
        }
    }
}

/// A single container option.
///
/// Options are applied in order: scalar options (name, repository, tag,
/// health checker) replace whatever came before, list options append.
#[derive(Clone)]
pub enum ContainerOption {
    Name(String),
    ImageRepository(String),
    ImageTag(String),
    ExposePorts(Vec<String>),
    HostPortBindings(Vec<PortBinding>),
    Env(Vec<String>),
    RunArgs(Vec<String>),
    HealthChecker(ContainerCallback),
}

impl fmt::Debug for ContainerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(v) => f.debug_tuple("Name").field(v).finish(),
            Self::ImageRepository(v) => f.debug_tuple("ImageRepository").field(v).finish(),
            Self::ImageTag(v) => f.debug_tuple("ImageTag").field(v).finish(),
            Self::ExposePorts(v) => f.debug_tuple("ExposePorts").field(v).finish(),
            Self::HostPortBindings(v) => f.debug_tuple("HostPortBindings").field(v).finish(),
            Self::Env(v) => f.debug_tuple("Env").field(v).finish(),
            Self::RunArgs(v) => f.debug_tuple("RunArgs").field(v).finish(),
            Self::HealthChecker(_) => f.write_str("HealthChecker(..)"),
        }
    }
}

/// Container name prefix; a UUID suffix is always appended
pub fn name(prefix: impl Into<String>) -> ContainerOption {
    ContainerOption::Name(prefix.into())
}

pub fn image_repository(repository: impl Into<String>) -> ContainerOption {
    ContainerOption::ImageRepository(repository.into())
}

pub fn image_tag(tag: impl Into<String>) -> ContainerOption {
    ContainerOption::ImageTag(tag.into())
}

pub fn expose_ports<I, S>(ports: I) -> ContainerOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ContainerOption::ExposePorts(ports.into_iter().map(Into::into).collect())
}

pub fn host_port_bindings(bindings: impl IntoIterator<Item = PortBinding>) -> ContainerOption {
    ContainerOption::HostPortBindings(bindings.into_iter().collect())
}

/// Environment entries in `KEY=VALUE` form
pub fn docker_env<I, S>(env: I) -> ContainerOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ContainerOption::Env(env.into_iter().map(Into::into).collect())
}

/// Command override; the image default runs when this is never given
pub fn run_options<I, S>(args: I) -> ContainerOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ContainerOption::RunArgs(args.into_iter().map(Into::into).collect())
}

pub fn health_checker(checker: ContainerCallback) -> ContainerOption {
    ContainerOption::HealthChecker(checker)
}

/// Normalize a port to Docker's `<port>/<proto>` key, defaulting to tcp
pub fn normalize_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{}/tcp", port)
    }
}

/// Everything needed to create a container, resolved from a list of options
#[derive(Clone)]
pub struct ContainerSpec {
    pub name_prefix: String,
    pub image_repository: String,
    pub image_tag: String,
    pub exposed_ports: Vec<String>,
    pub port_bindings: Vec<PortBinding>,
    pub env: Vec<String>,
    pub run_args: Vec<String>,
    pub health_checker: ContainerCallback,
}

impl Default for ContainerSpec {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            image_repository: String::new(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            exposed_ports: Vec::new(),
            port_bindings: Vec::new(),
            env: Vec::new(),
            run_args: Vec::new(),
            health_checker: noop_callback(),
        }
    }
}

impl ContainerSpec {
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = ContainerOption>,
    {
        let mut spec = Self::default();
        for option in options {
            spec.apply(option);
        }
        spec
    }

    pub fn apply(&mut self, option: ContainerOption) {
        match option {
            ContainerOption::Name(prefix) => self.name_prefix = prefix,
            ContainerOption::ImageRepository(repository) => self.image_repository = repository,
            ContainerOption::ImageTag(tag) => self.image_tag = tag,
            ContainerOption::ExposePorts(ports) => self.exposed_ports.extend(ports),
            ContainerOption::HostPortBindings(bindings) => self.port_bindings.extend(bindings),
            ContainerOption::Env(env) => self.env.extend(env),
            ContainerOption::RunArgs(args) => self.run_args.extend(args),
            ContainerOption::HealthChecker(checker) => self.health_checker = checker,
        }
    }

    /// `repository:tag`
    pub fn image(&self) -> String {
        format!("{}:{}", self.image_repository, self.image_tag)
    }

    /// Container name with a fresh unique suffix
    pub fn generate_name(&self) -> String {
        format!("{}-{}", self.name_prefix, uuid::Uuid::new_v4())
    }

    /// Host port for every published container port.
    ///
    /// Exposed ports map to the same host port unless an explicit binding
    /// names them; bindings for ports never exposed are published too.
    pub fn published_ports(&self) -> Vec<(String, String)> {
        let mut published: Vec<(String, String)> = Vec::new();

        for port in &self.exposed_ports {
            let key = normalize_port(port);
            if published.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            let host_port = port.split('/').next().unwrap_or(port.as_str()).to_string();
            published.push((key, host_port));
        }

        for binding in &self.port_bindings {
            let key = normalize_port(&binding.container_port);
            let host_port = binding.host_port.to_string();
            match published.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = host_port,
                None => published.push((key, host_port)),
            }
        }

        published
    }

    /// Build the engine create request
    pub fn to_config(&self) -> Config<String> {
        let published = self.published_ports();

        let (exposed_ports, port_bindings) = if published.is_empty() {
            (None, None)
        } else {
            let mut exposed = HashMap::new();
            let mut bindings = HashMap::new();
            for (port, host_port) in published {
                exposed.insert(port.clone(), HashMap::new());
                bindings.insert(
                    port,
                    Some(vec![bollard::models::PortBinding {
                        host_ip: Some(PUBLISH_HOST_IP.to_string()),
                        host_port: Some(host_port),
                    }]),
                );
            }
            (Some(exposed), Some(bindings))
        };

        Config {
            image: Some(self.image()),
            cmd: (!self.run_args.is_empty()).then(|| self.run_args.clone()),
            env: (!self.env.is_empty()).then(|| self.env.clone()),
            exposed_ports,
            host_config: Some(HostConfig {
                port_bindings,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
