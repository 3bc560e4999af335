//! Docker container lifecycle for test fixtures
//!
//! A [`Container`] is created as soon as it is constructed but only runs
//! once [`Container::start`] is called. Starting runs the health checker
//! and then the `on_ready` initializer, so by the time `start` returns the
//! service inside is usable.
//!
//! Nothing is cleaned up implicitly: call [`Container::remove`] when done.

use crate::client;
use crate::options::{ContainerOption, ContainerSpec};
use anyhow::{bail, Context, Result};
use bollard::container::{
    CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Async hook invoked with the container, e.g. a readiness probe
pub type ContainerCallback =
    Arc<dyn for<'a> Fn(&'a Container) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Wrap a closure as a [`ContainerCallback`]
pub fn callback<F>(f: F) -> ContainerCallback
where
    F: for<'a> Fn(&'a Container) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Callback that always succeeds; the default health checker
pub fn noop_callback() -> ContainerCallback {
    callback(|_| async { Ok::<(), anyhow::Error>(()) }.boxed())
}

pub struct Container {
    docker: Docker,
    spec: ContainerSpec,
    name: String,
    id: String,
    initializer: Option<ContainerCallback>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("image", &self.spec.image())
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Connect to the Docker daemon and create a container from `options`
    pub async fn new<I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = ContainerOption>,
    {
        let docker = client::connect()?;
        Self::with_client(docker, options).await
    }

    /// Create a container using an existing engine client
    pub async fn with_client<I>(docker: Docker, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = ContainerOption>,
    {
        let spec = ContainerSpec::from_options(options);
        if spec.image_repository.is_empty() {
            bail!("Container image repository is not set");
        }

        let image = spec.image();
        let name = spec.generate_name();

        ensure_image(&docker, &image)
            .await
            .with_context(|| format!("Failed to ensure Docker image '{}' is available", image))?;

        let create_options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let response = docker
            .create_container(Some(create_options), spec.to_config())
            .await
            .with_context(|| format!("Failed to create a container {}", image))?;

        for warning in &response.warnings {
            warn!(container = %name, "Docker warning: {}", warning);
        }
        info!(container = %name, container_id = %response.id, image = %image, "Created container");

        Ok(Self {
            docker,
            spec,
            name,
            id: response.id,
            initializer: None,
        })
    }

    /// Handle for a container that is assumed to exist, without touching the engine
    #[cfg(test)]
    pub(crate) fn from_parts(docker: Docker, spec: ContainerSpec, name: &str, id: &str) -> Self {
        Self {
            docker,
            spec,
            name: name.to_string(),
            id: id.to_string(),
            initializer: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> String {
        self.spec.image()
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Register a callback to run once the health check has passed
    pub fn on_ready(&mut self, initializer: ContainerCallback) {
        self.initializer = Some(initializer);
    }

    /// Start the container, then run the health checker and the initializer
    #[tracing::instrument(skip(self), fields(container = %self.name))]
    pub async fn start(&self) -> Result<()> {
        self.docker
            .start_container(&self.id, None::<StartContainerOptions<String>>)
            .await
            .with_context(|| format!("Failed to start container {}", self.name))?;
        debug!("Container started, running health check");

        (self.spec.health_checker)(self)
            .await
            .with_context(|| format!("Health check failed for container {}", self.name))?;

        if let Some(initializer) = &self.initializer {
            initializer(self)
                .await
                .with_context(|| format!("Initializer failed for container {}", self.name))?;
        }

        info!("Container is ready");
        Ok(())
    }

    /// Stop the container without a grace period
    pub async fn stop(&self) -> Result<()> {
        self.docker
            .stop_container(&self.id, Some(StopContainerOptions { t: 0 }))
            .await
            .with_context(|| format!("Failed to stop container {}", self.name))?;
        debug!(container = %self.name, "Container stopped");
        Ok(())
    }

    /// Block until the container exits and return its status code
    pub async fn wait(&self) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut wait_stream = self.docker.wait_container(&self.id, Some(options));
        match wait_stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as an error; for us it is just the result
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => {
                Err(e).with_context(|| format!("Failed to wait for container {}", self.name))
            }
            None => bail!("No wait response from container {}", self.name),
        }
    }

    /// Force-remove the container along with its anonymous volumes
    pub async fn remove(&self) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        self.docker
            .remove_container(&self.id, Some(options))
            .await
            .with_context(|| format!("Failed to remove container {}", self.name))?;
        info!(container = %self.name, "Container removed");
        Ok(())
    }

    pub async fn inspect(&self) -> Result<ContainerInspectResponse> {
        self.docker
            .inspect_container(&self.id, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("Failed to inspect container {}", self.name))
    }

    /// Address of the container on the Docker bridge network
    pub async fn ip_address(&self) -> Result<String> {
        let inspected = self.inspect().await?;
        match bridge_ip(&inspected) {
            Some(ip) => Ok(ip),
            None => bail!("Container {} has no network address", self.name),
        }
    }

    /// Everything the container has written so far
    pub async fn logs(&self) -> Result<String> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        });

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut logs_stream = self.docker.logs(&self.id, options);
        while let Some(output) = logs_stream.next().await {
            match output.with_context(|| format!("Failed to read logs of {}", self.name))? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdErr { message } => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        Ok(format!("STDOUT:\n{stdout}\n\nSTDERR:\n{stderr}"))
    }
}

/// Pick the bridge address out of an inspect response
pub fn bridge_ip(inspected: &ContainerInspectResponse) -> Option<String> {
    let settings = inspected.network_settings.as_ref()?;

    if let Some(ip) = settings.ip_address.as_ref().filter(|ip| !ip.is_empty()) {
        return Some(ip.clone());
    }

    let networks = settings.networks.as_ref()?;
    networks
        .get("bridge")
        .into_iter()
        .chain(networks.values())
        .filter_map(|endpoint| endpoint.ip_address.clone())
        .find(|ip| !ip.is_empty())
}

/// Pull `image` unless it is already present locally
async fn ensure_image(docker: &Docker, image: &str) -> Result<()> {
    if docker.inspect_image(image).await.is_ok() {
        debug!("Image cache hit: {}", image);
        return Ok(());
    }

    warn!("Image cache miss: {} (pulling now)", image);

    let options = Some(CreateImageOptions {
        from_image: image,
        ..Default::default()
    });

    let mut stream = docker.create_image(options, None, None);
    while let Some(result) = stream.next().await {
        result.context("Failed to pull Docker image")?;
    }

    info!("Image pulled successfully: {}", image);
    Ok(())
}
