mod docker;
mod error;
pub mod kubernetes;
mod static_file;
mod swarm;

#[cfg(test)]
mod tests;

pub use docker::DockerDiscovery;
pub use error::DiscoveryError;
pub use kubernetes::{ClusterApi, KubeClusterApi, KubernetesDiscovery};
pub use static_file::{StaticDiscovery, static_entities};
pub use swarm::SwarmDiscovery;

use crate::conf::{DiscoverMode, Options};
use crate::paths::Paths;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Tag map of one discovered entity.
pub type Labels = BTreeMap<String, String>;

/// `address -> labels` for every entity seen in one refresh.
///
/// Both levels are ordered maps, so equality and serialization are canonical.
pub type EntityMap = BTreeMap<String, Labels>;

/// A source of discovered entities.
#[async_trait]
pub trait Discover: Send {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError>;
}

/// The adapter selected at startup.
pub enum Discovery {
    Static(StaticDiscovery),
    Docker(DockerDiscovery),
    Swarm(SwarmDiscovery),
    Kubernetes(KubernetesDiscovery),
}

impl Discovery {
    /// Builds the adapter for `options.discover`, connecting to its API.
    pub async fn connect(options: &Options, paths: &Paths) -> Result<Self, DiscoveryError> {
        let discovery = match options.discover {
            DiscoverMode::Static => Self::Static(StaticDiscovery::new(
                paths.static_config.clone(),
                options.label_prefix.clone(),
            )),
            DiscoverMode::Docker => Self::Docker(DockerDiscovery::connect(hostname())?),
            DiscoverMode::Swarm => Self::Swarm(SwarmDiscovery::connect(
                hostname(),
                options.label_prefix.clone(),
            )?),
            DiscoverMode::Kubernetes => {
                let api = KubeClusterApi::try_default().await?;
                Self::Kubernetes(KubernetesDiscovery::new(
                    Box::new(api),
                    options,
                    paths.certs_haproxy.clone(),
                    hostname(),
                ))
            }
        };

        Ok(discovery)
    }

    pub fn mode(&self) -> DiscoverMode {
        match self {
            Self::Static(_) => DiscoverMode::Static,
            Self::Docker(_) => DiscoverMode::Docker,
            Self::Swarm(_) => DiscoverMode::Swarm,
            Self::Kubernetes(_) => DiscoverMode::Kubernetes,
        }
    }
}

#[async_trait]
impl Discover for Discovery {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError> {
        match self {
            Self::Static(d) => d.refresh().await,
            Self::Docker(d) => d.refresh().await,
            Self::Swarm(d) => d.refresh().await,
            Self::Kubernetes(d) => d.refresh().await,
        }
    }
}

/// This host's name; inside a container it is the container id or pod name.
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
