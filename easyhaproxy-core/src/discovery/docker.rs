use super::{Discover, DiscoveryError, EntityMap};
use crate::logging::EASYHAPROXY;
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::EndpointSettings;
use bollard::network::ConnectNetworkOptions;
use std::collections::HashMap;

/// Containers on the local engine, addressed on the proxy's own network.
pub struct DockerDiscovery {
    docker: Docker,
    hostname: String,
}

impl DockerDiscovery {
    pub fn connect(hostname: String) -> Result<Self, DiscoveryError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DiscoveryError::docker("connect", e))?;
        Ok(Self { docker, hostname })
    }

    async fn networks_of(&self, container: &str) -> Result<Option<HashMap<String, EndpointSettings>>, DiscoveryError> {
        let inspected = self
            .docker
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
            .map_err(|e| DiscoveryError::docker(format!("inspect container {container}"), e))?;
        Ok(inspected.network_settings.and_then(|s| s.networks))
    }

    /// The network of this host's container, or of the first listed container
    /// when the driver does not run in a container.
    async fn proxy_network(&self, first_container: &str) -> Result<Option<String>, DiscoveryError> {
        if let Ok(Some(networks)) = self.networks_of(&self.hostname).await {
            return Ok(first_network(&networks));
        }

        tracing::debug!(target: EASYHAPROXY, hostname = %self.hostname, "not running in a container, using the first container's network");
        Ok(self
            .networks_of(first_container)
            .await?
            .and_then(|networks| first_network(&networks)))
    }
}

#[async_trait]
impl Discover for DockerDiscovery {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError> {
        let containers = self
            .docker
            .list_containers(None::<ListContainersOptions<String>>)
            .await
            .map_err(|e| DiscoveryError::docker("list containers", e))?;

        let Some(first) = containers.first().and_then(|c| c.id.clone()) else {
            return Ok(EntityMap::new());
        };
        let Some(network) = self.proxy_network(&first).await? else {
            return Err(DiscoveryError::not_found("proxy network"));
        };

        let mut entities = EntityMap::new();
        for container in containers {
            let Some(id) = container.id.clone() else {
                continue;
            };

            let mut networks = container
                .network_settings
                .and_then(|s| s.networks)
                .unwrap_or_default();

            if !networks.contains_key(&network) {
                tracing::info!(target: EASYHAPROXY, container = %id, network = %network, "connecting container to the proxy network");
                self.docker
                    .connect_network(
                        &network,
                        ConnectNetworkOptions {
                            container: id.clone(),
                            endpoint_config: EndpointSettings::default(),
                        },
                    )
                    .await
                    .map_err(|e| DiscoveryError::docker(format!("connect {id} to {network}"), e))?;
                networks = self.networks_of(&id).await?.unwrap_or_default();
            }

            let Some(address) = address_on(&networks, &network) else {
                continue;
            };
            entities.insert(
                address,
                container.labels.unwrap_or_default().into_iter().collect(),
            );
        }

        Ok(entities)
    }
}

/// First network by name; the engine reports networks as an unordered map.
pub(crate) fn first_network(networks: &HashMap<String, EndpointSettings>) -> Option<String> {
    networks.keys().min().cloned()
}

/// A container's IP on `network`, if it has one.
pub(crate) fn address_on(networks: &HashMap<String, EndpointSettings>, network: &str) -> Option<String> {
    networks
        .get(network)
        .and_then(|endpoint| endpoint.ip_address.clone())
        .filter(|ip| !ip.is_empty())
}
