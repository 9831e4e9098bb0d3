use super::{Discover, DiscoveryError, EntityMap};
use crate::logging::EASYHAPROXY;
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::InspectContainerOptions;
use bollard::models::{NetworkAttachmentConfig, Service, ServiceEndpointVirtualIps};
use bollard::network::InspectNetworkOptions;
use bollard::service::{InspectServiceOptions, ListServicesOptions, UpdateServiceOptions};

const INGRESS_NETWORK: &str = "ingress";

/// Swarm services reached through their virtual IP on the proxy's network.
pub struct SwarmDiscovery {
    docker: Docker,
    hostname: String,
    prefix: String,
}

/// Networks found on the proxy service's endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ProxyNetworks {
    pub proxy: Option<String>,
    pub ingress: Option<String>,
}

/// Where a candidate service stands relative to the proxy network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placement {
    Attached(String),
    /// Networks the service must be updated to: its non-ingress networks plus
    /// the proxy network.
    Detached(Vec<String>),
}

impl SwarmDiscovery {
    pub fn connect(hostname: String, prefix: String) -> Result<Self, DiscoveryError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DiscoveryError::docker("connect", e))?;
        Ok(Self {
            docker,
            hostname,
            prefix,
        })
    }

    async fn proxy_service_name(&self) -> Result<String, DiscoveryError> {
        let container = self
            .docker
            .inspect_container(&self.hostname, None::<InspectContainerOptions>)
            .await
            .map_err(|e| DiscoveryError::docker(format!("inspect container {}", self.hostname), e))?;
        let name = container.name.unwrap_or_default();
        Ok(service_name_of(&name))
    }

    async fn proxy_networks(&self, service: &str) -> Result<ProxyNetworks, DiscoveryError> {
        let service = self
            .docker
            .inspect_service(service, None::<InspectServiceOptions>)
            .await
            .map_err(|e| DiscoveryError::docker(format!("inspect service {service}"), e))?;

        let mut named = Vec::new();
        for vip in virtual_ips(&service) {
            let Some(id) = vip.network_id.clone() else {
                continue;
            };
            let network = self
                .docker
                .inspect_network(&id, None::<InspectNetworkOptions<String>>)
                .await
                .map_err(|e| DiscoveryError::docker(format!("inspect network {id}"), e))?;
            named.push((id, network.name.unwrap_or_default()));
        }

        Ok(select_networks(&named))
    }

    async fn attach(&self, service: &Service, networks: Vec<String>) -> Result<(), DiscoveryError> {
        let (Some(id), Some(mut spec)) = (service.id.clone(), service.spec.clone()) else {
            return Ok(());
        };
        let version = service
            .version
            .as_ref()
            .and_then(|v| v.index)
            .unwrap_or_default();

        let mut task = spec.task_template.take().unwrap_or_default();
        task.networks = Some(
            networks
                .into_iter()
                .map(|target| NetworkAttachmentConfig {
                    target: Some(target),
                    ..Default::default()
                })
                .collect(),
        );
        spec.task_template = Some(task);

        self.docker
            .update_service(
                &id,
                spec,
                UpdateServiceOptions {
                    version,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| DiscoveryError::docker(format!("update service {id}"), e))?;
        Ok(())
    }
}

#[async_trait]
impl Discover for SwarmDiscovery {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError> {
        let service_name = self.proxy_service_name().await?;
        let networks = self.proxy_networks(&service_name).await?;
        let Some(proxy_network) = networks.proxy.clone() else {
            return Err(DiscoveryError::not_found(format!(
                "private network of service {service_name}"
            )));
        };

        let services = self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await
            .map_err(|e| DiscoveryError::docker("list services", e))?;

        let mut entities = EntityMap::new();
        for service in services {
            let labels = service
                .spec
                .as_ref()
                .and_then(|s| s.labels.clone())
                .unwrap_or_default();
            if !labels.keys().any(|key| key.contains(&self.prefix)) {
                continue;
            }

            match placement(&service, &networks) {
                Placement::Attached(address) => {
                    entities.insert(address, labels.into_iter().collect());
                }
                Placement::Detached(attach_to) => {
                    let name = service.spec.as_ref().and_then(|s| s.name.clone()).unwrap_or_default();
                    tracing::info!(target: EASYHAPROXY, service = %name, network = %proxy_network, "attaching service to the proxy network, picked up next tick");
                    self.attach(&service, attach_to).await?;
                }
            }
        }

        Ok(entities)
    }
}

fn virtual_ips(service: &Service) -> &[ServiceEndpointVirtualIps] {
    service
        .endpoint
        .as_ref()
        .and_then(|e| e.virtual_ips.as_deref())
        .unwrap_or_default()
}

/// `/easyhaproxy.1.abc` -> `easyhaproxy`.
pub(crate) fn service_name_of(container_name: &str) -> String {
    container_name
        .trim_start_matches('/')
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Picks the first non-ingress network and the ingress network from
/// `(id, name)` pairs in endpoint order.
pub(crate) fn select_networks(named: &[(String, String)]) -> ProxyNetworks {
    let mut networks = ProxyNetworks::default();
    for (id, name) in named {
        if name == INGRESS_NETWORK {
            networks.ingress.get_or_insert_with(|| id.clone());
        } else {
            networks.proxy.get_or_insert_with(|| id.clone());
        }
        if networks.proxy.is_some() && networks.ingress.is_some() {
            break;
        }
    }
    networks
}

pub(crate) fn placement(service: &Service, networks: &ProxyNetworks) -> Placement {
    let mut keep = Vec::new();
    for vip in virtual_ips(service) {
        let id = vip.network_id.as_deref();
        if id.is_some() && id == networks.proxy.as_deref() {
            let addr = vip.addr.as_deref().unwrap_or_default();
            let ip = addr.split('/').next().unwrap_or_default();
            return Placement::Attached(ip.to_string());
        }
        if let Some(id) = id.filter(|id| Some(*id) != networks.ingress.as_deref()) {
            keep.push(id.to_string());
        }
    }

    keep.extend(networks.proxy.clone());
    Placement::Detached(keep)
}
