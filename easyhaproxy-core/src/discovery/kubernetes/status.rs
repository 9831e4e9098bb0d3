use super::KubernetesDiscovery;
use crate::conf::DeploymentMode;
use crate::logging::EASYHAPROXY;
use k8s_openapi::api::core::v1::{Node, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress};
use std::collections::BTreeSet;
use tokio::time::Instant;

const PROXY_SERVICE_NAMES: [&str; 2] = ["easyhaproxy", "ingress-easyhaproxy"];
const PROXY_POD_SELECTOR: &str = "app.kubernetes.io/name=easyhaproxy";

/// ExternalIP of a node, falling back to its InternalIP.
pub(crate) fn node_address(node: &Node) -> Option<String> {
    let addresses = node.status.as_ref()?.addresses.as_ref()?;
    ["ExternalIP", "InternalIP"].iter().find_map(|kind| {
        addresses
            .iter()
            .find(|a| a.type_ == *kind)
            .map(|a| a.address.clone())
    })
}

fn ip(address: String) -> IngressLoadBalancerIngress {
    IngressLoadBalancerIngress {
        ip: Some(address),
        ..Default::default()
    }
}

fn hostname(name: String) -> IngressLoadBalancerIngress {
    IngressLoadBalancerIngress {
        hostname: Some(name),
        ..Default::default()
    }
}

impl KubernetesDiscovery {
    /// Resolved deployment mode, detected once and cached for the process.
    pub(crate) async fn deployment_mode(&mut self) -> (DeploymentMode, Option<Service>) {
        if let Some(cached) = &self.mode {
            return cached.clone();
        }

        let resolved = match self.settings.deployment_mode {
            DeploymentMode::Auto => self.detect_mode().await,
            manual => {
                tracing::info!(target: EASYHAPROXY, mode = %manual, "using manual deployment mode");
                let service = match manual {
                    DeploymentMode::NodePort | DeploymentMode::ClusterIp => self.proxy_service().await,
                    _ => None,
                };
                (manual, service)
            }
        };

        self.mode = Some(resolved.clone());
        resolved
    }

    async fn detect_mode(&self) -> (DeploymentMode, Option<Service>) {
        let namespace = &self.settings.pod_namespace;
        match self.api.pod(namespace, &self.hostname).await {
            Ok(Some(pod)) => {
                let owner = pod
                    .metadata
                    .owner_references
                    .as_ref()
                    .and_then(|owners| owners.first())
                    .map(|owner| owner.kind.clone())
                    .unwrap_or_default();

                match owner.as_str() {
                    "DaemonSet" => {
                        tracing::info!(target: EASYHAPROXY, mode = "daemonset", "detected deployment mode");
                        return (DeploymentMode::DaemonSet, None);
                    }
                    "ReplicaSet" | "Deployment" => {
                        if let Some(service) = self.proxy_service().await {
                            let node_port = service
                                .spec
                                .as_ref()
                                .and_then(|s| s.type_.as_deref())
                                == Some("NodePort");
                            let mode = if node_port {
                                DeploymentMode::NodePort
                            } else {
                                DeploymentMode::ClusterIp
                            };
                            tracing::info!(target: EASYHAPROXY, mode = %mode, "detected deployment mode");
                            return (mode, Some(service));
                        }
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                tracing::warn!(target: EASYHAPROXY, pod = %self.hostname, "own pod not found, defaulting to daemonset")
            }
            Err(e) => {
                tracing::warn!(target: EASYHAPROXY, error = %e, "failed to detect deployment mode, defaulting to daemonset")
            }
        }

        (DeploymentMode::DaemonSet, None)
    }

    async fn proxy_service(&self) -> Option<Service> {
        for name in PROXY_SERVICE_NAMES {
            if let Ok(Some(service)) = self.api.service(&self.settings.pod_namespace, name).await {
                return Some(service);
            }
        }
        None
    }

    /// Addresses published in ingress status, cached for the status interval.
    pub(crate) async fn ingress_addresses(&mut self) -> Vec<IngressLoadBalancerIngress> {
        if let Some((at, cached)) = &self.addresses {
            if !cached.is_empty() && at.elapsed() < self.settings.status_update_interval {
                return cached.clone();
            }
        }

        let (mode, service) = self.deployment_mode().await;
        let addresses = match mode {
            DeploymentMode::NodePort => self.all_node_addresses().await,
            DeploymentMode::ClusterIp => self.service_addresses(service.as_ref()),
            _ => self.proxy_node_addresses().await,
        };

        self.addresses = Some((Instant::now(), addresses.clone()));
        addresses
    }

    async fn proxy_node_addresses(&self) -> Vec<IngressLoadBalancerIngress> {
        let pods = match self.api.pods(&self.settings.pod_namespace, PROXY_POD_SELECTOR).await {
            Ok(pods) => pods,
            Err(e) => {
                tracing::warn!(target: EASYHAPROXY, error = %e, "failed to get ingress addresses");
                return Vec::new();
            }
        };

        let node_names: BTreeSet<String> = pods
            .into_iter()
            .filter_map(|pod| pod.spec.and_then(|s| s.node_name))
            .collect();

        let mut addresses = Vec::new();
        for name in node_names {
            match self.api.node(&name).await {
                Ok(Some(node)) => addresses.extend(node_address(&node).map(ip)),
                Ok(None) => {}
                Err(e) => tracing::warn!(target: EASYHAPROXY, node = %name, error = %e, "failed to read node"),
            }
        }
        addresses
    }

    async fn all_node_addresses(&self) -> Vec<IngressLoadBalancerIngress> {
        match self.api.nodes().await {
            Ok(nodes) => nodes.iter().filter_map(node_address).map(ip).collect(),
            Err(e) => {
                tracing::warn!(target: EASYHAPROXY, error = %e, "failed to get ingress addresses");
                Vec::new()
            }
        }
    }

    fn service_addresses(&self, service: Option<&Service>) -> Vec<IngressLoadBalancerIngress> {
        let mut addresses = Vec::new();

        let lb_ingress = service
            .and_then(|s| s.status.as_ref())
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref());
        for entry in lb_ingress.into_iter().flatten() {
            addresses.extend(entry.ip.clone().map(ip));
            addresses.extend(entry.hostname.clone().map(hostname));
        }

        let external = self.settings.external_hostname.trim();
        if addresses.is_empty() && !external.is_empty() {
            addresses.push(hostname(external.to_string()));
        }

        if addresses.is_empty() {
            let cluster_ip = service
                .and_then(|s| s.spec.as_ref())
                .and_then(|s| s.cluster_ip.clone());
            addresses.extend(cluster_ip.map(ip));
        }

        addresses
    }

    pub(crate) async fn update_status(&self, ingress: &Ingress, addresses: &[IngressLoadBalancerIngress]) {
        if addresses.is_empty() {
            return;
        }

        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let name = ingress.metadata.name.clone().unwrap_or_default();
        let status = serde_json::json!({ "status": { "loadBalancer": { "ingress": addresses } } });

        match self.api.patch_ingress_status(&namespace, &name, &status).await {
            Ok(()) => {
                tracing::debug!(target: EASYHAPROXY, ingress = %format!("{namespace}/{name}"), count = addresses.len(), "updated ingress status")
            }
            Err(e) => {
                tracing::warn!(target: EASYHAPROXY, ingress = %format!("{namespace}/{name}"), error = %e, "failed to update ingress status")
            }
        }
    }
}
