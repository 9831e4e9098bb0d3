use crate::discovery::DiscoveryError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};

pub const FIELD_MANAGER: &str = "easyhaproxy";

/// The cluster calls the ingress adapter makes.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, DiscoveryError>;

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, DiscoveryError>;

    async fn service(&self, namespace: &str, name: &str) -> Result<Option<Service>, DiscoveryError>;

    async fn pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, DiscoveryError>;

    async fn pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, DiscoveryError>;

    async fn node(&self, name: &str) -> Result<Option<Node>, DiscoveryError>;

    async fn nodes(&self) -> Result<Vec<Node>, DiscoveryError>;

    /// Merge-patches `status` into the ingress status subresource.
    async fn patch_ingress_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), DiscoveryError>;
}

/// `ClusterApi` backed by a kube client (in-cluster or kubeconfig).
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_default() -> Result<Self, DiscoveryError> {
        let client = Client::try_default()
            .await
            .map_err(|e| DiscoveryError::kube("connect", e))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, DiscoveryError> {
        let api = Api::<Ingress>::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| DiscoveryError::kube("list ingresses", e))?;
        Ok(list.items)
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, DiscoveryError> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(|e| DiscoveryError::kube(format!("read secret {namespace}/{name}"), e))
    }

    async fn service(&self, namespace: &str, name: &str) -> Result<Option<Service>, DiscoveryError> {
        Api::<Service>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(|e| DiscoveryError::kube(format!("read service {namespace}/{name}"), e))
    }

    async fn pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, DiscoveryError> {
        Api::<Pod>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(|e| DiscoveryError::kube(format!("read pod {namespace}/{name}"), e))
    }

    async fn pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, DiscoveryError> {
        let list = Api::<Pod>::namespaced(self.client.clone(), namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(|e| DiscoveryError::kube(format!("list pods {namespace}"), e))?;
        Ok(list.items)
    }

    async fn node(&self, name: &str) -> Result<Option<Node>, DiscoveryError> {
        Api::<Node>::all(self.client.clone())
            .get_opt(name)
            .await
            .map_err(|e| DiscoveryError::kube(format!("read node {name}"), e))
    }

    async fn nodes(&self) -> Result<Vec<Node>, DiscoveryError> {
        let list = Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .map_err(|e| DiscoveryError::kube("list nodes", e))?;
        Ok(list.items)
    }

    async fn patch_ingress_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), DiscoveryError> {
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };
        Api::<Ingress>::namespaced(self.client.clone(), namespace)
            .patch_status(name, &params, &Patch::Merge(status))
            .await
            .map_err(|e| DiscoveryError::kube(format!("patch ingress status {namespace}/{name}"), e))?;
        Ok(())
    }
}
