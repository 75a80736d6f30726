use async_trait::async_trait;
use k8s_openapi::api::{core::v1::Pod, discovery::v1::EndpointSlice};
use kube::{
    Api, Client,
    api::{ListParams, LogParams},
};

// empty namespace lists across all namespaces
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
        field_selector: &str,
    ) -> Result<Vec<Pod>, kube::Error>;

    async fn list_endpoint_slices(&self, namespace: &str)
    -> Result<Vec<EndpointSlice>, kube::Error>;

    async fn pod_logs(
        &self,
        name: &str,
        namespace: &str,
        tail_lines: i64,
    ) -> Result<String, kube::Error>;
}

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
        field_selector: &str,
    ) -> Result<Vec<Pod>, kube::Error> {
        let mut lp = ListParams::default().fields(field_selector);
        if let Some(selector) = label_selector {
            lp = lp.labels(selector);
        }
        Ok(self.api::<Pod>(namespace).list(&lp).await?.items)
    }

    async fn list_endpoint_slices(
        &self,
        namespace: &str,
    ) -> Result<Vec<EndpointSlice>, kube::Error> {
        let list = self
            .api::<EndpointSlice>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn pod_logs(
        &self,
        name: &str,
        namespace: &str,
        tail_lines: i64,
    ) -> Result<String, kube::Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            follow: false,
            tail_lines: Some(tail_lines),
            ..Default::default()
        };
        pods.logs(name, &params).await
    }
}
