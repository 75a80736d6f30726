use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::info;

use crate::{
    censor::RedactionGateway,
    cluster::ClusterApi,
    correlator::correlate,
    error::AppError,
    logs::{NO_RUNNING_PODS, fetch_logs},
    model::LogSegment,
    prober::VersionProber,
    report::{info_report, log_report},
    resolver::resolve_pods,
};

#[derive(Clone)]
pub struct ServiceInspector {
    cluster: Arc<dyn ClusterApi>,
    prober: VersionProber,
    label_selector_key: String,
}

impl ServiceInspector {
    pub fn new(cluster: Arc<dyn ClusterApi>, prober: VersionProber, label_selector_key: &str) -> Self {
        Self {
            cluster,
            prober,
            label_selector_key: label_selector_key.to_string(),
        }
    }

    pub async fn get_services_info(
        &self,
        service: Option<&str>,
        namespace: &str,
    ) -> Result<String, AppError> {
        let cluster = self.cluster.as_ref();
        let pods = resolve_pods(cluster, &self.label_selector_key, service, namespace).await;
        let endpoints = correlate(cluster, &pods, namespace).await;
        info!(
            "Correlated {} endpoints from {} running pods",
            endpoints.len(),
            pods.len()
        );

        let results = if endpoints.is_empty() {
            Vec::new()
        } else {
            self.prober.probe_versions(endpoints).await?
        };
        Ok(info_report(&results))
    }

    pub async fn get_service_logs(
        &self,
        service: &str,
        namespace: &str,
        lines: u32,
        gateway: &RedactionGateway,
    ) -> Result<String, AppError> {
        let cluster = self.cluster.as_ref();
        let pods = resolve_pods(cluster, &self.label_selector_key, Some(service), namespace).await;
        if pods.is_empty() {
            return Ok(NO_RUNNING_PODS.to_string());
        }

        let segments = fetch_logs(cluster, &pods, lines).await;
        let censored = try_join_all(segments.into_iter().map(|segment| async move {
            let text = gateway.censor(&segment.text).await?;
            Ok::<_, AppError>(LogSegment { text, ..segment })
        }))
        .await?;

        info!("Retrieved service logs for {} pods", censored.len());
        Ok(log_report(service, &censored))
    }
}
