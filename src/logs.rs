use futures_util::future::join_all;
use tracing::{error, info};

use crate::{
    cluster::ClusterApi,
    model::{LogSegment, PodRecord},
};

pub const NO_RUNNING_PODS: &str = "No running pods found for the specified service.";

pub async fn fetch_logs(cluster: &dyn ClusterApi, pods: &[PodRecord], lines: u32) -> Vec<LogSegment> {
    join_all(pods.iter().map(|pod| fetch_pod_logs(cluster, pod, lines))).await
}

async fn fetch_pod_logs(cluster: &dyn ClusterApi, pod: &PodRecord, lines: u32) -> LogSegment {
    let text = match cluster
        .pod_logs(&pod.name, &pod.namespace, i64::from(lines))
        .await
    {
        Ok(text) => {
            info!("Retrieved logs for pod {}", pod.name);
            text
        }
        Err(e) => {
            error!("Error fetching logs for pod {}: {e}", pod.name);
            format!("Error fetching logs for pod {}: {e}", pod.name)
        }
    };

    LogSegment {
        pod_name: pod.name.clone(),
        namespace: pod.namespace.clone(),
        text,
    }
}
