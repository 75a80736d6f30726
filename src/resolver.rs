use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::api::core::v1::Pod;
use tracing::{error, info};

use crate::{
    cluster::ClusterApi,
    model::{PodRecord, UNKNOWN_UPTIME},
};

const RUNNING_PHASE: &str = "Running";
const RUNNING_FIELD_SELECTOR: &str = "status.phase=Running";

pub fn label_selector(key: &str, value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => Some(format!("{key}={v}")),
        _ => None,
    }
}

#[tracing::instrument(skip(cluster))]
pub async fn resolve_pods(
    cluster: &dyn ClusterApi,
    label_key: &str,
    value: Option<&str>,
    namespace: &str,
) -> Vec<PodRecord> {
    let selector = label_selector(label_key, value);
    if let Some(selector) = &selector {
        info!("Constructed label selector: {selector}");
    }

    let pods = match cluster
        .list_pods(namespace, selector.as_deref(), RUNNING_FIELD_SELECTOR)
        .await
    {
        Ok(pods) => pods,
        Err(e) => {
            error!("Error fetching running pods: {e}");
            return Vec::new();
        }
    };

    let now = Utc::now();
    let running = pods
        .iter()
        .filter(|p| is_running(p))
        .map(|p| to_record(p, now))
        .collect::<Vec<_>>();

    info!("Retrieved {} running pods", running.len());
    running
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        == Some(RUNNING_PHASE)
}

fn to_record(pod: &Pod, now: DateTime<Utc>) -> PodRecord {
    let uptime = match &pod.metadata.creation_timestamp {
        Some(created) => format_uptime(now - created.0),
        None => UNKNOWN_UPTIME.to_string(),
    };

    PodRecord {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        ip: pod.status.as_ref().and_then(|s| s.pod_ip.clone()),
        uptime,
    }
}

/// Renders whole seconds as `H:MM:SS`, prefixed with `N day(s), ` past one day.
pub fn format_uptime(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds().max(0);
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
