use std::collections::HashMap;

use k8s_openapi::api::discovery::v1::EndpointSlice;
use tracing::{error, info};

use crate::{
    cluster::ClusterApi,
    model::{EndpointRecord, PodRecord},
};

pub async fn correlate(
    cluster: &dyn ClusterApi,
    pods: &[PodRecord],
    namespace: &str,
) -> Vec<EndpointRecord> {
    let slices = match cluster.list_endpoint_slices(namespace).await {
        Ok(slices) => slices,
        Err(e) => {
            error!("Error fetching EndpointSlices: {e}");
            return Vec::new();
        }
    };
    info!("Retrieved {} EndpointSlices", slices.len());

    join_endpoints(pods, &slices)
}

/// One record per (known pod address, advertised port). Addresses that no
/// running pod owns are stale and dropped.
pub fn join_endpoints(pods: &[PodRecord], slices: &[EndpointSlice]) -> Vec<EndpointRecord> {
    let pods_by_ip = pods
        .iter()
        .filter_map(|pod| pod.ip.as_deref().map(|ip| (ip, pod)))
        .collect::<HashMap<_, _>>();

    let mut records = Vec::new();
    for slice in slices {
        let ports = slice
            .ports
            .iter()
            .flatten()
            .filter_map(|p| p.port)
            .collect::<Vec<_>>();

        for address in slice.endpoints.iter().flat_map(|e| &e.addresses) {
            let Some(pod) = pods_by_ip.get(address.as_str()) else {
                continue;
            };
            for port in &ports {
                records.push(EndpointRecord {
                    name: pod.name.clone(),
                    namespace: pod.namespace.clone(),
                    ip: address.clone(),
                    port: *port,
                    uptime: pod.uptime.clone(),
                });
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::testing::{FakeCluster, slice};

    fn record(name: &str, ip: Option<&str>) -> PodRecord {
        PodRecord {
            name: name.to_string(),
            namespace: "web".to_string(),
            ip: ip.map(str::to_string),
            uptime: "1:00:00".to_string(),
        }
    }

    #[test]
    fn joins_on_pod_ip_and_drops_unknown_addresses() {
        let pods = vec![record("api-1", Some("10.0.0.5")), record("api-2", Some("10.0.0.6"))];
        let slices = vec![slice(&["10.0.0.5", "10.0.0.99"], &[8080])];

        let endpoints = join_endpoints(&pods, &slices);

        assert_eq!(
            endpoints,
            vec![EndpointRecord {
                name: "api-1".to_string(),
                namespace: "web".to_string(),
                ip: "10.0.0.5".to_string(),
                port: 8080,
                uptime: "1:00:00".to_string(),
            }]
        );
    }

    #[test]
    fn one_record_per_port() {
        let pods = vec![record("api-1", Some("10.0.0.5"))];
        let slices = vec![slice(&["10.0.0.5"], &[8080, 9090]), slice(&["10.0.0.5"], &[])];

        let ports = join_endpoints(&pods, &slices)
            .into_iter()
            .map(|e| e.port)
            .collect::<Vec<_>>();

        assert_eq!(ports, [8080, 9090]);
    }

    #[test]
    fn every_record_ip_belongs_to_a_pod() {
        let pods = vec![record("a", Some("10.0.0.1")), record("b", None), record("c", Some("10.0.0.3"))];
        let slices = vec![
            slice(&["10.0.0.1", "10.0.0.2"], &[80]),
            slice(&["10.0.0.3", "10.0.0.4", "10.0.0.1"], &[443]),
        ];

        let endpoints = join_endpoints(&pods, &slices);

        assert_eq!(endpoints.len(), 3);
        for e in &endpoints {
            assert!(pods.iter().any(|p| p.ip.as_deref() == Some(e.ip.as_str())));
        }
    }

    #[tokio::test]
    async fn slice_errors_degrade_to_empty() {
        let cluster = FakeCluster {
            slices: vec![slice(&["10.0.0.5"], &[8080])],
            fail_slices: true,
            ..Default::default()
        };
        let pods = vec![record("api-1", Some("10.0.0.5"))];

        assert!(correlate(&cluster, &pods, "web").await.is_empty());
    }
}
