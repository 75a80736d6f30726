use std::time::Duration;

use reqwest::StatusCode;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::{
    app_err,
    error::AppError,
    model::{EndpointRecord, Version, VersionResult},
};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct VersionProber {
    client: reqwest::Client,
    version_path: String,
    timeout: Duration,
    #[cfg(test)]
    abort_probes: bool,
}

impl VersionProber {
    pub fn new(version_path: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            version_path: version_path.to_string(),
            timeout: PROBE_TIMEOUT,
            #[cfg(test)]
            abort_probes: false,
        })
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Makes every probe task panic before it sends its request.
    #[cfg(test)]
    pub fn with_aborted_probes(mut self) -> Self {
        self.abort_probes = true;
        self
    }

    pub fn version_url(&self, ip: &str, port: i32) -> String {
        if ip.contains(':') {
            format!("http://[{ip}]:{port}{}", self.version_path)
        } else {
            format!("http://{ip}:{port}{}", self.version_path)
        }
    }

    /// `result[i]` belongs to `endpoints[i]`. Fails only when a probe task dies.
    pub async fn probe_versions(
        &self,
        endpoints: Vec<EndpointRecord>,
    ) -> Result<Vec<VersionResult>, AppError> {
        let mut tasks = JoinSet::new();
        for (index, endpoint) in endpoints.iter().enumerate() {
            let prober = self.clone();
            let url = self.version_url(&endpoint.ip, endpoint.port);
            tasks.spawn(async move { (index, prober.fetch_version(&url).await) });
        }

        let mut versions: Vec<Option<Version>> = vec![None; endpoints.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, version)) => versions[index] = Some(version),
                Err(e) => return app_err!("Version probe task failed: {e}"),
            }
        }

        endpoints
            .into_iter()
            .zip(versions)
            .map(|(endpoint, version)| match version {
                Some(version) => Ok(VersionResult { endpoint, version }),
                None => app_err!("No probe result for {}:{}", endpoint.ip, endpoint.port),
            })
            .collect()
    }

    async fn fetch_version(&self, url: &str) -> Version {
        #[cfg(test)]
        assert!(!self.abort_probes, "probe of {url} aborted");

        let response = match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error fetching version from {url}: {e}");
                return Version::Unavailable;
            }
        };

        if response.status() != StatusCode::OK {
            debug!("{url} answered {}", response.status());
            return Version::Unavailable;
        }

        match response.text().await {
            Ok(body) if body.trim().is_empty() => Version::Unavailable,
            Ok(body) => Version::Reported(body.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                error!("Error reading version from {url}: {e}");
                Version::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    fn endpoint(name: &str, ip: &str, port: u16) -> EndpointRecord {
        EndpointRecord {
            name: name.to_string(),
            namespace: "web".to_string(),
            ip: ip.to_string(),
            port: i32::from(port),
            uptime: "0:10:00".to_string(),
        }
    }

    async fn version_server(body: &str, status: u16, delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn brackets_ipv6_addresses() {
        let prober = VersionProber::new("/version").unwrap();
        assert_eq!(prober.version_url("10.0.0.5", 8080), "http://10.0.0.5:8080/version");
        assert_eq!(prober.version_url("fd00::1", 80), "http://[fd00::1]:80/version");
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let slow = version_server("v1.0.0", 200, Duration::from_millis(400)).await;
        let fast = version_server("v2.0.0 (build 7)\r\n", 200, Duration::ZERO).await;

        let endpoints = vec![
            endpoint("slow", "127.0.0.1", slow.address().port()),
            endpoint("fast", "127.0.0.1", fast.address().port()),
        ];
        let results = VersionProber::new("/version")
            .unwrap()
            .probe_versions(endpoints.clone())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].endpoint, endpoints[0]);
        assert_eq!(results[0].version, Version::Reported("v1.0.0".to_string()));
        assert_eq!(results[1].endpoint, endpoints[1]);
        assert_eq!(results[1].version, Version::Reported("v2.0.0 (build 7)".to_string()));
    }

    #[tokio::test]
    async fn failures_stay_local_to_their_endpoint() {
        let ok = version_server("v1.2.3", 200, Duration::ZERO).await;
        let broken = version_server("oops", 500, Duration::ZERO).await;
        let empty = version_server("", 200, Duration::ZERO).await;
        let hanging = version_server("v9", 200, Duration::from_secs(2)).await;

        let endpoints = vec![
            endpoint("down", "127.0.0.1", closed_port()),
            endpoint("broken", "127.0.0.1", broken.address().port()),
            endpoint("ok", "127.0.0.1", ok.address().port()),
            endpoint("empty", "127.0.0.1", empty.address().port()),
            endpoint("hanging", "127.0.0.1", hanging.address().port()),
        ];
        let results = VersionProber::new("/version")
            .unwrap()
            .with_timeout(Duration::from_millis(200))
            .probe_versions(endpoints)
            .await
            .unwrap();

        let versions = results.iter().map(|r| r.version.to_string()).collect::<Vec<_>>();
        assert_eq!(
            versions,
            [
                "Version Unavailable",
                "Version Unavailable",
                "v1.2.3",
                "Version Unavailable",
                "Version Unavailable",
            ]
        );
    }

    #[tokio::test]
    async fn dead_probe_task_fails_the_batch() {
        let ok = version_server("v1.2.3", 200, Duration::ZERO).await;
        let err = VersionProber::new("/version")
            .unwrap()
            .with_aborted_probes()
            .probe_versions(vec![endpoint("ok", "127.0.0.1", ok.address().port())])
            .await
            .unwrap_err();
        assert!(err.message.contains("Version probe task failed"));
    }

    #[tokio::test]
    async fn no_endpoints_no_results() {
        let results = VersionProber::new("/version")
            .unwrap()
            .probe_versions(Vec::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
