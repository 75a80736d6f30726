use async_tempfile::TempFile;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs, process::Command};
use tracing::{debug, error, warn};

use crate::{
    app_err, app_error,
    censor::{REPLACEMENT, Redactor},
    error::AppError,
};

pub struct TruffleHogScanner {
    bin: String,
}

#[derive(Debug, Deserialize)]
struct Finding {
    #[serde(rename = "Raw", default)]
    raw: String,
    #[serde(rename = "RawV2", default)]
    raw_v2: String,
}

impl TruffleHogScanner {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }
}

#[async_trait]
impl Redactor for TruffleHogScanner {
    async fn redact(&self, text: &str) -> Result<String, AppError> {
        // removed from disk when dropped
        let file = TempFile::new()
            .await
            .map_err(|e| app_error!("Failed to create a temporary file: {e}"))?;
        fs::write(file.file_path(), text).await?;

        let output = Command::new(&self.bin)
            .arg("filesystem")
            .arg(file.file_path())
            .arg("--json")
            .arg("--no-update")
            .output()
            .await
            .map_err(|e| app_error!("Failed to run {}: {e}", self.bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("An error occurred during TruffleHog scan: {stderr}");
            return app_err!("TruffleHog scan failed: {}", output.status);
        }

        let findings = parse_findings(&String::from_utf8_lossy(&output.stdout));
        debug!("TruffleHog reported {} findings", findings.len());
        Ok(redact_all(text, &findings))
    }
}

fn parse_findings(stdout: &str) -> Vec<String> {
    let mut secrets = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        match serde_json::from_str::<Finding>(line) {
            Ok(finding) => {
                secrets.extend(
                    [finding.raw, finding.raw_v2]
                        .into_iter()
                        .filter(|s| !s.is_empty()),
                );
            }
            Err(e) => warn!("Skipping unparseable TruffleHog output line: {e}"),
        }
    }
    // longest first so a secret that contains another one is replaced whole
    secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    secrets.dedup();
    secrets
}

fn redact_all(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REPLACEMENT))
}
