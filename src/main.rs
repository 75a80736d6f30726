use std::sync::Arc;

use anyhow::Context;
use censor::RedactionGateway;
use cluster::KubeCluster;
use config::Config;
use handlers::CommandHandler;
use inspector::ServiceInspector;
use kube::Client;
use prober::VersionProber;
use slack::SlackClient;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod censor;
mod cluster;
mod command;
mod config;
mod correlator;
mod error;
mod handlers;
mod inspector;
mod logs;
mod model;
mod prober;
mod report;
mod resolver;
mod slack;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    debug!("Label selector key: {}", config.label_selector_key);

    let client = Client::try_default()
        .await
        .context("Can't connect to Kubernetes API")?;
    info!("Connected to Kubernetes API...");

    let inspector = ServiceInspector::new(
        Arc::new(KubeCluster::new(client)),
        VersionProber::new(&config.version_path)?,
        &config.label_selector_key,
    );
    let handler = Arc::new(CommandHandler::new(
        inspector,
        Arc::new(RedactionGateway::from_config(&config)?),
        &config.label_selector_key,
        config.default_log_lines,
    ));

    let slack = Arc::new(SlackClient::new(&config.slack)?);
    let identity = slack
        .auth_test()
        .await
        .context("Slack bot token was rejected")?;
    info!("Authenticated to Slack as {identity}");

    slack::run(slack, handler).await
}
