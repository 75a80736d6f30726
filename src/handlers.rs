use std::sync::Arc;

use tracing::{error, info};

use crate::{
    censor::RedactionGateway,
    command::{ParsedCommand, logs_help_message, version_help_message},
    inspector::ServiceInspector,
};

pub const VERSION_COMMAND: &str = "/version";
pub const LOGS_COMMAND: &str = "/logs";

pub const SERVICE_REQUIRED: &str =
    "Error: 'service' is required when retrieving logs. Use --help to get the bot manual";
const INFO_FAILED: &str = "Error retrieving service info";
const LOGS_FAILED: &str = "Error retrieving service logs";

pub fn generic_error(command: &str) -> String {
    format!(
        "An error occurred while processing the /{} request.",
        command.trim_start_matches('/')
    )
}

#[derive(Clone)]
pub struct CommandHandler {
    inspector: ServiceInspector,
    gateway: Arc<RedactionGateway>,
    label_selector_key: String,
    default_log_lines: u32,
}

impl CommandHandler {
    pub fn new(
        inspector: ServiceInspector,
        gateway: Arc<RedactionGateway>,
        label_selector_key: &str,
        default_log_lines: u32,
    ) -> Self {
        Self {
            inspector,
            gateway,
            label_selector_key: label_selector_key.to_string(),
            default_log_lines,
        }
    }

    /// `None` for commands this bot does not serve.
    pub async fn dispatch(&self, command: &str, text: &str) -> Option<String> {
        match command {
            VERSION_COMMAND => Some(self.get_service_info(text).await),
            LOGS_COMMAND => Some(self.get_service_logs(text).await),
            _ => None,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_service_info(&self, text: &str) -> String {
        let parsed = ParsedCommand::parse_with_default_lines(text, self.default_log_lines);
        if parsed.help {
            return version_help_message(&self.label_selector_key);
        }

        match self
            .inspector
            .get_services_info(parsed.service.as_deref(), &parsed.namespace)
            .await
        {
            Ok(report) => {
                info!("Service info: {report}");
                report
            }
            Err(e) => {
                error!("Error retrieving service info: {e}");
                INFO_FAILED.to_string()
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_service_logs(&self, text: &str) -> String {
        let parsed = ParsedCommand::parse_with_default_lines(text, self.default_log_lines);
        if parsed.help {
            return logs_help_message(&self.label_selector_key);
        }
        let Some(service) = parsed.service.as_deref() else {
            return SERVICE_REQUIRED.to_string();
        };

        match self
            .inspector
            .get_service_logs(service, &parsed.namespace, parsed.lines, &self.gateway)
            .await
        {
            Ok(logs) => {
                info!("Service logs retrieved for {service}");
                logs
            }
            Err(e) => {
                error!("Error retrieving service logs: {e}");
                LOGS_FAILED.to_string()
            }
        }
    }
}
