use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use tracing::warn;

use crate::config::DEFAULT_LOG_LINES;

static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)=(\S+)").expect("valid key=value pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Empty means every namespace.
    pub namespace: String,
    pub service: Option<String>,
    pub lines: u32,
    pub help: bool,
    pub options: HashMap<String, String>,
}

impl ParsedCommand {
    pub fn parse(input: &str) -> Self {
        Self::parse_with_default_lines(input, DEFAULT_LOG_LINES)
    }

    pub fn parse_with_default_lines(input: &str, default_lines: u32) -> Self {
        let options = KEY_VALUE
            .captures_iter(input)
            .map(|c| {
                let (_, [key, value]) = c.extract();
                (key.to_string(), unquote(value).to_string())
            })
            .collect::<HashMap<_, _>>();

        let lines = match options.get("lines") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!("Invalid lines value {raw:?}, using {default_lines}");
                    default_lines
                }
            },
            None => default_lines,
        };

        Self {
            namespace: options.get("namespace").cloned().unwrap_or_default(),
            service: options.get("service").filter(|s| !s.is_empty()).cloned(),
            lines,
            help: input.contains("--help"),
            options,
        }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

pub fn version_help_message(label_selector_key: &str) -> String {
    format!(
        r#"*Service Version Command Usage:*
Usage: [--help] namespace="NAMESPACE_NAME" service="SERVICE_NAME"

Parameters:
- `namespace (optional):` The namespace where the service is located. If not specified, all namespaces will be searched. Example: namespace="default"
- `service (optional):` The name of the service, matched by Kubernetes label `{label_selector_key}`. Example: service="my-service"

Examples:
- `service=my-service`: Get version information about the service `my-service`.
- `service=my-service namespace=web`: Get version information about `my-service` in the `web` namespace.
- `--help`: Display this help message."#
    )
}

pub fn logs_help_message(label_selector_key: &str) -> String {
    format!(
        r#"*Service Logs Command Usage:*
Usage: [--help] namespace="NAMESPACE_NAME" service="SERVICE_NAME" lines="NUMBER_OF_LINES"

Parameters:
- `namespace (optional):` The namespace where the service is located. If not specified, all namespaces will be searched. Example: namespace="default"
- `service (required):` The name of the service, matched by Kubernetes label `{label_selector_key}`. Example: service="my-service"
- `lines (optional):` The number of log lines to retrieve. Example: lines="10"

Examples:
- `service=my-service`: Get logs of the service `my-service`.
- `service=my-service namespace=web`: Get logs of `my-service` in the `web` namespace.
- `service=my-service lines="20"`: Get the last 20 lines of logs for `my-service`.
- `--help`: Display this help message."#
    )
}
