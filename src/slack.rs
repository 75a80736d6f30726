use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::{sync::mpsc, time::sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{Instrument, debug, error, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    app_err, app_error,
    config::SlackConfig,
    error::AppError,
    handlers::{CommandHandler, generic_error},
};

const SLACK_API: &str = "https://slack.com/api";
const RETRY_DELAY: Duration = Duration::from_secs(5);
const QUEUE_SIZE: usize = 32;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    url: Option<String>,
    user: Option<String>,
    team: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    envelope_id: Option<String>,
    payload: Option<serde_json::Value>,
    reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlashCommand {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub response_url: String,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SocketEvent {
    Hello,
    Disconnect {
        reason: String,
    },
    SlashCommand {
        envelope_id: String,
        command: SlashCommand,
    },
    Other {
        kind: String,
        envelope_id: Option<String>,
    },
}

pub fn parse_event(text: &str) -> Result<SocketEvent, AppError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let event = match envelope.kind.as_str() {
        "hello" => SocketEvent::Hello,
        "disconnect" => SocketEvent::Disconnect {
            reason: envelope.reason.unwrap_or_default(),
        },
        "slash_commands" => {
            let Some(envelope_id) = envelope.envelope_id else {
                return app_err!("slash_commands envelope without envelope_id");
            };
            let Some(payload) = envelope.payload else {
                return app_err!("slash_commands envelope {envelope_id} without payload");
            };
            SocketEvent::SlashCommand {
                envelope_id,
                command: serde_json::from_value(payload)?,
            }
        }
        _ => SocketEvent::Other {
            kind: envelope.kind,
            envelope_id: envelope.envelope_id,
        },
    };
    Ok(event)
}

pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    app_token: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self, AppError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            api_base: SLACK_API.to_string(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self
    }

    async fn call(&self, method: &str, token: &str) -> Result<ApiResponse, AppError> {
        let response: ApiResponse = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            return app_err!(
                "Slack {method} failed: {}",
                response.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(response)
    }

    // returns `user@team`
    pub async fn auth_test(&self) -> Result<String, AppError> {
        let response = self.call("auth.test", &self.bot_token).await?;
        Ok(format!(
            "{}@{}",
            response.user.unwrap_or_default(),
            response.team.unwrap_or_default()
        ))
    }

    pub async fn open_connection(&self) -> Result<Url, AppError> {
        let response = self.call("apps.connections.open", &self.app_token).await?;
        let url = response
            .url
            .ok_or_else(|| app_error!("Slack apps.connections.open returned no url"))?;
        Url::parse(&url).map_err(|e| app_error!("Invalid Socket Mode url: {e}"))
    }

    pub async fn respond(&self, response_url: &str, text: &str) -> Result<(), AppError> {
        let url = Url::parse(response_url).map_err(|e| app_error!("Invalid response_url: {e}"))?;
        self.http
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Serves one Socket Mode connection until Slack closes or asks us to reconnect.
    async fn listen(&self, queue: &mpsc::Sender<SlashCommand>) -> Result<(), AppError> {
        let url = self.open_connection().await?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| app_error!("Failed to connect to Socket Mode: {e}"))?;
        info!("Connected to Slack Socket Mode");

        let (mut write, mut read) = socket.split();
        while let Some(message) = read.next().await {
            let message = message.map_err(|e| app_error!("Socket Mode read failed: {e}"))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    info!("Socket Mode closed: {frame:?}");
                    return Ok(());
                }
                _ => continue,
            };

            let event = match parse_event(text.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Ignoring Socket Mode message: {e}");
                    continue;
                }
            };

            match event {
                SocketEvent::Hello => debug!("Socket Mode hello"),
                SocketEvent::Disconnect { reason } => {
                    info!("Slack requested reconnect: {reason}");
                    return Ok(());
                }
                SocketEvent::SlashCommand {
                    envelope_id,
                    command,
                } => {
                    write
                        .send(Message::text(ack(&envelope_id)))
                        .await
                        .map_err(|e| app_error!("Failed to ack {envelope_id}: {e}"))?;
                    queue
                        .send(command)
                        .await
                        .map_err(|_| AppError::new("Command worker is gone"))?;
                }
                SocketEvent::Other { kind, envelope_id } => {
                    debug!("Ignoring Socket Mode event {kind}");
                    if let Some(envelope_id) = envelope_id {
                        write
                            .send(Message::text(ack(&envelope_id)))
                            .await
                            .map_err(|e| app_error!("Failed to ack {envelope_id}: {e}"))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn ack(envelope_id: &str) -> String {
    json!({ "envelope_id": envelope_id }).to_string()
}

/// Acks commands as they arrive and answers them one at a time.
pub async fn run(slack: Arc<SlackClient>, handler: Arc<CommandHandler>) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(QUEUE_SIZE);

    let worker = tokio::spawn(process_commands(slack.clone(), handler, rx));

    let listener = tokio::spawn(async move {
        loop {
            match slack.listen(&tx).await {
                Ok(()) => info!("Reconnecting to Slack..."),
                Err(e) => {
                    warn!("Error on Slack connection: {e}");
                    warn!("Retrying in 5 seconds...");
                    sleep(RETRY_DELAY).await;
                }
            }
        }
    });

    tokio::try_join!(worker, listener)?;

    Ok(())
}

async fn process_commands(
    slack: Arc<SlackClient>,
    handler: Arc<CommandHandler>,
    mut queue: mpsc::Receiver<SlashCommand>,
) {
    while let Some(command) = queue.recv().await {
        let span = info_span!(
            "command",
            request_id = %Uuid::new_v4(),
            command = %command.command,
            user = %command.user_name
        );
        handle_command(&slack, &handler, command).instrument(span).await;
    }
}

async fn handle_command(slack: &SlackClient, handler: &Arc<CommandHandler>, command: SlashCommand) {
    info!("Received event: {}", command.text);

    // a panic inside the handler must still produce a reply
    let task = {
        let handler = handler.clone();
        let name = command.command.clone();
        let text = command.text.clone();
        tokio::spawn(async move { handler.dispatch(&name, &text).await }.in_current_span())
    };
    let reply = match task.await {
        Ok(Some(reply)) => reply,
        Ok(None) => format!("Unknown command {}", command.command),
        Err(e) => {
            error!("Error handling {} request: {e}", command.command);
            generic_error(&command.command)
        }
    };

    if let Err(e) = slack.respond(&command.response_url, &reply).await {
        error!("Failed to respond to {}: {e}", command.command);
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    use super::*;
    use crate::{
        censor::{RedactionGateway, testing::ReplaceRedactor},
        cluster::testing::FakeCluster,
        handlers::SERVICE_REQUIRED,
        inspector::ServiceInspector,
        prober::VersionProber,
    };

    fn client(base: &str) -> SlackClient {
        SlackClient::new(&SlackConfig {
            bot_token: "xoxb-test".to_string(),
            app_token: "xapp-test".to_string(),
        })
        .unwrap()
        .with_api_base(base)
    }

    fn handler() -> Arc<CommandHandler> {
        handler_for(FakeCluster::default())
    }

    fn handler_for(cluster: FakeCluster) -> Arc<CommandHandler> {
        let inspector = ServiceInspector::new(
            Arc::new(cluster),
            VersionProber::new("/version").unwrap(),
            "app.kubernetes.io/name",
        );
        let gateway = RedactionGateway::new(ReplaceRedactor::new("x"), ReplaceRedactor::new("y"));
        Arc::new(CommandHandler::new(inspector, Arc::new(gateway), "app.kubernetes.io/name", 10))
    }

    #[test]
    fn parses_slash_command_envelope() {
        let raw = r#"{
            "envelope_id": "57d6a792-4d35-4d0b-b6aa-3361493e1caf",
            "type": "slash_commands",
            "accepts_response_payload": true,
            "payload": {
                "command": "/logs",
                "text": "service=api lines=5",
                "user_name": "alice",
                "response_url": "https://hooks.slack.com/commands/T1/2/abc",
                "channel_id": "C1"
            }
        }"#;

        assert_eq!(
            parse_event(raw).unwrap(),
            SocketEvent::SlashCommand {
                envelope_id: "57d6a792-4d35-4d0b-b6aa-3361493e1caf".to_string(),
                command: SlashCommand {
                    command: "/logs".to_string(),
                    text: "service=api lines=5".to_string(),
                    response_url: "https://hooks.slack.com/commands/T1/2/abc".to_string(),
                    user_name: "alice".to_string(),
                },
            }
        );
    }

    #[test]
    fn parses_control_envelopes() {
        assert_eq!(
            parse_event(r#"{"type":"hello","num_connections":1}"#).unwrap(),
            SocketEvent::Hello
        );
        assert_eq!(
            parse_event(r#"{"type":"disconnect","reason":"refresh_requested"}"#).unwrap(),
            SocketEvent::Disconnect {
                reason: "refresh_requested".to_string()
            }
        );
        assert_eq!(
            parse_event(r#"{"type":"events_api","envelope_id":"e1","payload":{}}"#).unwrap(),
            SocketEvent::Other {
                kind: "events_api".to_string(),
                envelope_id: Some("e1".to_string())
            }
        );
        assert!(parse_event(r#"{"type":"slash_commands","payload":{}}"#).is_err());
        assert!(parse_event("not json").is_err());
    }

    #[test]
    fn ack_payload() {
        assert_eq!(ack("abc"), r#"{"envelope_id":"abc"}"#);
    }

    #[tokio::test]
    async fn opens_socket_mode_connection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apps.connections.open"))
            .and(header("authorization", "Bearer xapp-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "url": "wss://wss-primary.slack.com/link/?ticket=abc"
            })))
            .mount(&server)
            .await;

        let url = client(&server.uri()).open_connection().await.unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("wss-primary.slack.com"));
    }

    #[tokio::test]
    async fn api_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "invalid_auth" })),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri()).auth_test().await.unwrap_err();
        assert!(err.message.contains("invalid_auth"));
    }

    #[tokio::test]
    async fn worker_answers_on_response_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/respond"))
            .and(body_json(json!({ "text": SERVICE_REQUIRED })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/respond-unknown"))
            .and(body_json(json!({ "text": "Unknown command /deploy" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let slack = Arc::new(client(&server.uri()));
        let (tx, rx) = mpsc::channel(4);
        tx.send(SlashCommand {
            command: "/logs".to_string(),
            text: "namespace=web".to_string(),
            response_url: format!("{}/respond", server.uri()),
            user_name: "alice".to_string(),
        })
        .await
        .unwrap();
        tx.send(SlashCommand {
            command: "/deploy".to_string(),
            text: String::new(),
            response_url: format!("{}/respond-unknown", server.uri()),
            user_name: "alice".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        process_commands(slack, handler(), rx).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn panicking_command_gets_the_generic_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/respond"))
            .and(body_json(json!({
                "text": "An error occurred while processing the /version request."
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let slack = Arc::new(client(&server.uri()));
        let cluster = FakeCluster {
            panic_on_list: true,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel(4);
        tx.send(SlashCommand {
            command: "/version".to_string(),
            text: "service=api".to_string(),
            response_url: format!("{}/respond", server.uri()),
            user_name: "alice".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        process_commands(slack, handler_for(cluster), rx).await;
        server.verify().await;
    }
}
