use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    censor::{entities::EntityScanner, secrets::TruffleHogScanner},
    config::Config,
    error::AppError,
};

pub mod entities;
pub mod secrets;

pub const REPLACEMENT: &str = "******";

#[async_trait]
pub trait Redactor: Send + Sync {
    async fn redact(&self, text: &str) -> Result<String, AppError>;
}

/// Secret scanning followed by sensitive-entity scanning.
#[derive(Clone)]
pub struct RedactionGateway {
    secrets: Arc<dyn Redactor>,
    entities: Arc<dyn Redactor>,
}

impl RedactionGateway {
    pub fn new(secrets: Arc<dyn Redactor>, entities: Arc<dyn Redactor>) -> Self {
        Self { secrets, entities }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            Arc::new(TruffleHogScanner::new(&config.trufflehog_bin)),
            Arc::new(EntityScanner::new(&config.censor_entities)?),
        ))
    }

    /// Empty text skips both stages; an empty secret-stage result skips the entity stage.
    pub async fn censor(&self, text: &str) -> Result<String, AppError> {
        if text.is_empty() {
            return Ok(text.to_string());
        }
        let without_secrets = self.secrets.redact(text).await?;
        if without_secrets.is_empty() {
            return Ok(without_secrets);
        }
        self.entities.redact(&without_secrets).await
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::app_err;

    /// Replaces `needle` and counts invocations.
    pub struct ReplaceRedactor {
        pub needle: &'static str,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl ReplaceRedactor {
        pub fn new(needle: &'static str) -> Arc<Self> {
            Arc::new(Self {
                needle,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                needle: "",
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Redactor for ReplaceRedactor {
        async fn redact(&self, text: &str) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return app_err!("scanner exited with status 1");
            }
            Ok(text.replace(self.needle, REPLACEMENT))
        }
    }
}
