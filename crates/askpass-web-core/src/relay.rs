//! Resolving a prompt name and relaying the user's reply to it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::AskConfig;
use crate::descriptor::{DeliveryError, WRITE_TIMEOUT};
use crate::registry::PromptRegistry;
use crate::reply::Reply;

/// Errors returned by [`AnswerRelay::relay`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// No current prompt has the requested name.
    #[error("prompt not found")]
    NotFound,

    /// The prompt exists but the reply could not be delivered.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Delivers replies to prompts found in an ask-password directory.
///
/// Each call enumerates the directory afresh. Delivery is attempted exactly
/// once: prompt sockets are one-shot, so a retry has nothing meaningful to
/// talk to.
#[derive(Debug, Clone)]
pub struct AnswerRelay {
    ask_dir: PathBuf,
    write_timeout: Duration,
}

impl AnswerRelay {
    /// Create a relay for `ask_dir` with the default write timeout.
    pub fn new(ask_dir: impl Into<PathBuf>) -> Self {
        Self {
            ask_dir: ask_dir.into(),
            write_timeout: WRITE_TIMEOUT,
        }
    }

    /// Create a relay from the `[ask]` configuration section.
    pub fn from_config(config: &AskConfig) -> Self {
        Self::new(&config.directory).with_write_timeout(config.write_timeout())
    }

    /// Override the write timeout.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn ask_dir(&self) -> &Path {
        &self.ask_dir
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Enumerate the current prompts.
    ///
    /// Directory scanning runs on the blocking pool.
    pub async fn prompts(&self) -> PromptRegistry {
        let dir = self.ask_dir.clone();
        match tokio::task::spawn_blocking(move || PromptRegistry::enumerate(&dir)).await {
            Ok(registry) => registry,
            Err(e) => {
                error!(error = %e, "Prompt enumeration task failed");
                PromptRegistry::default()
            }
        }
    }

    /// Resolve `name` against a fresh registry and deliver `reply` to it.
    pub async fn relay(&self, name: &str, reply: &Reply) -> Result<(), RelayError> {
        let registry = self.prompts().await;
        let Some(descriptor) = registry.find(name) else {
            warn!(name = ?name, "Reply for unknown prompt");
            return Err(RelayError::NotFound);
        };

        descriptor.deliver_within(reply, self.write_timeout).await?;

        info!(
            prompt = %descriptor.path().display(),
            cancel = reply.is_cancel(),
            "Reply relayed"
        );
        Ok(())
    }
}
