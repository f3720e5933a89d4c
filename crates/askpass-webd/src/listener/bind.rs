//! Fresh TCP bind provider.

use std::future::Future;
use std::pin::Pin;

use askpass_web_core::{ListenerError, ListenerProvider};
use tokio::net::TcpListener;
use tracing::debug;

/// Listener provider that binds a new TCP socket.
pub struct TcpBindProvider {
    /// `host:port` to bind.
    addr: String,
}

impl TcpBindProvider {
    /// Create a provider for `addr`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn bind(&self) -> Result<TcpListener, ListenerError> {
        let listener = TcpListener::bind(self.addr.as_str())
            .await
            .map_err(|source| ListenerError::BindFailed {
                addr: self.addr.clone(),
                source,
            })?;

        if let Ok(local) = listener.local_addr() {
            debug!(addr = %local, "Socket bound successfully");
        }
        Ok(listener)
    }
}

impl ListenerProvider for TcpBindProvider {
    fn listen(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<TcpListener, ListenerError>> + Send + '_>> {
        Box::pin(self.bind())
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.addr)
    }
}
