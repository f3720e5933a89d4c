//! Trait definitions for pluggable components.
//!
//! The HTTP listener is produced behind a trait so that the daemon does not
//! care whether it binds a fresh socket or adopts one handed over by a
//! supervising process (inetd, systemd socket units). Platforms with a
//! different activation mechanism only need another provider.

use std::future::Future;
use std::os::unix::io::RawFd;
use std::pin::Pin;

use tokio::net::TcpListener;

/// Error type for listener provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listen specification could not be understood.
    #[error("invalid listen spec: {0}")]
    InvalidSpec(String),

    /// Binding the requested address failed.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The inherited descriptor could not be used as a listener.
    #[error("failed to adopt fd {fd}: {source}")]
    AdoptFailed {
        fd: RawFd,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for listener provider implementations.
///
/// # Example (Bind Implementation)
///
/// ```ignore
/// struct TcpBindProvider {
///     addr: String,
/// }
///
/// impl ListenerProvider for TcpBindProvider {
///     fn listen(
///         &self,
///     ) -> Pin<Box<dyn Future<Output = Result<TcpListener, ListenerError>> + Send + '_>> {
///         Box::pin(async move {
///             TcpListener::bind(self.addr.as_str())
///                 .await
///                 .map_err(|source| ListenerError::BindFailed {
///                     addr: self.addr.clone(),
///                     source,
///                 })
///         })
///     }
///
///     fn describe(&self) -> String {
///         format!("tcp {}", self.addr)
///     }
/// }
/// ```
pub trait ListenerProvider: Send + Sync {
    /// Create and return a listener ready to accept connections.
    fn listen(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<TcpListener, ListenerError>> + Send + '_>>;

    /// Human readable description of the listener source (for logging).
    fn describe(&self) -> String;
}

impl<P: ListenerProvider + ?Sized> ListenerProvider for Box<P> {
    fn listen(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<TcpListener, ListenerError>> + Send + '_>> {
        (**self).listen()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
