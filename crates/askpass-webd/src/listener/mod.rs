//! Listener provider implementations for the daemon.
//!
//! - [`TcpBindProvider`]: binds a fresh TCP socket on `ADDR:PORT`
//! - [`InheritedFdProvider`]: adopts a listening socket passed in as a file
//!   descriptor (inetd, systemd socket units)
//!
//! Both implement the [`ListenerProvider`] trait from `askpass-web-core`.

mod bind;
mod inherited;

pub use bind::TcpBindProvider;
pub use inherited::InheritedFdProvider;

use askpass_web_core::{ListenSpec, ListenerError, ListenerProvider};

/// Create the provider matching a parsed listen specification.
pub fn resolve(spec: &ListenSpec) -> Box<dyn ListenerProvider> {
    match spec {
        ListenSpec::Address(addr) => {
            tracing::info!(addr = %addr, "Using fresh TCP bind");
            Box::new(TcpBindProvider::new(addr.clone()))
        }
        ListenSpec::Descriptor(fd) => {
            tracing::info!(fd = fd, "Using inherited socket");
            Box::new(InheritedFdProvider::new(*fd))
        }
    }
}

/// Parse `spec` and create the matching provider.
pub fn resolve_str(spec: &str) -> Result<Box<dyn ListenerProvider>, ListenerError> {
    Ok(resolve(&ListenSpec::parse(spec)?))
}
