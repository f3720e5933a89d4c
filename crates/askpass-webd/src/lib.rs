//! askpass-web daemon implementation.
//!
//! This crate serves pending systemd password prompts over HTTP: it lists
//! them as web forms and relays submitted answers back to the waiting
//! process. Prompt discovery and delivery live in `askpass-web-core`; this
//! crate adds the listener providers, the HTTP surface and lifecycle
//! management (idle shutdown, signals).
//!
//! Transport security is not handled here. The daemon speaks plain HTTP;
//! deploy it behind TLS or on a trusted network only.

pub mod daemon;
pub mod idle;
pub mod listener;
pub mod page;
pub mod server;

// Re-export main components
pub use daemon::{shutdown_signal, Daemon};
pub use idle::{IdleSupervisor, SupervisorState, DEFAULT_GRACE_PERIOD};
pub use listener::{resolve, resolve_str, InheritedFdProvider, TcpBindProvider};
