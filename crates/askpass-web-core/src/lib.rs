//! Core types and utilities for askpass-web.
//!
//! This crate implements the part of the systemd password-agent protocol
//! that does not depend on how the user is reached: discovering pending
//! prompts on disk and relaying answers back to them. It knows nothing about
//! HTTP.
//!
//! # Modules
//!
//! - [`descriptor`]: Parsed `ask.*` prompt files and answer delivery
//! - [`registry`]: Fresh-per-call snapshot of valid prompts
//! - [`reply`]: Answer/cancel datagram encoding
//! - [`relay`]: Name resolution plus delivery (`AnswerRelay`)
//! - [`listen`]: `ADDR:PORT` / `fd:<n>` listen specifications
//! - [`traits`]: Pluggable component traits (`ListenerProvider`)
//! - [`config`]: TOML configuration
//! - [`clock`]: `CLOCK_MONOTONIC` readings for `NotAfter`
//!
//! # Example
//!
//! ```
//! use askpass_web_core::descriptor::Descriptor;
//! use askpass_web_core::reply::Reply;
//!
//! let prompt = Descriptor::parse_str(
//!     "/run/systemd/ask-password/ask.abc123",
//!     "[Ask]\nMessage=Enter passphrase\nSocket=/run/systemd/ask-password/sck.abc123\n",
//! )
//! .unwrap();
//! assert_eq!(prompt.message(), "Enter passphrase");
//!
//! assert_eq!(Reply::answer("hunter2").encode().as_slice(), b"+hunter2");
//! ```

pub mod clock;
pub mod config;
pub mod descriptor;
pub mod listen;
pub mod registry;
pub mod relay;
pub mod reply;
pub mod traits;

// Re-export commonly used types at the crate root for convenience
pub use config::{AskConfig, Config, ConfigError, ServerConfig};
pub use descriptor::{DeliveryError, Descriptor, DescriptorError, WRITE_TIMEOUT};
pub use listen::ListenSpec;
pub use registry::{PromptRegistry, PROMPT_PREFIX};
pub use relay::{AnswerRelay, RelayError};
pub use reply::Reply;
pub use traits::{ListenerError, ListenerProvider};
