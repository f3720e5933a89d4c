//! Listen specification strings.
//!
//! `ADDR:PORT` requests a fresh TCP bind; `fd:<n>` requests adoption of an
//! already listening socket inherited as file descriptor `n`.

use std::fmt;
use std::os::unix::io::RawFd;
use std::str::FromStr;

use crate::traits::ListenerError;

const FD_PREFIX: &str = "fd:";

/// Where the HTTP listener comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenSpec {
    /// Bind a new socket on `host:port`.
    Address(String),
    /// Adopt an inherited listening descriptor.
    Descriptor(RawFd),
}

impl ListenSpec {
    /// Parse a listen specification.
    ///
    /// The `fd:` prefix is matched case-insensitively.
    pub fn parse(spec: &str) -> Result<Self, ListenerError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ListenerError::InvalidSpec("empty listen spec".to_string()));
        }

        let has_fd_prefix = spec
            .get(..FD_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(FD_PREFIX));
        if !has_fd_prefix {
            return Ok(ListenSpec::Address(spec.to_string()));
        }

        let raw = &spec[FD_PREFIX.len()..];
        match raw.parse::<RawFd>() {
            Ok(fd) if fd >= 0 => Ok(ListenSpec::Descriptor(fd)),
            _ => Err(ListenerError::InvalidSpec(format!(
                "bad file descriptor number in {spec:?}"
            ))),
        }
    }
}

impl FromStr for ListenSpec {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ListenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenSpec::Address(addr) => write!(f, "{addr}"),
            ListenSpec::Descriptor(fd) => write!(f, "fd:{fd}"),
        }
    }
}
