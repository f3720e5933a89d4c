//! Password prompt descriptors.
//!
//! systemd (and anything else speaking the password-agent protocol) writes
//! one `ask.*` file per pending question into the ask-password directory.
//! Each file is INI-like with a single `[Ask]` section:
//!
//! ```text
//! [Ask]
//! PID=412
//! Socket=/run/systemd/ask-password/sck.5f1c2e
//! AcceptCached=1
//! Echo=0
//! NotAfter=15300000000
//! Message=Please enter passphrase for disk root
//! Id=cryptsetup:/dev/sda2
//! ```
//!
//! A [`Descriptor`] is the parsed, immutable form of such a file. It knows
//! how to check its own expiry and how to deliver a [`Reply`] to the
//! datagram socket that is waiting for it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{Ini, ParseOption};
use thiserror::Error;
use tokio::net::UnixDatagram;
use tracing::debug;

use crate::reply::Reply;

/// Section holding the prompt keys.
pub const ASK_SECTION: &str = "Ask";

/// Deadline for writing an answer to the prompt socket.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced while loading a descriptor file.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not in the expected format.
    #[error("malformed prompt file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// A required key is absent or empty.
    #[error("missing key in {}: {key}", path.display())]
    MissingField { path: PathBuf, key: &'static str },

    /// `NotAfter` has passed.
    #[error("prompt {} expired: current time ({now:?}) > NotAfter ({not_after:?})", path.display())]
    Expired {
        path: PathBuf,
        now: Duration,
        not_after: Duration,
    },
}

/// Errors produced while writing a reply to the prompt socket.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The datagram socket could not be created or connected.
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The write failed.
    #[error("failed to send answer: {0}")]
    Send(#[source] std::io::Error),

    /// The write did not complete before the deadline.
    #[error("answer was not accepted within {0:?}")]
    Timeout(Duration),

    /// Fewer bytes than the full datagram were written.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// A pending password prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    path: PathBuf,
    message: String,
    icon: Option<String>,
    socket: PathBuf,
    not_after: Option<Duration>,
    echo: bool,
    id: Option<String>,
}

impl Descriptor {
    /// Read and parse the descriptor file at `path`.
    ///
    /// Expiry is not checked here; see [`Descriptor::ensure_fresh`].
    pub fn parse(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(path, &contents)
    }

    /// Parse descriptor `contents` as if read from `path`.
    pub fn parse_str(path: impl AsRef<Path>, contents: &str) -> Result<Self, DescriptorError> {
        let path = path.as_ref().to_path_buf();
        let malformed = |reason: String| DescriptorError::Malformed {
            path: path.clone(),
            reason,
        };

        // Values are taken verbatim: messages may legitimately contain
        // quotes and backslashes.
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(contents, options).map_err(|e| malformed(e.to_string()))?;

        let section = ini.section(Some(ASK_SECTION));
        let value = |key: &str| {
            section
                .and_then(|s| s.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let not_after = match value("NotAfter") {
            None => None,
            Some(raw) => {
                let usec: u64 = raw
                    .parse()
                    .map_err(|_| malformed(format!("invalid NotAfter value: {raw:?}")))?;
                // 0 means the prompt never expires
                (usec > 0).then(|| Duration::from_micros(usec))
            }
        };

        let echo = match value("Echo") {
            None => false,
            Some(raw) => {
                parse_bool(raw).ok_or_else(|| malformed(format!("invalid Echo value: {raw:?}")))?
            }
        };

        let message = value("Message").map(str::to_owned);
        let socket = value("Socket").map(PathBuf::from);
        let icon = value("Icon").map(str::to_owned);
        let id = value("Id").map(str::to_owned);

        let Some(message) = message else {
            return Err(DescriptorError::MissingField {
                path,
                key: "Message",
            });
        };
        let Some(socket) = socket else {
            return Err(DescriptorError::MissingField {
                path,
                key: "Socket",
            });
        };

        Ok(Self {
            path,
            message,
            icon,
            socket,
            not_after,
            echo,
            id,
        })
    }

    /// Path of the descriptor file this prompt was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Question to show the user.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Optional icon hint.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Datagram socket the answer is written to.
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// `CLOCK_MONOTONIC` time after which the prompt is void.
    pub fn not_after(&self) -> Option<Duration> {
        self.not_after
    }

    /// Whether the answer may be echoed while typed.
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Identifier of the requesting service, if given.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns true iff `now` is strictly after `NotAfter`.
    ///
    /// A prompt without `NotAfter` never expires, and `now == NotAfter` is
    /// still valid.
    pub fn is_expired(&self, now: Duration) -> bool {
        matches!(self.not_after, Some(not_after) if now > not_after)
    }

    /// Like [`Descriptor::is_expired`], but reports expiry as an error.
    pub fn ensure_fresh(&self, now: Duration) -> Result<(), DescriptorError> {
        match self.not_after {
            Some(not_after) if now > not_after => Err(DescriptorError::Expired {
                path: self.path.clone(),
                now,
                not_after,
            }),
            _ => Ok(()),
        }
    }

    /// Deliver `reply` to the prompt socket within [`WRITE_TIMEOUT`].
    pub async fn deliver(&self, reply: &Reply) -> Result<(), DeliveryError> {
        self.deliver_within(reply, WRITE_TIMEOUT).await
    }

    /// Deliver `reply` to the prompt socket, giving up after `deadline`.
    ///
    /// Exactly one datagram is sent. The socket is closed on return, whatever
    /// the outcome.
    pub async fn deliver_within(
        &self,
        reply: &Reply,
        deadline: Duration,
    ) -> Result<(), DeliveryError> {
        let connect_err = |source| DeliveryError::Connect {
            path: self.socket.clone(),
            source,
        };
        let sock = UnixDatagram::unbound().map_err(connect_err)?;
        sock.connect(&self.socket).map_err(connect_err)?;

        let datagram = reply.encode();
        let written = tokio::time::timeout(deadline, sock.send(&datagram))
            .await
            .map_err(|_| DeliveryError::Timeout(deadline))?
            .map_err(DeliveryError::Send)?;

        if written < datagram.len() {
            return Err(DeliveryError::ShortWrite {
                written,
                expected: datagram.len(),
            });
        }

        debug!(
            socket = %self.socket.display(),
            cancel = reply.is_cancel(),
            "Delivered reply"
        );
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = "\
[Ask]
PID=412
Socket=/run/systemd/ask-password/sck.5f1c2e
AcceptCached=1
Echo=0
NotAfter=15300000000
Message=Please enter passphrase for disk root
Icon=drive-harddisk
Id=cryptsetup:/dev/sda2
";

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn parse_full_descriptor() {
        let d = Descriptor::parse_str("/run/ask/ask.abc", FULL).unwrap();

        assert_eq!(d.path(), Path::new("/run/ask/ask.abc"));
        assert_eq!(d.message(), "Please enter passphrase for disk root");
        assert_eq!(d.icon(), Some("drive-harddisk"));
        assert_eq!(
            d.socket(),
            Path::new("/run/systemd/ask-password/sck.5f1c2e")
        );
        assert_eq!(d.not_after(), Some(Duration::from_micros(15_300_000_000)));
        assert!(!d.echo());
        assert_eq!(d.id(), Some("cryptsetup:/dev/sda2"));
    }

    #[test]
    fn parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{FULL}").unwrap();

        let d = Descriptor::parse(file.path()).unwrap();
        assert_eq!(d.path(), file.path());
        assert_eq!(d.message(), "Please enter passphrase for disk root");
    }

    #[test]
    fn parse_minimal_descriptor() {
        let d = Descriptor::parse_str("ask.x", "[Ask]\nMessage=Hi\nSocket=/tmp/s\n").unwrap();

        assert_eq!(d.icon(), None);
        assert_eq!(d.id(), None);
        assert_eq!(d.not_after(), None);
        assert!(!d.echo());
    }

    #[test]
    fn message_is_taken_verbatim() {
        let d = Descriptor::parse_str(
            "ask.x",
            "[Ask]\nMessage=Enter \"root\" key for C:\\disk\nSocket=/tmp/s\n",
        )
        .unwrap();
        assert_eq!(d.message(), "Enter \"root\" key for C:\\disk");
    }

    #[test]
    fn missing_message_is_missing_field() {
        let err = Descriptor::parse_str("ask.x", "[Ask]\nSocket=/tmp/s\n").unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingField { key: "Message", .. }
        ));
    }

    #[test]
    fn empty_socket_is_missing_field() {
        let err = Descriptor::parse_str("ask.x", "[Ask]\nMessage=Hi\nSocket=\n").unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingField { key: "Socket", .. }
        ));
    }

    #[test]
    fn keys_outside_ask_section_are_ignored() {
        let err =
            Descriptor::parse_str("ask.x", "[Other]\nMessage=Hi\nSocket=/tmp/s\n").unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField { .. }));
    }

    #[test]
    fn invalid_not_after_is_malformed() {
        let err = Descriptor::parse_str(
            "ask.x",
            "[Ask]\nMessage=Hi\nSocket=/tmp/s\nNotAfter=tomorrow\n",
        )
        .unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { .. }));
    }

    #[test]
    fn unclosed_section_header_is_malformed() {
        let err = Descriptor::parse_str("ask.x", "[Ask\nMessage=Hi\nSocket=/tmp/s\n").unwrap_err();
        match err {
            DescriptorError::Malformed { path, .. } => assert_eq!(path, Path::new("ask.x")),
            other => panic!("Expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn invalid_echo_is_malformed() {
        let err = Descriptor::parse_str("ask.x", "[Ask]\nMessage=Hi\nSocket=/tmp/s\nEcho=maybe\n")
            .unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { .. }));
    }

    #[test]
    fn echo_accepts_systemd_booleans() {
        for raw in ["1", "yes", "TRUE", "on"] {
            let d = Descriptor::parse_str(
                "ask.x",
                &format!("[Ask]\nMessage=Hi\nSocket=/tmp/s\nEcho={raw}\n"),
            )
            .unwrap();
            assert!(d.echo(), "Echo={raw}");
        }
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Descriptor::parse(dir.path().join("ask.gone")).unwrap_err();
        assert!(matches!(err, DescriptorError::Io { .. }));
    }

    #[test]
    fn zero_not_after_never_expires() {
        let d = Descriptor::parse_str("ask.x", "[Ask]\nMessage=Hi\nSocket=/tmp/s\nNotAfter=0\n")
            .unwrap();
        assert_eq!(d.not_after(), None);
        assert!(!d.is_expired(Duration::MAX));
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let d = Descriptor::parse_str(
            "ask.x",
            "[Ask]\nMessage=Hi\nSocket=/tmp/s\nNotAfter=100000000\n",
        )
        .unwrap();

        assert!(!d.is_expired(secs(99)));
        assert!(!d.is_expired(secs(100)));
        assert!(d.is_expired(secs(100) + Duration::from_micros(1)));

        assert!(d.ensure_fresh(secs(100)).is_ok());
        assert!(matches!(
            d.ensure_fresh(secs(101)),
            Err(DescriptorError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn deliver_writes_tagged_datagram() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("sck.test");
        let receiver = std::os::unix::net::UnixDatagram::bind(&sock_path).unwrap();

        let d = Descriptor::parse_str(
            dir.path().join("ask.test"),
            &format!("[Ask]\nMessage=Hi\nSocket={}\n", sock_path.display()),
        )
        .unwrap();

        d.deliver(&Reply::answer("hunter2")).await.unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"+hunter2");
    }

    #[tokio::test]
    async fn deliver_cancel_writes_minus() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("sck.test");
        let receiver = std::os::unix::net::UnixDatagram::bind(&sock_path).unwrap();

        let d = Descriptor::parse_str(
            "ask.test",
            &format!("[Ask]\nMessage=Hi\nSocket={}\n", sock_path.display()),
        )
        .unwrap();

        d.deliver(&Reply::Cancel).await.unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"-");
    }

    #[tokio::test]
    async fn deliver_to_missing_socket_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let d = Descriptor::parse_str(
            "ask.test",
            &format!(
                "[Ask]\nMessage=Hi\nSocket={}\n",
                dir.path().join("sck.gone").display()
            ),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = d.deliver(&Reply::answer("secret")).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Connect { .. }));
        assert!(started.elapsed() < WRITE_TIMEOUT);
    }

    #[tokio::test]
    async fn deliver_times_out_when_receiver_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("sck.full");
        let _receiver = std::os::unix::net::UnixDatagram::bind(&sock_path).unwrap();

        // Fill the receive queue so further sends block.
        let filler = std::os::unix::net::UnixDatagram::unbound().unwrap();
        filler.connect(&sock_path).unwrap();
        filler.set_nonblocking(true).unwrap();
        for _ in 0..100_000 {
            if filler.send(b"+x").is_err() {
                break;
            }
        }

        let d = Descriptor::parse_str(
            "ask.test",
            &format!("[Ask]\nMessage=Hi\nSocket={}\n", sock_path.display()),
        )
        .unwrap();

        let deadline = Duration::from_millis(200);
        let err = d
            .deliver_within(&Reply::answer("secret"), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout(d) if d == deadline));
    }
}
