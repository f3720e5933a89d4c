//! Inherited socket provider.
//!
//! A supervising process (inetd, or systemd with a `.socket` unit) can open
//! and bind the listening socket itself and pass it down as an open file
//! descriptor, selected with `--listen fd:<n>`. Nothing is bound here.

use std::future::Future;
use std::io;
use std::os::unix::io::{FromRawFd, RawFd};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use askpass_web_core::{ListenerError, ListenerProvider};
use tokio::net::TcpListener;
use tracing::debug;

/// Listener provider adopting an already listening TCP descriptor.
///
/// The first successful [`ListenerProvider::listen`] takes ownership of the
/// descriptor. Later calls fail with [`ListenerError::AdoptFailed`].
pub struct InheritedFdProvider {
    fd: RawFd,
    adopted: AtomicBool,
}

impl InheritedFdProvider {
    pub fn new(fd: RawFd) -> Self {
        Self {
            fd,
            adopted: AtomicBool::new(false),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    fn adopt_failed(&self, source: io::Error) -> ListenerError {
        ListenerError::AdoptFailed {
            fd: self.fd,
            source,
        }
    }

    fn rejected(&self, reason: &'static str) -> ListenerError {
        self.adopt_failed(io::Error::new(io::ErrorKind::InvalidInput, reason))
    }

    fn socket_option(&self, option: libc::c_int) -> Result<libc::c_int, ListenerError> {
        let mut value: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        // Safety: both out-pointers reference live locals of the sizes
        // getsockopt expects. Invalid descriptors are reported via errno.
        let rc = unsafe {
            libc::getsockopt(
                self.fd,
                libc::SOL_SOCKET,
                option,
                &mut value as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if rc == -1 {
            return Err(self.adopt_failed(io::Error::last_os_error()));
        }
        Ok(value)
    }

    /// Check that the descriptor is a listening TCP socket (IPv4 or IPv6).
    fn check_listening(&self) -> Result<(), ListenerError> {
        if self.socket_option(libc::SO_ACCEPTCONN)? == 0 {
            return Err(self.rejected("descriptor is not a listening socket"));
        }
        let domain = self.socket_option(libc::SO_DOMAIN)?;
        if domain != libc::AF_INET && domain != libc::AF_INET6 {
            return Err(self.rejected("descriptor is not an IPv4 or IPv6 socket"));
        }
        if self.socket_option(libc::SO_TYPE)? != libc::SOCK_STREAM {
            return Err(self.rejected("descriptor is not a stream socket"));
        }
        Ok(())
    }

    fn adopt(&self) -> Result<TcpListener, ListenerError> {
        self.check_listening()?;

        if self.adopted.swap(true, Ordering::AcqRel) {
            return Err(self.adopt_failed(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "descriptor was already adopted",
            )));
        }

        // Safety: the descriptor is an open, listening TCP socket handed to
        // this process for its exclusive use, and the flag above makes this
        // the only place it is wrapped. The listener owns it from here on.
        let std_listener = unsafe { std::net::TcpListener::from_raw_fd(self.fd) };

        std_listener
            .set_nonblocking(true)
            .map_err(|e| self.adopt_failed(e))?;

        let listener = TcpListener::from_std(std_listener).map_err(|e| self.adopt_failed(e))?;

        debug!(fd = self.fd, "Acquired inherited socket");
        Ok(listener)
    }
}

impl ListenerProvider for InheritedFdProvider {
    fn listen(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<TcpListener, ListenerError>> + Send + '_>> {
        Box::pin(async move { self.adopt() })
    }

    fn describe(&self) -> String {
        format!("fd {}", self.fd)
    }
}
