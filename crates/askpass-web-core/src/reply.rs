//! Replies sent back to a waiting prompt.
//!
//! The password-agent wire format is a single datagram: a one-byte tag
//! (`+` for an answer, `-` for cancellation) immediately followed by the
//! raw answer bytes. There is no length prefix and no terminator.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Tag preceding an answer.
pub const ANSWER_TAG: u8 = b'+';

/// Tag signalling cancellation.
pub const CANCEL_TAG: u8 = b'-';

/// The user's response to a prompt.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The user supplied a secret.
    Answer(SecretString),
    /// The user declined to answer.
    Cancel,
}

impl Reply {
    /// Build an answer reply.
    pub fn answer(secret: impl Into<String>) -> Self {
        Reply::Answer(SecretString::from(secret.into()))
    }

    /// Returns true for [`Reply::Cancel`].
    pub fn is_cancel(&self) -> bool {
        matches!(self, Reply::Cancel)
    }

    /// Encode the reply as the datagram payload.
    ///
    /// The buffer is wiped when dropped.
    pub fn encode(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Reply::Answer(secret) => {
                let secret = secret.expose_secret().as_bytes();
                let mut buf = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
                buf.push(ANSWER_TAG);
                buf.extend_from_slice(secret);
                buf
            }
            Reply::Cancel => Zeroizing::new(vec![CANCEL_TAG]),
        }
    }
}
