//! Snapshot of the prompts currently waiting for an answer.
//!
//! A [`PromptRegistry`] is built from a directory listing every time it is
//! needed and never cached: systemd adds and withdraws prompt files at any
//! moment, and a stale view could route an answer to a prompt that no longer
//! exists.
//!
//! # Security
//!
//! [`PromptRegistry::enumerate`] accepts no user input. The names later
//! passed to [`PromptRegistry::find`] come from HTTP clients and are only
//! ever used as map keys; they never reach the filesystem.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::clock::monotonic_now;
use crate::descriptor::Descriptor;

/// File name prefix of prompt descriptors.
pub const PROMPT_PREFIX: &str = "ask.";

/// Valid, unexpired prompts keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    prompts: BTreeMap<String, Descriptor>,
}

impl PromptRegistry {
    /// Enumerate the prompts in `dir` as of now.
    pub fn enumerate(dir: &Path) -> Self {
        Self::enumerate_at(dir, monotonic_now())
    }

    /// Enumerate the prompts in `dir`, judging expiry against `now`.
    ///
    /// Never fails: an unreadable directory yields an empty registry, and
    /// entries that cannot be parsed or have expired are logged and skipped.
    pub fn enumerate_at(dir: &Path, now: Duration) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list prompt directory");
                return Self::default();
            }
        };

        let mut prompts = BTreeMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    continue;
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                trace!(name = ?entry.file_name(), "Skipping non UTF-8 entry");
                continue;
            };
            if !name.starts_with(PROMPT_PREFIX) {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                trace!(name = %name, "Skipping directory");
                continue;
            }

            let descriptor = match Descriptor::parse(entry.path()) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(error = %e, "Skipping prompt");
                    continue;
                }
            };
            if let Err(e) = descriptor.ensure_fresh(now) {
                debug!(error = %e, "Skipping prompt");
                continue;
            }

            prompts.insert(name, descriptor);
        }

        debug!(dir = %dir.display(), count = prompts.len(), "Enumerated prompts");
        Self { prompts }
    }

    /// Look up a prompt by its opaque name.
    ///
    /// `name` may be arbitrary untrusted input.
    pub fn find(&self, name: &str) -> Option<&Descriptor> {
        self.prompts.get(name)
    }

    /// Iterate over prompts in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.prompts.iter().map(|(name, d)| (name.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
