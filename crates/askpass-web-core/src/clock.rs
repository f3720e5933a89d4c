//! Monotonic clock readings comparable with `NotAfter`.
//!
//! The password-agent protocol expresses deadlines as microseconds on
//! `CLOCK_MONOTONIC`, which `std::time::Instant` does not expose.

use std::time::Duration;

use tracing::warn;

/// Current `CLOCK_MONOTONIC` time as a duration since its epoch.
///
/// Falls back to zero, which makes every prompt with a `NotAfter` look
/// unexpired, if the clock cannot be read. The failure is logged.
pub fn monotonic_now() -> Duration {
    or_zero(read_monotonic())
}

fn or_zero(reading: std::io::Result<Duration>) -> Duration {
    match reading {
        Ok(now) => now,
        Err(e) => {
            warn!(error = %e, "Failed to read CLOCK_MONOTONIC, treating prompts as unexpired");
            Duration::ZERO
        }
    }
}

fn read_monotonic() -> std::io::Result<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // Safety: `ts` is a valid, writable timespec, and CLOCK_MONOTONIC is
    // always supported on the platforms we build for.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}
