//! Refuse to run with root privileges.
//!
//! Termux packages and `pip --user` installs belong to the app user; running
//! them as root leaves files the app can no longer modify.

use anyhow::Result;

/// Whether the effective user is root.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Bail out when running as root.
pub fn ensure_not_root() -> Result<()> {
    if is_root() {
        anyhow::bail!("Do not run pockit as root; Termux packages must be managed as the app user");
    }
    Ok(())
}
