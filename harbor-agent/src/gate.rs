//! Sentinel gate suppressing launch-agent installation.

use std::path::PathBuf;

/// Marker file that, when present, forbids this engine from installing or
/// rewriting the launch agent. Gates `enable` only; disabling must always
/// remain possible.
#[derive(Debug, Clone)]
pub struct WriteGate {
    marker: PathBuf,
}

impl WriteGate {
    pub fn new(marker: PathBuf) -> Self {
        Self { marker }
    }

    /// Marker at its standard location under the per-user state directory.
    pub fn system() -> Self {
        Self::new(crate::global_state_dir().join("disable-launchagent"))
    }

    pub fn is_write_disabled(&self) -> bool {
        self.marker.exists()
    }
}
