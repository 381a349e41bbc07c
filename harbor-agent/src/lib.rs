//! Launch-agent management for the harbor gateway daemon.
//!
//! This library converges the installed/running state of the gateway's
//! per-user launchd job toward a desired configuration (listening port, bind
//! mode, auth token/password) while avoiding disruptive restarts of an
//! already-correct process. The [`agent::LaunchAgent`] engine decides between
//! leaving the job alone, kickstarting it in place, or rewriting the
//! descriptor and reloading it; the remaining modules are the leaves it is
//! built from.

use std::path::PathBuf;

pub mod agent;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod gate;
pub mod launchctl;
pub mod state;

const GLOBAL_STATE_DIR: &str = ".harbor";

/// Per-user state directory (`~/.harbor`).
pub fn global_state_dir() -> PathBuf {
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(GLOBAL_STATE_DIR)
}

/// Path of the JSON configuration store.
pub fn config_file_path() -> PathBuf {
    global_state_dir().join("config.json")
}

/// Directory the per-user service manager loads descriptors from.
pub fn launch_agents_dir() -> PathBuf {
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join("Library/LaunchAgents")
}

/// Log file the gateway's stdout and stderr are redirected to.
pub fn gateway_log_path() -> PathBuf {
    global_state_dir().join("logs").join("gateway.log")
}
