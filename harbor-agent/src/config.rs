//! Desired-configuration resolution for the gateway launch agent.
//!
//! Bind mode, auth token, and auth password are each resolved from an
//! environment override first, falling back to nested keys in the JSON
//! configuration store (`gateway.bind`, `gateway.auth.token`,
//! `gateway.auth.password`). The resolver operates on the snapshot it was
//! constructed with and performs no I/O of its own.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

/// Environment variable overriding the gateway bind mode.
pub const BIND_ENV: &str = "HARBOR_GATEWAY_BIND";
/// Environment variable overriding the gateway auth token.
pub const TOKEN_ENV: &str = "HARBOR_GATEWAY_TOKEN";
/// Environment variable overriding the gateway auth password.
pub const PASSWORD_ENV: &str = "HARBOR_GATEWAY_PASSWORD";

/// Network-exposure mode the gateway daemon should listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Local-only (127.0.0.1).
    Loopback,
    /// Private overlay network interface.
    Tailnet,
    /// Local-area network.
    Lan,
    /// Pick the widest interface that is safe to expose.
    Auto,
}

impl BindMode {
    /// Parse a raw string, trimming whitespace and lowercasing. Anything
    /// outside the supported set is rejected rather than carried along.
    pub fn parse(raw: &str) -> Option<BindMode> {
        match raw.trim().to_lowercase().as_str() {
            "loopback" => Some(BindMode::Loopback),
            "tailnet" => Some(BindMode::Tailnet),
            "lan" => Some(BindMode::Lan),
            "auto" => Some(BindMode::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BindMode::Loopback => "loopback",
            BindMode::Tailnet => "tailnet",
            BindMode::Lan => "lan",
            BindMode::Auto => "auto",
        }
    }
}

impl fmt::Display for BindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the desired gateway configuration from layered sources.
pub struct ConfigResolver {
    env: HashMap<String, String>,
    config: Value,
    remote: bool,
}

impl ConfigResolver {
    /// Build a resolver over an environment snapshot and a parsed config
    /// store. Remote connection mode is detected from `connection.mode`.
    pub fn new(env: HashMap<String, String>, config: Value) -> Self {
        let remote = config
            .pointer("/connection/mode")
            .and_then(Value::as_str)
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("remote"));
        Self { env, config, remote }
    }

    /// Snapshot the process environment and load the configuration store
    /// from its standard location.
    pub fn from_system() -> Self {
        Self::new(std::env::vars().collect(), load_config_file(&crate::config_file_path()))
    }

    /// Resolve the desired bind mode.
    ///
    /// Returns `None` in remote connection mode (the gateway runs elsewhere,
    /// so local bind detection is suppressed) and when neither the
    /// environment override nor `gateway.bind` holds a supported value.
    pub fn resolve_bind(&self) -> Option<BindMode> {
        if self.remote {
            return None;
        }
        if let Some(raw) = self.env.get(BIND_ENV)
            && let Some(mode) = BindMode::parse(raw)
        {
            return Some(mode);
        }
        self.config
            .pointer("/gateway/bind")
            .and_then(Value::as_str)
            .and_then(BindMode::parse)
    }

    /// Resolve the desired auth token, or `None` when unset everywhere.
    pub fn resolve_token(&self) -> Option<String> {
        self.resolve_secret(TOKEN_ENV, "/gateway/auth/token")
    }

    /// Resolve the desired auth password, or `None` when unset everywhere.
    pub fn resolve_password(&self) -> Option<String> {
        self.resolve_secret(PASSWORD_ENV, "/gateway/auth/password")
    }

    /// Environment override first, then the config store. Values are trimmed
    /// and an empty result from either source is treated as absent.
    fn resolve_secret(&self, env_key: &str, pointer: &str) -> Option<String> {
        if let Some(raw) = self.env.get(env_key) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        let value = self.config.pointer(pointer)?.as_str()?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

/// Load the JSON config store, tolerating a missing or malformed file.
fn load_config_file(path: &Path) -> Value {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse config store {:?}, ignoring: {}", path, e);
                Value::Null
            }
        },
        Err(_) => Value::Null,
    }
}
