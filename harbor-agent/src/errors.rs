use thiserror::Error;

/// Failures surfaced to callers of the reconciliation engine.
///
/// Only two paths are fatal: resolving the gateway program and bootstrapping
/// the rewritten descriptor. Everything else in the enable/disable flow is
/// housekeeping that is logged and swallowed, since the real success signal
/// is whether the job ends up loaded and enabled.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    ProgramResolution(String),

    #[error("{0}")]
    Bootstrap(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
