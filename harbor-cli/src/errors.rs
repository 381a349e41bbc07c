use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Agent(#[from] harbor_agent::errors::AgentError),
}

pub type Result<T> = std::result::Result<T, CliError>;
