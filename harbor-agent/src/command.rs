//! Resolution of the gateway daemon's program arguments.
//!
//! Sources are supplied to the engine as an ordered list and probed in turn;
//! the first that yields a program wins. A development checkout can put a
//! local build artifact or an interpreted entrypoint ahead of the installed
//! binary without any compile-time switches.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::debug;

use crate::config::BindMode;
use crate::errors::{AgentError, Result};

/// Subcommand the resolved program is launched with.
const GATEWAY_SUBCOMMAND: &str = "gateway-daemon";

/// One way of locating the gateway program.
#[derive(Debug, Clone)]
pub enum LaunchSource {
    /// A project-local build artifact, used during development.
    LocalArtifact { path: PathBuf },
    /// An entrypoint script run through a runtime binary.
    Interpreted { runtime: PathBuf, entrypoint: PathBuf },
    /// An installed binary looked up on the search paths.
    PathLookup { binary: String },
}

impl LaunchSource {
    /// The program prefix this source yields, or `None` when unavailable.
    fn resolve(&self, search_paths: &[PathBuf]) -> Option<Vec<String>> {
        match self {
            LaunchSource::LocalArtifact { path } => path
                .is_file()
                .then(|| vec![path.to_string_lossy().into_owned()]),
            LaunchSource::Interpreted { runtime, entrypoint } => {
                (runtime.is_file() && entrypoint.is_file()).then(|| {
                    vec![
                        runtime.to_string_lossy().into_owned(),
                        entrypoint.to_string_lossy().into_owned(),
                    ]
                })
            }
            LaunchSource::PathLookup { binary } => {
                let path_var = std::env::join_paths(search_paths).ok()?;
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                which::which_in(binary, Some(&path_var), cwd)
                    .ok()
                    .map(|p| vec![p.to_string_lossy().into_owned()])
            }
        }
    }
}

/// Build the full argv for the gateway daemon, trying each source in order.
///
/// Fails only when every source comes up empty; the caller mutates nothing
/// on failure.
pub fn resolve_program_arguments(
    sources: &[LaunchSource],
    search_paths: &[PathBuf],
    port: u16,
    bind: BindMode,
) -> Result<Vec<String>> {
    for source in sources {
        if let Some(mut argv) = source.resolve(search_paths) {
            debug!("resolved gateway program via {:?}", source);
            argv.push(GATEWAY_SUBCOMMAND.to_string());
            argv.push("--port".to_string());
            argv.push(port.to_string());
            argv.push("--bind".to_string());
            argv.push(bind.to_string());
            return Ok(argv);
        }
    }
    Err(AgentError::ProgramResolution(
        "harbor CLI not found in PATH; install the CLI.".to_string(),
    ))
}

/// Default source order for a system install: a sibling of the current
/// executable first (covers running from a build tree), then the search
/// paths.
pub fn default_sources() -> Vec<LaunchSource> {
    let mut sources = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        sources.push(LaunchSource::LocalArtifact {
            path: exe.with_file_name("harbor"),
        });
    }
    sources.push(LaunchSource::PathLookup {
        binary: "harbor".to_string(),
    });
    sources
}

/// Search paths rendered into the descriptor's PATH entry: well-known user
/// and package-manager bin directories first, then the current PATH,
/// deduplicated while preserving order.
pub fn preferred_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local/bin"));
        paths.push(home.join("bin"));
    }
    paths.push(PathBuf::from("/opt/homebrew/bin"));
    paths.push(PathBuf::from("/usr/local/bin"));
    paths.push(PathBuf::from("/usr/bin"));
    paths.push(PathBuf::from("/bin"));
    if let Ok(path_var) = std::env::var("PATH") {
        paths.extend(std::env::split_paths(&path_var));
    }

    let mut seen = HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    paths
}
