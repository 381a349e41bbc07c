//! Subprocess access to the per-user service manager.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Exit status plus merged stdout/stderr text of one manager invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn ok(&self) -> bool {
        self.status == 0
    }

    /// Trimmed diagnostic text.
    pub fn message(&self) -> &str {
        self.output.trim()
    }
}

/// Seam over the service-manager binary. The engine is generic over this
/// trait so tests can substitute a recording fake; production code uses
/// [`Launchctl`].
///
/// Timeouts and retries are this collaborator's concern; the engine treats
/// any non-zero status as a definitive, non-retried failure.
pub trait ServiceManager {
    fn run(&self, args: &[&str]) -> impl Future<Output = CommandOutput> + Send;
}

/// Client for the real `launchctl` binary.
pub struct Launchctl;

impl ServiceManager for Launchctl {
    async fn run(&self, args: &[&str]) -> CommandOutput {
        debug!("launchctl {}", args.join(" "));
        match Command::new("launchctl")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                CommandOutput {
                    status: out.status.code().unwrap_or(-1),
                    output: text,
                }
            }
            Err(e) => CommandOutput {
                status: -1,
                output: format!("failed to run launchctl: {}", e),
            },
        }
    }
}

/// Domain target addressing a per-user job (`gui/<uid>/<label>`).
pub fn service_target(label: &str) -> String {
    format!("{}/{}", gui_domain(), label)
}

/// The per-user domain (`gui/<uid>`), the bootstrap target.
pub fn gui_domain() -> String {
    format!("gui/{}", nix::unistd::getuid().as_raw())
}
