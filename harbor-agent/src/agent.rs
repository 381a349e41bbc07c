//! Reconciliation of the gateway launch agent.
//!
//! `enable` converges the installed launchd job toward the desired
//! configuration with as little disruption as possible: a job that is
//! already loaded with the right port, bind, and credentials is kickstarted
//! in place rather than booted out and reloaded, since a bootout can kill a
//! just-started gateway and break active client connections.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::command::{LaunchSource, resolve_program_arguments};
use crate::config::{BindMode, ConfigResolver};
use crate::descriptor::ServiceDescriptor;
use crate::errors::{AgentError, Result};
use crate::gate::WriteGate;
use crate::launchctl::{Launchctl, ServiceManager, gui_domain, service_target};
use crate::state::{DesiredConfig, InstalledConfig, read_installed};

/// Current launchd label for the gateway job.
pub const GATEWAY_LABEL: &str = "com.harbor.gateway";
/// Pre-rename label, cleaned up opportunistically on every enable.
pub const LEGACY_GATEWAY_LABEL: &str = "com.harborhq.gateway";

/// Filesystem locations the engine reads and writes.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    /// Descriptor for the current label.
    pub descriptor: PathBuf,
    /// Descriptor left behind by the legacy label, if any.
    pub legacy_descriptor: PathBuf,
    /// Working directory rendered into the descriptor.
    pub working_dir: PathBuf,
    /// Log file the gateway's stdout and stderr are redirected to.
    pub log_path: PathBuf,
}

impl AgentPaths {
    /// Standard per-user locations.
    pub fn system() -> Self {
        let agents = crate::launch_agents_dir();
        Self {
            descriptor: agents.join(format!("{}.plist", GATEWAY_LABEL)),
            legacy_descriptor: agents.join(format!("{}.plist", LEGACY_GATEWAY_LABEL)),
            working_dir: dirs::home_dir().expect("Could not determine home directory"),
            log_path: crate::gateway_log_path(),
        }
    }
}

/// The reconciliation engine for one launchd label.
///
/// All collaborators are injected so tests can substitute fakes. Operations
/// on one instance are serialized by an internal op-lock: one in-flight
/// enable/disable per label at a time, no internal parallelism, and no
/// cancellation once a pass has started.
pub struct LaunchAgent<M: ServiceManager> {
    manager: M,
    resolver: ConfigResolver,
    label: String,
    legacy_label: String,
    paths: AgentPaths,
    gate: WriteGate,
    sources: Vec<LaunchSource>,
    search_paths: Vec<PathBuf>,
    op_lock: Mutex<()>,
}

impl LaunchAgent<Launchctl> {
    /// Engine wired to the real service manager, the process environment,
    /// and the standard per-user paths.
    pub fn system() -> Self {
        Self::new(
            Launchctl,
            ConfigResolver::from_system(),
            GATEWAY_LABEL.to_string(),
            LEGACY_GATEWAY_LABEL.to_string(),
            AgentPaths::system(),
            WriteGate::system(),
            crate::command::default_sources(),
            crate::command::preferred_search_paths(),
        )
    }
}

impl<M: ServiceManager> LaunchAgent<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manager: M,
        resolver: ConfigResolver,
        label: String,
        legacy_label: String,
        paths: AgentPaths,
        gate: WriteGate,
        sources: Vec<LaunchSource>,
        search_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            manager,
            resolver,
            label,
            legacy_label,
            paths,
            gate,
            sources,
            search_paths,
            op_lock: Mutex::new(()),
        }
    }

    /// Converge the launch agent toward `port` plus the resolved bind mode
    /// and credentials.
    ///
    /// Fails only on the two fatal paths: program resolution (nothing has
    /// been touched yet) and bootstrap (the old job may already be stopped
    /// with the new one not started; that degraded state is reported, not
    /// auto-recovered). Housekeeping failures are logged and swallowed.
    pub async fn enable(&self, port: u16) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        if self.gate.is_write_disabled() {
            info!("launchd enable skipped (disable marker set)");
            return Ok(());
        }

        self.cleanup_legacy().await;

        let desired_bind = self.resolver.resolve_bind().unwrap_or(BindMode::Loopback);
        let desired = DesiredConfig {
            port,
            bind: desired_bind,
            token: self.resolver.resolve_token(),
            password: self.resolver.resolve_password(),
        };

        let program_arguments =
            match resolve_program_arguments(&self.sources, &self.search_paths, port, desired_bind) {
                Ok(argv) => argv,
                Err(e) => {
                    error!("launchd enable failed: {}", e);
                    return Err(e);
                }
            };

        let target = service_target(&self.label);

        // A job launchd already loaded (common right after login) is only
        // booted out when the config actually changed; bootout can kill a
        // just-started gateway and cause attach loops.
        let loaded = self.is_loaded().await;
        if loaded
            && let Some(existing) = read_installed(&self.paths.descriptor)
            && existing.matches(&desired)
        {
            info!("launchd job already loaded with desired config; skipping bootout");
            self.ensure_enabled().await;
            let _ = self.manager.run(&["kickstart", target.as_str()]).await;
            return Ok(());
        }

        info!("launchd enable requested port={} bind={}", port, desired_bind);
        self.descriptor(program_arguments, &desired)
            .write_atomic(&self.paths.descriptor);

        self.ensure_enabled().await;
        if loaded {
            let _ = self.manager.run(&["bootout", target.as_str()]).await;
        }

        let domain = gui_domain();
        let descriptor_path = self.paths.descriptor.to_string_lossy().into_owned();
        let bootstrap = self
            .manager
            .run(&["bootstrap", domain.as_str(), descriptor_path.as_str()])
            .await;
        if !bootstrap.ok() {
            let msg = bootstrap.message();
            error!("launchd bootstrap failed: {}", msg);
            return Err(AgentError::Bootstrap(if msg.is_empty() {
                "Failed to bootstrap gateway launchd job".to_string()
            } else {
                msg.to_string()
            }));
        }

        self.ensure_enabled().await;
        Ok(())
    }

    /// Stop and deregister the job, clear the enable flag, and delete the
    /// descriptor. Always succeeds from the caller's point of view; already
    /// disabled is an acceptable terminal state. Never gated by the write
    /// marker.
    pub async fn disable(&self) {
        let _guard = self.op_lock.lock().await;

        info!("launchd disable requested");
        let target = service_target(&self.label);
        let _ = self.manager.run(&["bootout", target.as_str()]).await;
        self.ensure_disabled().await;
        if self.paths.descriptor.exists() {
            best_effort(
                "descriptor removal",
                std::fs::remove_file(&self.paths.descriptor),
            );
        }
    }

    /// Force-restart the running job. Fire and forget.
    pub async fn kickstart(&self) {
        let target = service_target(&self.label);
        let _ = self.manager.run(&["kickstart", "-k", target.as_str()]).await;
    }

    /// True iff the descriptor exists on disk and the service manager
    /// answers a status query for the label.
    pub async fn is_loaded(&self) -> bool {
        if !self.paths.descriptor.exists() {
            return false;
        }
        let target = service_target(&self.label);
        self.manager.run(&["print", target.as_str()]).await.ok()
    }

    /// Snapshot of whatever descriptor is currently installed.
    pub fn installed_config(&self) -> Option<InstalledConfig> {
        read_installed(&self.paths.descriptor)
    }

    /// Remove the legacy-labeled job and its descriptor. Pure cleanup that
    /// is never load-bearing; every failure is ignored.
    async fn cleanup_legacy(&self) {
        let target = service_target(&self.legacy_label);
        let _ = self.manager.run(&["bootout", target.as_str()]).await;
        if self.paths.legacy_descriptor.exists() {
            best_effort(
                "legacy descriptor removal",
                std::fs::remove_file(&self.paths.legacy_descriptor),
            );
        }
    }

    async fn ensure_enabled(&self) {
        self.assert_flag("enable").await;
    }

    async fn ensure_disabled(&self) {
        self.assert_flag("disable").await;
    }

    /// Assert the persistent enable/disable flag for the label; a failed
    /// assertion is logged and swallowed.
    async fn assert_flag(&self, subcommand: &str) {
        let target = service_target(&self.label);
        let result = self.manager.run(&[subcommand, target.as_str()]).await;
        if !result.ok() {
            let msg = result.message();
            if msg.is_empty() {
                warn!("launchd {} failed", subcommand);
            } else {
                warn!("launchd {} failed: {}", subcommand, msg);
            }
        }
    }

    fn descriptor(&self, program_arguments: Vec<String>, desired: &DesiredConfig) -> ServiceDescriptor {
        let search_path = self
            .search_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(":");
        ServiceDescriptor {
            label: self.label.clone(),
            program_arguments,
            working_directory: self.paths.working_dir.clone(),
            search_path,
            token: desired.token.clone(),
            password: desired.password.clone(),
            stdout_path: self.paths.log_path.clone(),
            stderr_path: self.paths.log_path.clone(),
        }
    }
}

/// Log-and-continue for the designated non-fatal housekeeping steps.
fn best_effort<T, E: std::fmt::Display>(step: &str, result: std::result::Result<T, E>) {
    if let Err(e) = result {
        warn!("{} failed (ignored): {}", step, e);
    }
}
