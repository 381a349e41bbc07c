//! End-to-end reconciliation scenarios against a fake service manager.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use serde_json::json;
use tempfile::TempDir;

use harbor_agent::agent::{AgentPaths, GATEWAY_LABEL, LEGACY_GATEWAY_LABEL, LaunchAgent};
use harbor_agent::command::LaunchSource;
use harbor_agent::config::{BindMode, ConfigResolver};
use harbor_agent::gate::WriteGate;
use harbor_agent::launchctl::{CommandOutput, ServiceManager};

/// Minimal manager fake: everything succeeds, `print` answers according to
/// the `loaded` flag, and all invocations are recorded.
struct ScriptedManager {
    calls: StdMutex<Vec<Vec<String>>>,
    loaded: StdMutex<bool>,
}

impl ScriptedManager {
    fn new() -> Arc<Self> {
        Arc::new(Self { calls: StdMutex::new(Vec::new()), loaded: StdMutex::new(false) })
    }

    fn ran(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c[0] == subcommand)
            .count()
    }
}

/// Local wrapper so the foreign `ServiceManager` trait can be implemented
/// for a shared `ScriptedManager` without tripping the orphan rule.
#[derive(Clone)]
struct SharedManager(Arc<ScriptedManager>);

impl ServiceManager for SharedManager {
    async fn run(&self, args: &[&str]) -> CommandOutput {
        self.0
            .calls
            .lock()
            .unwrap()
            .push(args.iter().map(|s| s.to_string()).collect());
        let status = if args[0] == "print" && !*self.0.loaded.lock().unwrap() {
            3
        } else {
            0
        };
        CommandOutput { status, output: String::new() }
    }
}

struct World {
    dir: TempDir,
    manager: Arc<ScriptedManager>,
}

impl World {
    fn new() -> Self {
        Self { dir: TempDir::new().unwrap(), manager: ScriptedManager::new() }
    }

    fn descriptor_path(&self) -> PathBuf {
        self.dir.path().join(format!("{}.plist", GATEWAY_LABEL))
    }

    fn agent_with(
        &self,
        env: &[(&str, &str)],
        config: serde_json::Value,
        sources: Vec<LaunchSource>,
    ) -> LaunchAgent<SharedManager> {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LaunchAgent::new(
            SharedManager(self.manager.clone()),
            ConfigResolver::new(env, config),
            GATEWAY_LABEL.to_string(),
            LEGACY_GATEWAY_LABEL.to_string(),
            AgentPaths {
                descriptor: self.descriptor_path(),
                legacy_descriptor: self.dir.path().join(format!("{}.plist", LEGACY_GATEWAY_LABEL)),
                working_dir: self.dir.path().to_path_buf(),
                log_path: self.dir.path().join("gateway.log"),
            },
            WriteGate::new(self.dir.path().join("disable-launchagent")),
            sources,
            vec![PathBuf::from("/usr/bin")],
        )
    }

    fn agent(&self) -> LaunchAgent<SharedManager> {
        let bin = self.dir.path().join("harbor");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        self.agent_with(&[], json!({}), vec![LaunchSource::LocalArtifact { path: bin }])
    }
}

// Scenario: no existing descriptor, bind unset everywhere. The rendered
// descriptor defaults to loopback and the job is loaded.
#[tokio::test]
async fn enable_from_scratch_defaults_to_loopback() {
    let w = World::new();
    w.agent().enable(8787).await.unwrap();

    let rendered = std::fs::read_to_string(w.descriptor_path()).unwrap();
    assert!(rendered.contains("<string>--bind</string>"));
    assert!(rendered.contains("<string>loopback</string>"));
    assert!(rendered.contains("<string>8787</string>"));
    assert_eq!(w.manager.ran("bootstrap"), 1);

    let installed = harbor_agent::state::read_installed(&w.descriptor_path()).unwrap();
    assert_eq!(installed.bind, Some(BindMode::Loopback));
    assert_eq!(installed.port, Some(8787));
}

// Scenario: the installed descriptor already matches and the job is loaded.
// No rewrite, no bootout; only a refresh kickstart.
#[tokio::test]
async fn enable_twice_takes_the_match_path() {
    let w = World::new();
    let agent = w.agent();
    agent.enable(8787).await.unwrap();
    *w.manager.loaded.lock().unwrap() = true;
    let before = std::fs::read_to_string(w.descriptor_path()).unwrap();

    agent.enable(8787).await.unwrap();

    assert_eq!(std::fs::read_to_string(w.descriptor_path()).unwrap(), before);
    assert_eq!(w.manager.ran("bootstrap"), 1);
    assert_eq!(w.manager.ran("kickstart"), 1);
    // The only bootouts are the legacy cleanups, one per enable.
    assert_eq!(w.manager.ran("bootout"), 2);
}

// Scenario: installed port 8787, desired 9000. The descriptor is rewritten
// and the job stopped then loaded with the new one.
#[tokio::test]
async fn port_change_reinstalls() {
    let w = World::new();
    let agent = w.agent();
    agent.enable(8787).await.unwrap();
    *w.manager.loaded.lock().unwrap() = true;

    agent.enable(9000).await.unwrap();

    let rendered = std::fs::read_to_string(w.descriptor_path()).unwrap();
    assert!(rendered.contains("<string>9000</string>"));
    assert!(!rendered.contains("<string>8787</string>"));
    assert_eq!(w.manager.ran("bootstrap"), 2);
    // Legacy cleanup twice plus one bootout of the live job.
    assert_eq!(w.manager.ran("bootout"), 3);
}

// Scenario: write-gate sentinel present. Nothing is touched.
#[tokio::test]
async fn write_gate_blocks_all_mutation() {
    let w = World::new();
    std::fs::write(w.dir.path().join("disable-launchagent"), "").unwrap();

    w.agent().enable(8787).await.unwrap();

    assert!(!w.descriptor_path().exists());
    assert!(w.manager.calls.lock().unwrap().is_empty());
}

// Scenario: executable resolution fails. A non-empty diagnostic comes back
// and no descriptor is created or modified.
#[tokio::test]
async fn resolution_failure_reports_and_leaves_no_descriptor() {
    let w = World::new();
    let agent = w.agent_with(
        &[],
        json!({}),
        vec![LaunchSource::LocalArtifact { path: w.dir.path().join("missing") }],
    );

    let err = agent.enable(8787).await.unwrap_err();
    assert!(!err.to_string().is_empty());
    assert!(!w.descriptor_path().exists());
    assert_eq!(w.manager.ran("bootstrap"), 0);
}

// Credentials resolved from env and config flow into the descriptor and
// round-trip through the installed snapshot.
#[tokio::test]
async fn credentials_flow_into_descriptor_and_match() {
    let w = World::new();
    let bin = w.dir.path().join("harbor");
    std::fs::write(&bin, "#!/bin/sh\n").unwrap();
    let agent = w.agent_with(
        &[("HARBOR_GATEWAY_TOKEN", "tok&123")],
        json!({"gateway": {"bind": "tailnet", "auth": {"password": "pw"}}}),
        vec![LaunchSource::LocalArtifact { path: bin }],
    );

    agent.enable(8787).await.unwrap();

    let installed = harbor_agent::state::read_installed(&w.descriptor_path()).unwrap();
    assert_eq!(installed.bind, Some(BindMode::Tailnet));
    assert_eq!(installed.token, Some("tok&123".to_string()));
    assert_eq!(installed.password, Some("pw".to_string()));

    // A second pass over unchanged state takes the match path.
    *w.manager.loaded.lock().unwrap() = true;
    agent.enable(8787).await.unwrap();
    assert_eq!(w.manager.ran("bootstrap"), 1);
}

// Disable with nothing installed: success, no destructive action.
#[tokio::test]
async fn disable_when_absent_is_a_safe_no_op() {
    let w = World::new();
    w.agent().disable().await;
    assert!(!w.descriptor_path().exists());
    assert_eq!(w.manager.ran("bootout"), 1);
    assert_eq!(w.manager.ran("disable"), 1);
}
