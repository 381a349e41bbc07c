//! Rendering and installation of the gateway's launchd property list.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::config::{PASSWORD_ENV, TOKEN_ENV};

/// Escape a value for embedding in plist markup.
///
/// `&` must be replaced first; otherwise the entities produced by the later
/// replacements would themselves be re-escaped.
pub fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// One launchd job descriptor, the unit of installation.
///
/// RunAtLoad and KeepAlive are always rendered true: launchd both starts the
/// gateway at login and restarts it if it exits. The descriptor is only ever
/// replaced whole; it is never edited in place.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub label: String,
    pub program_arguments: Vec<String>,
    pub working_directory: PathBuf,
    /// Value of the PATH entry in the environment block, always present.
    pub search_path: String,
    pub token: Option<String>,
    pub password: Option<String>,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

impl ServiceDescriptor {
    /// Render the descriptor as launchd plist XML.
    ///
    /// Field order is fixed: Label, ProgramArguments, WorkingDirectory,
    /// RunAtLoad, KeepAlive, EnvironmentVariables (PATH first, then token
    /// and password entries when present), StandardOutPath,
    /// StandardErrorPath. Free-text values (arguments, token, password) are
    /// escaped; structural markup never is.
    pub fn render(&self) -> String {
        let args_xml = self
            .program_arguments
            .iter()
            .map(|arg| format!("    <string>{}</string>", escape(arg)))
            .collect::<Vec<_>>()
            .join("\n");

        let mut env_xml = format!(
            "    <key>PATH</key>\n    <string>{}</string>",
            self.search_path
        );
        if let Some(ref token) = self.token {
            env_xml.push_str(&format!(
                "\n    <key>{}</key>\n    <string>{}</string>",
                TOKEN_ENV,
                escape(token)
            ));
        }
        if let Some(ref password) = self.password {
            env_xml.push_str(&format!(
                "\n    <key>{}</key>\n    <string>{}</string>",
                PASSWORD_ENV,
                escape(password)
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
{args}
  </array>
  <key>WorkingDirectory</key>
  <string>{workdir}</string>
  <key>RunAtLoad</key>
  <true/>
  <key>KeepAlive</key>
  <true/>
  <key>EnvironmentVariables</key>
  <dict>
{env}
  </dict>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
            label = self.label,
            args = args_xml,
            workdir = self.working_directory.display(),
            env = env_xml,
            stdout = self.stdout_path.display(),
            stderr = self.stderr_path.display(),
        )
    }

    /// Write the rendered descriptor to `path` atomically (temp file in the
    /// same directory, then rename), replacing any prior file whole.
    ///
    /// Failures are logged and swallowed: the caller's success signal is the
    /// subsequent bootstrap outcome, not this write.
    pub fn write_atomic(&self, path: &Path) {
        if let Err(e) = self.try_write(path) {
            error!("launchd plist write failed: {}", e);
        }
    }

    fn try_write(&self, path: &Path) -> std::io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::other(format!("no parent directory for '{}'", path.display()))
        })?;
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(self.render().as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("Wrote launch agent descriptor to {:?}", path);
        Ok(())
    }
}
