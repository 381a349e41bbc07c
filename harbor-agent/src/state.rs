//! Desired and installed configuration snapshots, and the matching rule
//! between them.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{BindMode, PASSWORD_ENV, TOKEN_ENV};

/// The configuration the caller wants the launch agent converged toward.
/// Assembled fresh on every reconciliation pass; only its rendering is ever
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
    pub port: u16,
    pub bind: BindMode,
    pub token: Option<String>,
    pub password: Option<String>,
}

/// What the currently installed descriptor encodes. Absent fields mean
/// "could not be determined", not "explicitly empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledConfig {
    pub port: Option<u16>,
    pub bind: Option<BindMode>,
    pub token: Option<String>,
    pub password: Option<String>,
}

impl InstalledConfig {
    /// Field-by-field comparison against the desired configuration.
    ///
    /// An absent installed bind counts as loopback; this is the only place
    /// that default is applied. Absent token/password only match absent.
    pub fn matches(&self, desired: &DesiredConfig) -> bool {
        self.port == Some(desired.port)
            && self.bind.unwrap_or(BindMode::Loopback) == desired.bind
            && self.token == desired.token
            && self.password == desired.password
    }
}

static PLIST_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<string>([^<]*)</string>").unwrap());
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| env_entry_re(TOKEN_ENV));
static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| env_entry_re(PASSWORD_ENV));

fn env_entry_re(key: &str) -> Regex {
    Regex::new(&format!(r"<key>{}</key>\s*<string>([^<]*)</string>", key)).unwrap()
}

/// Inverse of the renderer's escaping; `&amp;` is resolved last so entities
/// produced by the other replacements are not re-interpreted.
fn unescape(raw: &str) -> String {
    raw.replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

/// Read the descriptor installed at `path`, recovering whichever fields can
/// be determined. Returns `None` when no descriptor exists or the file is
/// not recognizably a job descriptor; individual fields that cannot be
/// recovered stay `None` rather than being defaulted.
pub fn read_installed(path: &Path) -> Option<InstalledConfig> {
    let text = std::fs::read_to_string(path).ok()?;
    if !text.contains("<key>ProgramArguments</key>") {
        return None;
    }
    let args = program_arguments(&text);
    Some(InstalledConfig {
        port: value_after(&args, "--port").and_then(|v| v.parse().ok()),
        bind: value_after(&args, "--bind").and_then(|v| BindMode::parse(&v)),
        token: env_value(&TOKEN_RE, &text),
        password: env_value(&PASSWORD_RE, &text),
    })
}

/// The `<string>` values inside the ProgramArguments array, unescaped.
fn program_arguments(text: &str) -> Vec<String> {
    let Some(start) = text.find("<key>ProgramArguments</key>") else {
        return Vec::new();
    };
    let rest = &text[start..];
    let end = rest.find("</array>").unwrap_or(rest.len());
    PLIST_STRING_RE
        .captures_iter(&rest[..end])
        .map(|caps| unescape(&caps[1]))
        .collect()
}

fn value_after(args: &[String], flag: &str) -> Option<String> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1).cloned()
}

fn env_value(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| unescape(&caps[1]))
}
