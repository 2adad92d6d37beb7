//! Checks file loading
//!
//! A checks file is a YAML document with a list of named checks, each tagged
//! with its `type`:
//!
//! ```yaml
//! checks:
//!   - name: api
//!     type: http
//!     url: http://localhost:8080/health
//!     consecutive_successes: 3
//!   - name: echo
//!     type: tcp_echo
//!     host: localhost
//!     port: 7
//!     message: ping
//!     expected_message: ping
//!   - name: migrations
//!     type: local_command
//!     command: ./check-migrations.sh
//! ```

use std::collections::HashSet;
use std::path::Path;

use checkmate_core::{Diagnostics, Error, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::command::{CommandCheck, CommandSpec};
use crate::http::{HttpCheck, HttpCheckSpec};
use crate::probe::{CheckReport, Probe};
use crate::tcp::{TcpEchoCheck, TcpEchoSpec};

/// Top-level checks file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksFile {
    #[serde(default)]
    pub checks: Vec<CheckDefinition>,
}

/// One named check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    pub name: String,

    #[serde(flatten)]
    pub check: CheckSpec,
}

/// Check configuration by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckSpec {
    Http(HttpCheckSpec),
    TcpEcho(TcpEchoSpec),
    LocalCommand(CommandSpec),
}

impl CheckSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckSpec::Http(_) => "http",
            CheckSpec::TcpEcho(_) => "tcp_echo",
            CheckSpec::LocalCommand(_) => "local_command",
        }
    }
}

impl ChecksFile {
    /// Load and validate a checks file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config_not_found(path.display().to_string()));
        }

        let yaml = std::fs::read_to_string(path)?;
        let file = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), checks = file.checks.len(), "loaded checks file");
        Ok(file)
    }

    /// Parse and validate a checks file from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ChecksFile = serde_yaml_ng::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Check names must be present and unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for definition in &self.checks {
            if definition.name.trim().is_empty() {
                return Err(Error::invalid_config("check name must not be empty"));
            }
            if !seen.insert(definition.name.as_str()) {
                return Err(Error::invalid_config(format!(
                    "duplicate check name {:?}",
                    definition.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a check by name
    pub fn get(&self, name: &str) -> Option<&CheckDefinition> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Checks named in `only`, or all checks when `only` is empty
    ///
    /// Names are returned in file order. Unknown names are an error.
    pub fn select(&self, only: &[String]) -> Result<Vec<&CheckDefinition>> {
        if only.is_empty() {
            return Ok(self.checks.iter().collect());
        }

        if let Some(unknown) = only.iter().find(|name| self.get(name).is_none()) {
            return Err(Error::invalid_config(format!("unknown check {unknown:?}")));
        }

        Ok(self
            .checks
            .iter()
            .filter(|c| only.iter().any(|name| *name == c.name))
            .collect())
    }
}

impl CheckDefinition {
    /// Validate the check without running it
    ///
    /// Fatal problems are recorded in `diagnostics` as errors and returned.
    pub fn prepare(&self, diagnostics: &mut Diagnostics) -> crate::Result<Box<dyn Probe>> {
        let probe: Box<dyn Probe> = match &self.check {
            CheckSpec::Http(spec) => {
                Box::new(HttpCheck::prepare(spec, diagnostics)?.with_label(&self.name))
            }
            CheckSpec::TcpEcho(spec) => {
                Box::new(TcpEchoCheck::prepare(spec, diagnostics)?.with_label(&self.name))
            }
            CheckSpec::LocalCommand(spec) => {
                Box::new(CommandCheck::prepare(spec, diagnostics)?.with_label(&self.name))
            }
        };
        Ok(probe)
    }

    /// Prepare and run the check once
    pub async fn run(
        &self,
        cancellation: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> crate::Result<CheckReport> {
        let probe = self.prepare(diagnostics)?;
        probe.probe(cancellation, diagnostics).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKS: &str = r#"
checks:
  - name: api
    type: http
    url: http://localhost:8080/health
    status_code: 200-204
    consecutive_successes: 3
    headers:
      Authorization: Bearer token
  - name: echo
    type: tcp_echo
    host: localhost
    port: 7
    message: ping
    expected_message: ping
  - name: script
    type: local_command
    command: "true"
    env:
      FOO: bar
    create_file:
      name: config.json
      contents: "{}"
"#;

    #[test]
    fn test_parse_all_kinds() {
        let file = ChecksFile::from_yaml_str(CHECKS).unwrap();
        assert_eq!(file.checks.len(), 3);

        let kinds: Vec<_> = file.checks.iter().map(|c| c.check.kind()).collect();
        assert_eq!(kinds, vec!["http", "tcp_echo", "local_command"]);

        let CheckSpec::Http(http) = &file.get("api").unwrap().check else {
            panic!("expected http check");
        };
        assert_eq!(http.status_code, "200-204");
        assert_eq!(http.consecutive_successes, 3);
        assert_eq!(http.timeout, 5000);
        assert_eq!(http.headers["Authorization"], "Bearer token");

        let CheckSpec::TcpEcho(tcp) = &file.get("echo").unwrap().check else {
            panic!("expected tcp_echo check");
        };
        assert_eq!(tcp.port, 7);
        assert_eq!(tcp.timeout, 10000);

        let CheckSpec::LocalCommand(cmd) = &file.get("script").unwrap().check else {
            panic!("expected local_command check");
        };
        assert_eq!(cmd.env["FOO"], "bar");
        assert_eq!(cmd.create_file.as_ref().unwrap().name, "config.json");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
checks:
  - name: a
    type: local_command
    command: "true"
  - name: a
    type: local_command
    command: "false"
"#;
        let err = ChecksFile::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let yaml = "checks:\n  - name: a\n    type: grpc\n    target: x\n";
        let err = ChecksFile::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_empty_file_has_no_checks() {
        let file = ChecksFile::from_yaml_str("{}").unwrap();
        assert!(file.checks.is_empty());
    }

    #[test]
    fn test_select() {
        let file = ChecksFile::from_yaml_str(CHECKS).unwrap();

        assert_eq!(file.select(&[]).unwrap().len(), 3);

        let selected = file
            .select(&["script".to_string(), "api".to_string()])
            .unwrap();
        let names: Vec<_> = selected.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["api", "script"]);

        assert!(file.select(&["missing".to_string()]).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ChecksFile::load("/definitely/not/here/checkmate.yaml").unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_prepare_labels_probe_with_name() {
        let file = ChecksFile::from_yaml_str(CHECKS).unwrap();
        let mut diagnostics = Diagnostics::new();

        for definition in &file.checks {
            let probe = definition.prepare(&mut diagnostics).unwrap();
            assert_eq!(probe.label(), definition.name);
            assert_eq!(probe.kind(), definition.check.kind());
        }
        assert!(diagnostics.is_empty());
    }
}
