// Compile check through an external command

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tempfile::TempDir;
use tokio::process::Command;

use crate::config::StaticCheckConfig;
use crate::error::Result;
use crate::tools::ToolSet;
use crate::validation::traits::{CheckResult, StaticVerifier};

/// File name the candidate is written under before the command runs
const CANDIDATE_FILE: &str = "candidate.py";

/// Runs a shell command against the candidate written to a scratch directory.
///
/// `{file}` in the template is replaced by the candidate's path. The scratch
/// directory is dropped on every path out of `verify`, timeouts included.
pub struct CommandVerifier {
    name: String,
    template: String,
    timeout: Duration,
}

impl CommandVerifier {
    pub fn new(name: impl Into<String>, template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            timeout,
        }
    }

    /// The configured compile check
    pub fn from_config(config: &StaticCheckConfig) -> Self {
        Self::new(
            "compile",
            config.command.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    async fn run(&self, dir: &Path, file: &Path) -> std::io::Result<Option<Output>> {
        let command = self.template.replace("{file}", &file.to_string_lossy());
        debug!("Static check '{}': {}", self.name, command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(dir)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl StaticVerifier for CommandVerifier {
    async fn verify(&self, source: &str, _tools: &ToolSet) -> Result<CheckResult> {
        let dir = TempDir::new()?;
        let file = dir.path().join(CANDIDATE_FILE);
        std::fs::write(&file, source)?;

        let output = match self.run(dir.path(), &file).await {
            Ok(Some(output)) => output,
            Ok(None) => {
                return Ok(CheckResult::fail(format!(
                    "{} timed out after {}ms",
                    self.name,
                    self.timeout.as_millis()
                )));
            }
            Err(e) => return Ok(CheckResult::fail(format!("{} could not start: {}", self.name, e))),
        };

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(CheckResult::pass_with_detail(stdout.trim()));
        }

        let mut result = CheckResult::fail(format!("{} exited with {:?}", self.name, output.status.code()));
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            // Paths in compiler output point into the scratch dir; keep only the file name
            let dir_prefix = format!("{}/", dir.path().display());
            result.add_problem(stderr.replace(&dir_prefix, ""));
        }
        Ok(result)
    }

    fn description(&self) -> &str {
        &self.name
    }
}
