//! Script execution through a vendor command line client.
//!
//! The whole script is piped to the client's standard input, so the client's
//! own statement splitting applies. Connection settings are passed through the
//! libpq environment variables.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::core::Script;
use crate::drivers::{ScriptRunner, StatementOutcome};
use crate::error::{MaintainError, Result};

pub struct CliScriptRunner {
    program: String,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
}

impl CliScriptRunner {
    /// Runner for `command` (program followed by arguments).
    pub fn new(command: &[String], database: &DatabaseConfig) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            MaintainError::Config("scripts.cli_command cannot be empty".into())
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: vec![
                ("PGHOST", database.host.clone()),
                ("PGPORT", database.port.to_string()),
                ("PGDATABASE", database.database.clone()),
                ("PGUSER", database.user.clone()),
                ("PGPASSWORD", database.password.clone()),
            ],
        })
    }

    async fn pipe(&self, input: &str) -> Result<Option<String>> {
        debug!("Piping {} bytes to {}", input.len(), self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MaintainError::Runner(format!("failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            return Ok(None);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", self.program, output.status)
        } else {
            stderr
        };
        Ok(Some(message))
    }
}

#[async_trait]
impl ScriptRunner for CliScriptRunner {
    async fn execute_statement(&self, statement: &str) -> Result<StatementOutcome> {
        let input = format!("{};\n", statement);
        Ok(match self.pipe(&input).await? {
            None => StatementOutcome::succeeded(statement),
            Some(error) => StatementOutcome::failed(statement, error),
        })
    }

    async fn run_script(
        &self,
        script: &Script,
        _statements: &[String],
    ) -> Result<Vec<StatementOutcome>> {
        Ok(vec![match self.pipe(&script.content).await? {
            None => StatementOutcome::succeeded(&script.file_name),
            Some(error) => StatementOutcome::failed(&script.file_name, error),
        }])
    }

    fn runner_type(&self) -> &'static str {
        "cli"
    }
}
