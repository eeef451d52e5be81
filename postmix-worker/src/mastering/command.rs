//! External mastering program
//!
//! Invoked as `<program> [args..] <target.wav> <reference.wav> <output.wav>`.
//! The target stream is written to a temporary file next to the output and
//! removed when the call returns.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{Masterer, MasteringError};

#[derive(Debug, Clone)]
pub struct CommandMasterer {
    program: String,
    args: Vec<String>,
}

impl CommandMasterer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a split command line; `None` when empty
    pub fn from_command_line(parts: &[String]) -> Option<Self> {
        let (program, args) = parts.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl Masterer for CommandMasterer {
    async fn master(
        &self,
        target_wav: Vec<u8>,
        reference: &Path,
        output: &Path,
    ) -> Result<(), MasteringError> {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let target = tempfile::Builder::new()
            .prefix("postmix-target-")
            .suffix(".wav")
            .tempfile_in(dir)?;
        tokio::fs::write(target.path(), &target_wav).await?;

        debug!(
            program = %self.program,
            target = %target.path().display(),
            reference = %reference.display(),
            output = %output.display(),
            "Running mastering program"
        );

        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(target.path())
            .arg(reference)
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            error!(program = %self.program, status = %result.status, stderr = %stderr, "Mastering program failed");
            return Err(MasteringError::Command {
                status: result.status.to_string(),
                stderr,
            });
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MasteringError::MissingOutput(output.to_path_buf()));
        }

        info!(path = %output.display(), "Mastering completed");
        Ok(())
    }
}
