// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

use crate::{Result, SysError};

/// Executes host tools and returns their stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Runs tools on the local ESXi shell.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Tools every datastore operation needs
    pub const REQUIRED_TOOLS: [&'static str; 4] = ["esxcli", "vmkfstools", "partedUtil", "vim-cmd"];

    /// Fails with the first required tool missing from `PATH`.
    pub fn check_tools() -> Result<()> {
        for tool in Self::REQUIRED_TOOLS {
            if which::which(tool).is_err() {
                return Err(SysError::ToolMissing(tool.to_string()));
            }
        }
        Ok(())
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        tracing::debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("{} exited with {}: {}", program, output.status, stderr);
            return Err(SysError::CommandFailed {
                command: format!("{program} {}", args.join(" ")),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
