//! Process execution seam.
//!
//! Backends build argv vectors and environment overlays; a
//! [`CommandRunner`] turns them into child processes. Tests substitute
//! their own runner to observe invocations without spawning anything.

use crate::RuntimeError;
use std::process::{Command, Stdio};

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait CommandRunner: Send + Sync {
    /// Run to completion with stdout and stderr captured.
    fn run(&self, argv: &[String], env: &[(String, String)]) -> Result<CommandOutput, RuntimeError>;
}

/// Runner that spawns real processes on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    fn run(&self, argv: &[String], env: &[(String, String)]) -> Result<CommandOutput, RuntimeError> {
        let (program, args) = argv.split_first().ok_or(RuntimeError::EmptyCommand)?;
        tracing::debug!(command = %argv.join(" "), "running");
        let output = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_status() {
        let out = HostRunner
            .run(&["sh".into(), "-c".into(), "echo hello".into()], &[])
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_status_is_reported_not_an_error() {
        let out = HostRunner
            .run(&["sh".into(), "-c".into(), "exit 3".into()], &[])
            .unwrap();
        assert_eq!(out.status, 3);
        assert!(!out.success());
    }

    #[test]
    fn env_overlay_reaches_the_child() {
        let out = HostRunner
            .run(
                &["sh".into(), "-c".into(), "printf %s \"$MARKER\"".into()],
                &[("MARKER".into(), "on".into())],
            )
            .unwrap();
        assert_eq!(out.stdout, "on");
    }

    #[test]
    fn empty_argv_is_rejected() {
        assert!(matches!(
            HostRunner.run(&[], &[]),
            Err(RuntimeError::EmptyCommand)
        ));
    }
}
