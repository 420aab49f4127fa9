//! Generator subprocess execution.

use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// A fully resolved generator invocation:
/// `interpreter tool_path <args...>` with the working directory set to the
/// node's source directory.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub interpreter: PathBuf,
    pub tool_path: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl Invocation {
    /// Shell-style rendering for diagnostics.
    pub fn command_line(&self) -> String {
        let mut parts = vec![
            self.interpreter.display().to_string(),
            self.tool_path.display().to_string(),
        ];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a generator run.
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    /// Process exit status; -1 when terminated by a signal.
    pub status: i32,
    /// Combined stdout and stderr.
    pub output: String,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Seam between the generation task and the actual subprocess, so tests
/// can substitute a spy.
pub trait GeneratorInvoker {
    fn invoke(&self, invocation: &Invocation) -> std::io::Result<InvocationOutput>;
}

/// Runs the generator with `std::process::Command`, blocking until it
/// exits and capturing its output.
pub struct SubprocessInvoker;

impl GeneratorInvoker for SubprocessInvoker {
    fn invoke(&self, invocation: &Invocation) -> std::io::Result<InvocationOutput> {
        debug!(command = %invocation.command_line(), workdir = %invocation.workdir.display(), "running generator");
        let output = Command::new(&invocation.interpreter)
            .arg(&invocation.tool_path)
            .args(&invocation.args)
            .current_dir(&invocation.workdir)
            .output()?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(InvocationOutput {
            status: output.status.code().unwrap_or(-1),
            output: captured,
        })
    }
}
