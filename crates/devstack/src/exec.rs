//! External tool invocation.
//!
//! Everything the stack does to the cluster goes through `minikube`, `helm`
//! or `kubectl`. Invocations are built as plain values and handed to a
//! [`CommandRunner`], so the command sequences can be logged, printed and
//! asserted on in tests.

use std::fmt;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful result with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given stderr.
    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs invocations to completion.
pub trait CommandRunner: Send + Sync {
    /// Run the command and capture its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`]; `Err` is
    /// reserved for failing to start the process at all.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs invocations as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        let output = command
            .output()
            .with_context(|| format!("Failed to execute {}", invocation.program))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Builds and runs tool invocations pinned to one minikube profile.
#[derive(Clone)]
pub struct Toolbox {
    runner: Arc<dyn CommandRunner>,
    profile: String,
}

impl Toolbox {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, profile: impl Into<String>) -> Self {
        Self {
            runner,
            profile: profile.into(),
        }
    }

    /// Toolbox backed by real child processes.
    #[must_use]
    pub fn system(profile: impl Into<String>) -> Self {
        Self::new(Arc::new(SystemRunner), profile)
    }

    /// minikube profile (and kube context) every invocation targets.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// `minikube -p <profile>`
    #[must_use]
    pub fn minikube(&self) -> Invocation {
        Invocation::new("minikube").args(["-p", self.profile.as_str()])
    }

    /// `helm --kube-context <profile>`
    #[must_use]
    pub fn helm(&self) -> Invocation {
        Invocation::new("helm").args(["--kube-context", self.profile.as_str()])
    }

    /// `kubectl --context <profile>`
    #[must_use]
    pub fn kubectl(&self) -> Invocation {
        Invocation::new("kubectl").args(["--context", self.profile.as_str()])
    }

    /// Run an invocation, returning its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn output(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(command = %invocation, "Running");
        self.runner.run(invocation)
    }

    /// Run an invocation and return stdout, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error containing stderr if the command fails.
    pub fn run(&self, invocation: &Invocation) -> Result<String> {
        let output = self.output(invocation)?;
        if !output.success {
            anyhow::bail!("{} failed: {}", invocation.program, output.stderr.trim());
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner for asserting command sequences.

    use std::sync::Mutex;

    use super::{CommandOutput, CommandRunner, Invocation};

    /// Replies to invocations by substring match and records every call.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: Mutex<Vec<(String, Vec<CommandOutput>)>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        /// Reply with `output` to commands containing `pattern`.
        ///
        /// Several outputs for one pattern are returned in turn; the last one
        /// repeats. Commands matching no rule succeed with empty output.
        pub fn on(self, pattern: &str, outputs: Vec<CommandOutput>) -> Self {
            self.rules
                .lock()
                .unwrap()
                .push((pattern.to_string(), outputs));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutput> {
            let line = invocation.to_string();
            self.calls.lock().unwrap().push(line.clone());

            let mut rules = self.rules.lock().unwrap();
            for (pattern, outputs) in rules.iter_mut() {
                if line.contains(pattern.as_str()) {
                    return Ok(if outputs.len() > 1 {
                        outputs.remove(0)
                    } else {
                        outputs.first().cloned().unwrap_or_default()
                    });
                }
            }
            Ok(CommandOutput::ok(""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let inv = Invocation::new("kubectl").args(["patch", "-p", "{\"a\": 1}"]);
        assert_eq!(inv.to_string(), "kubectl patch -p '{\"a\": 1}'");
    }

    #[test]
    fn test_tools_pin_profile() {
        let tools = Toolbox::system("dev");
        assert_eq!(tools.minikube().to_string(), "minikube -p dev");
        assert_eq!(tools.helm().to_string(), "helm --kube-context dev");
        assert_eq!(tools.kubectl().to_string(), "kubectl --context dev");
    }

    #[test]
    fn test_run_fails_on_nonzero_exit() {
        let runner = ScriptedRunner::default().on(
            "get pods",
            vec![CommandOutput::failed("error: the server doesn't have a resource type\n")],
        );
        let tools = Toolbox::new(Arc::new(runner), "dev");

        let err = tools
            .run(&tools.kubectl().args(["get", "pods"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "kubectl failed: error: the server doesn't have a resource type"
        );
    }

    #[test]
    fn test_system_runner_missing_program() {
        let result = SystemRunner.run(&Invocation::new("definitely-not-a-real-binary-xyz"));
        assert!(result.is_err());
    }
}
