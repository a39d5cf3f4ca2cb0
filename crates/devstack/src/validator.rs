use anyhow::Result;
use sysinfo::System;
use tracing::warn;

use crate::ui;

/// Validates prerequisites for bringing up the stack
pub struct PrerequisitesValidator {
    requirements: Vec<Requirement>,
}

pub struct Requirement {
    name: String,
    check: Box<dyn Fn() -> Result<bool>>,
    install_instructions: String,
    critical: bool,
}

impl Requirement {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn() -> Result<bool> + 'static,
        install_instructions: impl Into<String>,
        critical: bool,
    ) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
            install_instructions: install_instructions.into(),
            critical,
        }
    }

    /// A command that must be on `PATH`.
    pub fn binary(name: &'static str, install_instructions: &str, critical: bool) -> Self {
        Self::new(
            name,
            move || Ok(which::which(name).is_ok()),
            install_instructions,
            critical,
        )
    }
}

impl PrerequisitesValidator {
    /// Standard checks for a cluster needing `memory_mb` of RAM.
    pub fn new(memory_mb: u64) -> Self {
        let requirements = vec![
            Requirement::binary(
                "minikube",
                "Install minikube from https://minikube.sigs.k8s.io/docs/start/",
                true,
            ),
            Requirement::binary(
                "kubectl",
                "Install kubectl from https://kubernetes.io/docs/tasks/tools/",
                true,
            ),
            Requirement::binary(
                "helm",
                "Install Helm from https://helm.sh/docs/intro/install/",
                true,
            ),
            // Only needed for the docker driver
            Requirement::binary("docker", "Install Docker from https://docker.com", false),
            Requirement::new(
                "System Memory",
                move || {
                    let mut sys = System::new();
                    sys.refresh_memory();
                    let total_mb = sys.total_memory() / 1024 / 1024;
                    Ok(total_mb >= memory_mb)
                },
                format!("At least {memory_mb}MB of RAM recommended for the cluster"),
                false,
            ),
        ];

        Self { requirements }
    }

    pub fn with_requirements(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    /// Run every check, failing if a critical one does not pass.
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing critical requirements.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        for requirement in &self.requirements {
            let passed = match (requirement.check)() {
                Ok(passed) => passed,
                Err(e) => {
                    warn!(name = %requirement.name, error = %e, "Prerequisite check failed");
                    false
                }
            };
            ui::print_check(&requirement.name, passed, &requirement.install_instructions);

            if !passed && requirement.critical {
                missing.push(requirement.name.as_str());
            }
        }

        if missing.is_empty() {
            ui::print_success("Prerequisites met");
            Ok(())
        } else {
            anyhow::bail!("Missing required prerequisites: {}", missing.join(", "))
        }
    }
}
