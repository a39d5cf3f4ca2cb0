//! Local port forwards to cluster services.
//!
//! Each forward is a `kubectl port-forward` child process owned by a
//! [`PortForwarder`]. Children are killed when the forwarder is dropped or
//! shut down.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::ForwardSpec;
use crate::exec::{Invocation, Toolbox};
use crate::ui;
use crate::wait::{poll_until, RetryConfig};

/// How often running forwards are checked for unexpected exits.
const SUPERVISE_INTERVAL: Duration = Duration::from_secs(2);

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

struct ActiveForward {
    spec: ForwardSpec,
    child: Child,
}

/// Owns a set of running port forwards.
pub struct PortForwarder {
    forwards: Vec<ActiveForward>,
}

/// `kubectl port-forward` invocation for one forward.
#[must_use]
pub fn invocation(tools: &Toolbox, spec: &ForwardSpec) -> Invocation {
    tools.kubectl().args([
        "port-forward".to_string(),
        "-n".to_string(),
        spec.namespace.clone(),
        format!("svc/{}", spec.service),
        format!("{}:{}", spec.local_port, spec.remote_port),
        "--address".to_string(),
        "127.0.0.1".to_string(),
    ])
}

/// Whether something accepts connections on a local port.
#[must_use]
pub fn port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok()
}

/// Keep only the specs named in `names`; all of them when `names` is empty.
///
/// # Errors
///
/// Returns an error naming the first unknown forward.
pub fn select<'a>(specs: &'a [ForwardSpec], names: &[String]) -> Result<Vec<&'a ForwardSpec>> {
    if names.is_empty() {
        return Ok(specs.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            specs.iter().find(|s| &s.name == name).with_context(|| {
                let known: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
                format!("Unknown forward '{name}' (known: {})", known.join(", "))
            })
        })
        .collect()
}

impl PortForwarder {
    /// Spawn one `kubectl port-forward` per spec.
    ///
    /// # Errors
    ///
    /// Returns an error if a local port is already taken or kubectl cannot be spawned.
    pub fn spawn(tools: &Toolbox, specs: &[&ForwardSpec]) -> Result<Self> {
        let mut forwards = Vec::with_capacity(specs.len());

        for spec in specs {
            if port_open(spec.local_port) {
                anyhow::bail!(
                    "Local port {} for '{}' is already in use",
                    spec.local_port,
                    spec.name
                );
            }

            let inv = invocation(tools, spec);
            let child = Command::new(&inv.program)
                .args(&inv.args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("Failed to spawn port forward for '{}'", spec.name))?;

            info!(
                name = %spec.name,
                service = %format!("{}/{}", spec.namespace, spec.service),
                local_port = spec.local_port,
                remote_port = spec.remote_port,
                "Port forward started"
            );
            forwards.push(ActiveForward {
                spec: (*spec).clone(),
                child,
            });
        }

        Ok(Self { forwards })
    }

    /// Number of forwards still owned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forwards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forwards.is_empty()
    }

    /// Wait until every local port accepts connections.
    ///
    /// Returns the names of forwards that never became reachable; those are
    /// stopped and dropped from the set.
    pub async fn wait_ready(&mut self, retry: &RetryConfig) -> Vec<String> {
        let mut failed = Vec::new();
        let mut ready = Vec::with_capacity(self.forwards.len());

        for mut fwd in self.forwards.drain(..) {
            let port = fwd.spec.local_port;
            let what = format!("localhost:{port} ({})", fwd.spec.name);
            let result = poll_until(retry, &what, || {
                if let Some(status) = fwd.child.try_wait()? {
                    anyhow::bail!("kubectl port-forward exited with {status}");
                }
                Ok(port_open(port))
            })
            .await;

            match result {
                Ok(_) => ready.push(fwd),
                Err(e) => {
                    warn!(name = %fwd.spec.name, error = %format!("{e:#}"), "Port forward not reachable");
                    let _ = fwd.child.start_kill();
                    failed.push(fwd.spec.name.clone());
                }
            }
        }

        self.forwards = ready;
        failed
    }

    /// Print the local URL of every forward.
    pub fn print_endpoints(&self) {
        for fwd in &self.forwards {
            ui::print_kv(
                &fwd.spec.name,
                &format!(
                    "http://localhost:{} -> {}/svc/{}:{}",
                    fwd.spec.local_port, fwd.spec.namespace, fwd.spec.service, fwd.spec.remote_port
                ),
            );
        }
    }

    /// Keep the forwards running until Ctrl-C, then stop them.
    ///
    /// # Errors
    ///
    /// Returns an error if every forward exits on its own.
    pub async fn run_until_interrupted(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(SUPERVISE_INTERVAL);

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    info!("Interrupted, stopping port forwards");
                    self.shutdown().await;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.reap_exited();
                    if self.forwards.is_empty() {
                        anyhow::bail!("All port forwards exited");
                    }
                }
            }
        }
    }

    /// Drop forwards whose process has exited.
    fn reap_exited(&mut self) {
        self.forwards.retain_mut(|fwd| match fwd.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(name = %fwd.spec.name, %status, "Port forward exited");
                ui::print_warning(&format!("Port forward '{}' exited ({status})", fwd.spec.name));
                false
            }
            Err(e) => {
                warn!(name = %fwd.spec.name, error = %e, "Failed to poll port forward");
                true
            }
        });
    }

    /// Kill every forward and wait for the processes to exit.
    pub async fn shutdown(&mut self) {
        for fwd in &mut self.forwards {
            if let Err(e) = fwd.child.kill().await {
                warn!(name = %fwd.spec.name, error = %e, "Failed to stop port forward");
            }
        }
        self.forwards.clear();
    }
}
