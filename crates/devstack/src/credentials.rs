//! Admin credential retrieval from cluster secrets.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use tracing::{debug, warn};

use crate::config::CredentialSpec;

/// Username and password for an application's admin account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Reads credentials through the Kubernetes API.
pub struct CredentialReader {
    client: Client,
}

impl CredentialReader {
    /// Create a reader for a kube context from the default kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns an error if the kubeconfig or context cannot be loaded.
    pub async fn for_context(context: &str) -> Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_kubeconfig(&options)
            .await
            .with_context(|| format!("Failed to load kubeconfig context '{context}'"))?;
        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        Ok(Self { client })
    }

    /// Read one credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret or one of its keys is missing.
    pub async fn fetch(&self, spec: &CredentialSpec) -> Result<Credential> {
        debug!(name = %spec.name, secret = %spec.secret, namespace = %spec.namespace, "Reading secret");
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &spec.namespace);
        let secret = secrets
            .get_opt(&spec.secret)
            .await
            .with_context(|| format!("Failed to read secret {}/{}", spec.namespace, spec.secret))?
            .with_context(|| format!("Secret {}/{} not found", spec.namespace, spec.secret))?;
        extract(spec, &secret)
    }

    /// Read every credential; failures are reported per entry.
    pub async fn fetch_all(&self, specs: &[CredentialSpec]) -> Vec<(String, Result<Credential>)> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let result = self.fetch(spec).await;
            if let Err(e) = &result {
                warn!(name = %spec.name, error = %format!("{e:#}"), "Credential unavailable");
            }
            results.push((spec.name.clone(), result));
        }
        results
    }
}

/// Pull a credential out of an already-fetched secret.
///
/// # Errors
///
/// Returns an error if a referenced key is missing or not UTF-8.
pub fn extract(spec: &CredentialSpec, secret: &Secret) -> Result<Credential> {
    let read_key = |key: &str| -> Result<String> {
        let bytes = secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .with_context(|| format!("Secret {} has no key '{key}'", spec.secret))?;
        let value = String::from_utf8(bytes.0.clone())
            .with_context(|| format!("Secret {} key '{key}' is not UTF-8", spec.secret))?;
        Ok(value.trim().to_string())
    };

    let username = match (&spec.username, &spec.username_key) {
        (_, Some(key)) => read_key(key)?,
        (Some(fixed), None) => fixed.clone(),
        (None, None) => anyhow::bail!("Credential {} has no username source", spec.name),
    };

    Ok(Credential {
        name: spec.name.clone(),
        username,
        password: read_key(&spec.password_key)?,
    })
}
