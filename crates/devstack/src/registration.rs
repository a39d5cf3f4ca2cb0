//! Registration of a declarative service file with the Kong admin API.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use gateway::{plan, AdminApi, AdminCall, AdminClient, ApplyReport, DeclarativeConfig, Registrar};

/// What a registration did.
#[derive(Debug)]
pub enum Registration {
    /// Dry run: the calls that would have been issued.
    Planned(Vec<AdminCall>),
    /// Calls issued against the admin API.
    Applied(ApplyReport),
}

/// Load and validate a declarative service file.
///
/// # Errors
///
/// Returns an error if the file is missing, malformed or invalid.
pub fn load(file: &Path) -> Result<DeclarativeConfig> {
    DeclarativeConfig::load(file)
        .with_context(|| format!("Failed to load service config {}", file.display()))
}

/// Register `file` against the admin API at `admin_url`.
///
/// A dry run validates the file and returns the plan without any HTTP call.
///
/// # Errors
///
/// Returns an error if the file is invalid, the admin API is unreachable or a
/// call fails.
pub async fn register(file: &Path, admin_url: &str, dry_run: bool) -> Result<Registration> {
    let config = load(file)?;

    if dry_run {
        info!(file = %file.display(), admin_url = %admin_url, "Dry run, no calls issued");
        return Ok(Registration::Planned(plan(&config)));
    }

    let client = AdminClient::new(admin_url)?;
    client
        .status()
        .await
        .with_context(|| format!("Kong admin API not reachable at {admin_url}"))?;

    info!(
        file = %file.display(),
        admin_url = %client.base_url(),
        services = config.services.len(),
        first = config.first_service().map_or("", |s| s.name.as_str()),
        "Registering gateway config"
    );
    let report = Registrar::new(&client)
        .apply(&config)
        .await
        .context("Gateway registration failed")?;

    Ok(Registration::Applied(report))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SERVICES: &str = r"
services:
  - name: echo
    url: http://echo:8080
    routes:
      - name: echo-route
        paths: [/echo]
    plugins:
      - name: cors
";

    fn services_file() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("services.yaml");
        std::fs::write(&file, SERVICES).unwrap();
        (dir, file)
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_calls() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, file) = services_file();
        let outcome = register(&file, &server.uri(), true).await.unwrap();

        let Registration::Planned(calls) = outcome else {
            panic!("dry run applied calls");
        };
        let calls: Vec<String> = calls.iter().map(ToString::to_string).collect();
        assert_eq!(
            calls,
            vec![
                "PUT /services/echo (url=http://echo:8080)",
                "PUT /services/echo/routes/echo-route (paths=/echo, strip_path=true)",
                "POST /services/echo/plugins (name=cors)",
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_run_still_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("services.yaml");
        std::fs::write(&file, "services: []\n").unwrap();

        let err = register(&file, "http://localhost:1", true).await.unwrap_err();
        assert!(format!("{err:#}").contains("no services defined"));
    }

    #[tokio::test]
    async fn test_applies_after_status_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/echo/plugins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": "p", "name": "cors" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, file) = services_file();
        let outcome = register(&file, &server.uri(), false).await.unwrap();

        let Registration::Applied(report) = outcome else {
            panic!("expected calls to be applied");
        };
        assert_eq!(report.applied.len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_admin_api_stops_before_any_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, file) = services_file();
        let err = register(&file, &server.uri(), false).await.unwrap_err();
        assert!(err.to_string().contains("not reachable"));
    }
}
