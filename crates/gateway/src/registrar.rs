//! Registration of a declarative config against the admin API.
//!
//! Each service is registered with a single pass over the file:
//! an idempotent `PUT` for the service, one `PUT` per route, then one `POST`
//! per plugin that the service does not already have. Calls are issued once,
//! in order; the first failure aborts the run.

use std::collections::HashSet;
use std::fmt;

use tracing::{error, info};

use crate::client::AdminApi;
use crate::config::DeclarativeConfig;
use crate::error::GatewayError;
use crate::models::{PluginPayload, RoutePayload, ServicePayload};

/// A single admin API call derived from the config.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCall {
    /// `PUT /services/{service}`
    PutService {
        service: String,
        payload: ServicePayload,
    },
    /// `PUT /services/{service}/routes/{route}`
    PutRoute {
        service: String,
        route: String,
        payload: RoutePayload,
    },
    /// `POST /services/{service}/plugins`, skipped when the plugin exists.
    EnsurePlugin {
        service: String,
        payload: PluginPayload,
    },
}

impl fmt::Display for AdminCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PutService { service, payload } => {
                write!(f, "PUT /services/{service} (url={})", payload.url)
            }
            Self::PutRoute {
                service,
                route,
                payload,
            } => write!(
                f,
                "PUT /services/{service}/routes/{route} (paths={}, strip_path={})",
                payload.paths.join(","),
                payload.strip_path
            ),
            Self::EnsurePlugin { service, payload } => {
                write!(f, "POST /services/{service}/plugins (name={})", payload.name)
            }
        }
    }
}

/// Build the ordered list of calls needed to register `config`.
#[must_use]
pub fn plan(config: &DeclarativeConfig) -> Vec<AdminCall> {
    let mut calls = Vec::new();

    for service in &config.services {
        calls.push(AdminCall::PutService {
            service: service.name.clone(),
            payload: ServicePayload::from(service),
        });

        for route in &service.routes {
            calls.push(AdminCall::PutRoute {
                service: service.name.clone(),
                route: route.name.clone(),
                payload: RoutePayload::from(route),
            });
        }

        for plugin in &service.plugins {
            calls.push(AdminCall::EnsurePlugin {
                service: service.name.clone(),
                payload: PluginPayload::from(plugin),
            });
        }
    }

    calls
}

/// Outcome of a successful registration.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Calls that were issued.
    pub applied: Vec<AdminCall>,
    /// Plugins left untouched because the service already had them.
    pub skipped: Vec<AdminCall>,
}

/// Registers declarative configs through an [`AdminApi`].
pub struct Registrar<'a, A: AdminApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: AdminApi + ?Sized> Registrar<'a, A> {
    /// Create a registrar over an admin API.
    #[must_use]
    pub const fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Register every service in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Call`] wrapping the first failed call.
    pub async fn apply(&self, config: &DeclarativeConfig) -> Result<ApplyReport, GatewayError> {
        let mut report = ApplyReport::default();
        let mut existing_plugins: Option<(String, HashSet<String>)> = None;

        for call in plan(config) {
            if let AdminCall::EnsurePlugin { service, payload } = &call {
                let cached = matches!(&existing_plugins, Some((s, _)) if s == service);
                if !cached {
                    let names = self
                        .api
                        .list_plugins(service)
                        .await
                        .map_err(|e| wrap(&format!("GET /services/{service}/plugins"), e))?
                        .into_iter()
                        .map(|p| p.name)
                        .collect();
                    existing_plugins = Some((service.clone(), names));
                }

                let already_present = existing_plugins
                    .as_ref()
                    .is_some_and(|(_, names)| names.contains(&payload.name));
                if already_present {
                    info!(service = %service, plugin = %payload.name, "Plugin already present, skipping");
                    report.skipped.push(call);
                    continue;
                }
            }

            self.execute(&call).await.map_err(|e| wrap(&call.to_string(), e))?;
            if let (AdminCall::EnsurePlugin { payload, .. }, Some((_, names))) =
                (&call, existing_plugins.as_mut())
            {
                names.insert(payload.name.clone());
            }
            info!(call = %call, "Applied");
            report.applied.push(call);
        }

        Ok(report)
    }

    async fn execute(&self, call: &AdminCall) -> Result<(), GatewayError> {
        match call {
            AdminCall::PutService { service, payload } => {
                self.api.put_service(service, payload).await?;
            }
            AdminCall::PutRoute {
                service,
                route,
                payload,
            } => {
                self.api.put_route(service, route, payload).await?;
            }
            AdminCall::EnsurePlugin { service, payload } => {
                self.api.create_plugin(service, payload).await?;
            }
        }
        Ok(())
    }
}

fn wrap(call: &str, source: GatewayError) -> GatewayError {
    error!(call = %call, error = %source, "Admin API call failed");
    GatewayError::Call {
        call: call.to_string(),
        source: Box::new(source),
    }
}
