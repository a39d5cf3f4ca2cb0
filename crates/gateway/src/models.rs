//! Kong admin API request and response models.

use serde::{Deserialize, Serialize};

use crate::config::{PluginSpec, RouteSpec, ServiceSpec};

/// Body for `PUT /services/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePayload {
    pub url: String,
}

/// Body for `PUT /services/{service}/routes/{route}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePayload {
    pub paths: Vec<String>,
    pub strip_path: bool,
}

/// Body for `POST /services/{service}/plugins`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    pub enabled: bool,
}

/// Service entity as returned by the admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: Option<String>,
}

/// Route entity as returned by the admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub paths: Option<Vec<String>>,
}

/// Plugin entity as returned by the admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Paginated list envelope used by Kong collection endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Path (or absolute URL) of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /status` response (only the fields we look at).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub database: Option<DatabaseStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseStatus {
    pub reachable: bool,
}

const fn default_enabled() -> bool {
    true
}

impl From<&ServiceSpec> for ServicePayload {
    fn from(spec: &ServiceSpec) -> Self {
        Self {
            url: spec.url.clone(),
        }
    }
}

impl From<&RouteSpec> for RoutePayload {
    fn from(spec: &RouteSpec) -> Self {
        Self {
            paths: spec.paths.clone(),
            strip_path: spec.strip_path,
        }
    }
}

impl From<&PluginSpec> for PluginPayload {
    fn from(spec: &PluginSpec) -> Self {
        Self {
            name: spec.name.clone(),
            config: spec.config.clone(),
            enabled: spec.enabled,
        }
    }
}
