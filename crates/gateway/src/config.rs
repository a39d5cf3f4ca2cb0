//! Declarative service config.
//!
//! The file format describes one or more gateway services:
//!
//! ```yaml
//! services:
//!   - name: echo
//!     url: http://echo.default.svc.cluster.local:8080
//!     routes:
//!       - name: echo-route
//!         paths: ["/echo"]
//!         strip_path: true
//!     plugins:
//!       - name: rate-limiting
//!         config:
//!           minute: 60
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GatewayError;

/// Top-level declarative config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeConfig {
    /// Services to register, in order.
    pub services: Vec<ServiceSpec>,
}

/// A single gateway service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// Service name (also the admin API identifier).
    pub name: String,
    /// Upstream URL the gateway proxies to.
    pub url: String,
    /// Routes attached to this service.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// Plugins enabled on this service.
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
}

/// A route exposing a service under one or more paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    /// Route name.
    pub name: String,
    /// Request paths matched by this route.
    pub paths: Vec<String>,
    /// Strip the matched path before proxying. Kong defaults this to true.
    #[serde(default = "default_strip_path")]
    pub strip_path: bool,
}

/// A plugin enabled on a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSpec {
    /// Plugin name (e.g. `rate-limiting`, `cors`).
    pub name: String,
    /// Plugin-specific configuration, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    /// Whether the plugin is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_strip_path() -> bool {
    true
}

const fn default_enabled() -> bool {
    true
}

impl DeclarativeConfig {
    /// Parse and validate a config from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Parse`] for malformed YAML and
    /// [`GatewayError::InvalidConfig`] when validation fails.
    pub fn from_yaml(yaml: &str) -> Result<Self, GatewayError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GatewayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// The first service in the file.
    #[must_use]
    pub fn first_service(&self) -> Option<&ServiceSpec> {
        self.services.first()
    }

    /// Check the constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.services.is_empty() {
            return Err(invalid("no services defined"));
        }

        let mut service_names = HashSet::new();
        for service in &self.services {
            service.validate()?;
            if !service_names.insert(service.name.as_str()) {
                return Err(invalid(format!("duplicate service name '{}'", service.name)));
            }
        }

        Ok(())
    }
}

impl ServiceSpec {
    fn validate(&self) -> Result<(), GatewayError> {
        if self.name.trim().is_empty() {
            return Err(invalid("service with empty name"));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| invalid(format!("service '{}': bad url '{}': {e}", self.name, self.url)))?;
        if url.host_str().is_none() {
            return Err(invalid(format!(
                "service '{}': url '{}' has no host",
                self.name, self.url
            )));
        }

        let mut route_names = HashSet::new();
        for route in &self.routes {
            if route.name.trim().is_empty() {
                return Err(invalid(format!("service '{}': route with empty name", self.name)));
            }
            if !route_names.insert(route.name.as_str()) {
                return Err(invalid(format!(
                    "service '{}': duplicate route name '{}'",
                    self.name, route.name
                )));
            }
            if route.paths.is_empty() {
                return Err(invalid(format!("route '{}' has no paths", route.name)));
            }
            if let Some(path) = route.paths.iter().find(|p| !p.starts_with('/')) {
                return Err(invalid(format!(
                    "route '{}': path '{path}' must start with '/'",
                    route.name
                )));
            }
        }

        let mut plugin_names = HashSet::new();
        for plugin in &self.plugins {
            if plugin.name.trim().is_empty() {
                return Err(invalid(format!("service '{}': plugin with empty name", self.name)));
            }
            if !plugin_names.insert(plugin.name.as_str()) {
                return Err(invalid(format!(
                    "service '{}': plugin '{}' listed twice",
                    self.name, plugin.name
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> GatewayError {
    GatewayError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
services:
  - name: echo
    url: http://echo.default.svc.cluster.local:8080
    routes:
      - name: echo-route
        paths: [/echo, /echo-v2]
      - name: echo-raw
        paths: [/raw]
        strip_path: false
    plugins:
      - name: rate-limiting
        config:
          minute: 60
      - name: cors
";

    #[test]
    fn test_parse_sample() {
        let config = DeclarativeConfig::from_yaml(SAMPLE).unwrap();
        let service = config.first_service().unwrap();

        assert_eq!(service.name, "echo");
        assert_eq!(service.routes.len(), 2);
        assert_eq!(service.routes[0].paths, vec!["/echo", "/echo-v2"]);
        assert!(service.routes[0].strip_path);
        assert!(!service.routes[1].strip_path);
        assert_eq!(
            service.plugins[0].config,
            Some(serde_json::json!({ "minute": 60 }))
        );
        assert!(service.plugins[1].config.is_none());
        assert!(service.plugins[1].enabled);
    }

    #[test]
    fn test_routes_and_plugins_optional() {
        let config =
            DeclarativeConfig::from_yaml("services:\n  - name: bare\n    url: http://bare:80\n")
                .unwrap();
        assert!(config.services[0].routes.is_empty());
        assert!(config.services[0].plugins.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = DeclarativeConfig::from_yaml("services: [name: x").unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = "services:\n  - name: a\n    url: http://a\n    rotues: []\n";
        assert!(matches!(
            DeclarativeConfig::from_yaml(yaml).unwrap_err(),
            GatewayError::Parse(_)
        ));
    }

    #[test]
    fn test_empty_services_rejected() {
        let err = DeclarativeConfig::from_yaml("services: []").unwrap_err();
        assert!(err.to_string().contains("no services"));
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let yaml = "services:\n  - {name: a, url: 'http://a'}\n  - {name: a, url: 'http://b'}\n";
        let err = DeclarativeConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate service name 'a'"));
    }

    #[test]
    fn test_bad_url_rejected() {
        let yaml = "services:\n  - {name: a, url: 'not a url'}\n";
        let err = DeclarativeConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidConfig(_)));
    }

    #[test]
    fn test_relative_path_rejected() {
        let yaml = r"
services:
  - name: a
    url: http://a
    routes:
      - name: r
        paths: [api]
";
        let err = DeclarativeConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_route_without_paths_rejected() {
        let yaml = r"
services:
  - name: a
    url: http://a
    routes:
      - name: r
        paths: []
";
        let err = DeclarativeConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("has no paths"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DeclarativeConfig::load("/nonexistent/services.yaml").unwrap_err();
        assert!(matches!(err, GatewayError::Io { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = DeclarativeConfig::load(&path).unwrap();
        assert_eq!(config.services.len(), 1);
    }

    #[test]
    fn test_bundled_sample_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../deploy/kong/services.yaml");
        let config = DeclarativeConfig::load(path).unwrap();

        assert_eq!(config.first_service().unwrap().name, "echo");
        assert_eq!(config.services.len(), 2);
    }

    fn rejection(yaml: &str) -> String {
        DeclarativeConfig::from_yaml(yaml).unwrap_err().to_string()
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let err = rejection(
            r"
services:
  - name: s
    url: http://s
    plugins:
      - name: cors
      - name: cors
",
        );
        assert!(err.contains("plugin 'cors' listed twice"));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let err = rejection(
            r"
services:
  - name: s
    url: http://s
    routes:
      - name: r
        paths: [/a]
      - name: r
        paths: [/b]
",
        );
        assert!(err.contains("duplicate route name 'r'"));
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(rejection("services:\n  - name: ' '\n    url: http://s\n")
            .contains("service with empty name"));
        assert!(rejection(
            "services:\n  - name: s\n    url: http://s\n    routes:\n      - name: ''\n        paths: [/a]\n"
        )
        .contains("route with empty name"));
        assert!(rejection(
            "services:\n  - name: s\n    url: http://s\n    plugins:\n      - name: ''\n"
        )
        .contains("plugin with empty name"));
    }

    #[test]
    fn test_url_without_host_rejected() {
        let err = rejection("services:\n  - name: s\n    url: 'unix:/run/echo.socket'\n");
        assert!(err.contains("has no host"));
    }
}
