//! Kong admin API client.
//!
//! API Documentation: <https://docs.konghq.com/gateway/latest/admin-api/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;
use crate::models::{
    NodeStatus, Page, Plugin, PluginPayload, Route, RoutePayload, Service, ServicePayload,
};

/// Admin URL used when `KONG_ADMIN_URL` is not set.
pub const DEFAULT_ADMIN_URL: &str = "http://localhost:8001";

/// Default timeout for admin API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound on pages followed when listing a collection.
const MAX_PAGES: usize = 100;

/// Operations the registrar needs from the admin API.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Create or replace a service by name.
    async fn put_service(
        &self,
        name: &str,
        payload: &ServicePayload,
    ) -> Result<Service, GatewayError>;

    /// Create or replace a route of a service by name.
    async fn put_route(
        &self,
        service: &str,
        route: &str,
        payload: &RoutePayload,
    ) -> Result<Route, GatewayError>;

    /// List all plugins attached to a service.
    async fn list_plugins(&self, service: &str) -> Result<Vec<Plugin>, GatewayError>;

    /// Attach a new plugin to a service.
    async fn create_plugin(
        &self,
        service: &str,
        payload: &PluginPayload,
    ) -> Result<Plugin, GatewayError>;

    /// Node status, used as a reachability probe.
    async fn status(&self) -> Result<NodeStatus, GatewayError>;
}

/// `reqwest`-backed admin API client.
#[derive(Clone)]
pub struct AdminClient {
    client: Client,
    base_url: Url,
}

impl AdminClient {
    /// Create a client for the admin API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidConfig(format!(
                "admin URL '{base_url}' cannot be used as a base"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request with an optional JSON body and decode the response.
    async fn send<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = %method, url = %url, "Admin API request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse admin API response");
                GatewayError::Serialization(e)
            })
        } else {
            Err(GatewayError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    /// Resolve a `next` cursor, which Kong returns either as a path or an absolute URL.
    fn resolve_next(&self, next: &str) -> Result<Url, GatewayError> {
        if next.starts_with("http://") || next.starts_with("https://") {
            return Ok(Url::parse(next)?);
        }
        let mut url = self.base_url.clone();
        let (path, query) = next.split_once('?').unwrap_or((next, ""));
        let prefix = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));
        url.set_query((!query.is_empty()).then_some(query));
        Ok(url)
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn put_service(
        &self,
        name: &str,
        payload: &ServicePayload,
    ) -> Result<Service, GatewayError> {
        let url = self.endpoint(&["services", name]);
        self.send(Method::PUT, url, Some(payload)).await
    }

    async fn put_route(
        &self,
        service: &str,
        route: &str,
        payload: &RoutePayload,
    ) -> Result<Route, GatewayError> {
        let url = self.endpoint(&["services", service, "routes", route]);
        self.send(Method::PUT, url, Some(payload)).await
    }

    async fn list_plugins(&self, service: &str) -> Result<Vec<Plugin>, GatewayError> {
        let mut plugins = Vec::new();
        let mut url = self.endpoint(&["services", service, "plugins"]);

        for _ in 0..MAX_PAGES {
            let page: Page<Plugin> = self.send::<_, ()>(Method::GET, url, None).await?;
            plugins.extend(page.data);

            match page.next.as_deref() {
                Some(next) if !next.is_empty() => url = self.resolve_next(next)?,
                _ => return Ok(plugins),
            }
        }

        warn!(service = %service, pages = MAX_PAGES, "Plugin listing truncated");
        Ok(plugins)
    }

    async fn create_plugin(
        &self,
        service: &str,
        payload: &PluginPayload,
    ) -> Result<Plugin, GatewayError> {
        let url = self.endpoint(&["services", service, "plugins"]);
        self.send(Method::POST, url, Some(payload)).await
    }

    async fn status(&self) -> Result<NodeStatus, GatewayError> {
        let url = self.endpoint(&["status"]);
        self.send::<_, ()>(Method::GET, url, None).await
    }
}
