//! Declarative service registration for the Kong API gateway.
//!
//! This crate reads a declarative service description (services, their routes
//! and their plugins) and registers it against the Kong admin API.
//!
//! # Example
//!
//! ```rust,ignore
//! use gateway::{AdminClient, DeclarativeConfig, Registrar};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeclarativeConfig::load("kong/services.yaml")?;
//!     let client = AdminClient::new("http://localhost:8001")?;
//!
//!     let report = Registrar::new(&client).apply(&config).await?;
//!     println!("{} calls issued", report.applied.len());
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
mod error;
pub mod models;
pub mod registrar;

pub use client::{AdminApi, AdminClient, DEFAULT_ADMIN_URL};
pub use config::{DeclarativeConfig, PluginSpec, RouteSpec, ServiceSpec};
pub use error::GatewayError;
pub use registrar::{plan, AdminCall, ApplyReport, Registrar};
