//! # usdata-core
//!
//! Provider-adapter gateway over five U.S. government data APIs.
//!
//! ## Overview
//!
//! Remote callers invoke named operations with loosely typed JSON arguments.
//! The gateway validates them against each operation's declared schema,
//! routes the call to the owning agency adapter, and returns a uniform
//! [`Envelope`] whether the call succeeded or failed.
//!
//! | Provider | Agency | Upstream |
//! |----------|--------|----------|
//! | `census` | U.S. Census Bureau | ACS data API |
//! | `labor` | Bureau of Labor Statistics | public timeseries API v2 |
//! | `air_quality` | EPA | Air Quality System (AQS) |
//! | `drugs` | FDA | openFDA |
//! | `filings` | SEC | EDGAR |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | The five agency adapters |
//! | [`config`] | Base URLs, timeouts, credentials |
//! | [`connection`] | Lazily built, exactly-once released HTTP handles |
//! | [`envelope`] | Uniform response envelope |
//! | [`error`] | Validation and gateway errors |
//! | [`gateway`] | Operation lookup and dispatch |
//! | [`http_client`] | HTTP transport abstraction and test double |
//! | [`provider`] | Adapter trait |
//! | [`reference`] | Static lookup tables |
//! | [`registry`] | Operation catalogue |
//! | [`source`] | Provider identifiers |
//! | [`validation`] | Declarative argument schemas |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serde_json::json;
//! use usdata_core::{Gateway, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::from_config(&GatewayConfig::from_env())?;
//!
//!     let envelope = gateway
//!         .dispatch("search_population", &json!({"year": 2022, "state": "06"}))
//!         .await;
//!     println!("{}", envelope.to_json(true)?);
//!
//!     gateway.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ JSON-RPC / CLI   │
//! └────────┬─────────┘
//!          │ name + JSON args
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Gateway          │────▶│ ArgSchema        │
//! │ (registry)       │     │ (validation)     │
//! └────────┬─────────┘     └──────────────────┘
//!          │ ValidArgs
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Provider adapter │────▶│ LazyClient       │
//! │                  │     │ (HttpClient)     │
//! └────────┬─────────┘     └──────────────────┘
//!          │ GatewayResult<Envelope>
//!          ▼
//! ┌──────────────────┐
//! │ Envelope         │
//! └──────────────────┘
//! ```
//!
//! ## Security
//!
//! - Credentials come from the environment and are never logged
//! - Logged request URLs have `key`, `email` and `registrationkey` redacted

pub mod adapters;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod http_client;
pub mod provider;
pub mod reference;
pub mod registry;
pub mod source;
pub mod validation;

// Adapter implementations
pub use adapters::{
    normalize_cik, AirQualityAdapter, CensusAdapter, DrugsAdapter, FilingsAdapter, LaborAdapter,
};

// Configuration
pub use config::{Credentials, GatewayConfig, ProviderConfig};

// Connection handles
pub use connection::{ClientFactory, FixedClientFactory, LazyClient, ReqwestClientFactory};

// Envelope types
pub use envelope::{Envelope, Row};

// Error types
pub use error::{ErrorKind, GatewayError, GatewayResult, ValidationError, Violation};

// Dispatch
pub use gateway::{Gateway, GatewayBuilder, ProviderSnapshot, ShutdownGuard};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, MockHttpClient,
    ReqwestHttpClient,
};

pub use provider::Provider;
pub use registry::{OperationRegistry, OperationSpec};
pub use source::ProviderId;
pub use validation::{ArgSchema, FieldKind, FieldSpec, ValidArgs};
