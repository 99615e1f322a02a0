//! # fenecon-probe
//!
//! Probing engine for FENECON energy management systems. Queries the device's
//! channel REST API on demand and publishes the values as Prometheus gauges.
//!
//! ## Key Features
//!
//! - **Two query modes**: one request per channel, or one wildcard request
//!   per module family with module discovery
//! - **Bounded fan-out**: at most `parallel` requests in flight per probe
//! - **Retry with backoff**: transient failures are retried, all attempts
//!   bounded by the request timeout and the probe deadline
//! - **Partial results**: a failing channel only leaves its gauge unset
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use fenecon_probe::{build_http_client, ProbeConfig, ProbeMetrics, ProbeRequest, Prober};
//! use prometheus::{Encoder, Registry, TextEncoder};
//! use tokio::time::Instant;
//!
//! # async fn probe() -> fenecon_probe::Result<String> {
//! let params = HashMap::from([("target".to_string(), "http://192.168.1.50".to_string())]);
//! let request = ProbeRequest::from_query(&params, None)?;
//!
//! let config = ProbeConfig::default();
//! let registry = Registry::new();
//! let metrics = Arc::new(ProbeMetrics::register(&registry)?);
//! let mut prober = Prober::new(build_http_client(&config)?, config, metrics);
//! prober.run(&request.target, Instant::now() + request.timeout).await;
//!
//! let mut buffer = Vec::new();
//! TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
//! Ok(String::from_utf8_lossy(&buffer).into_owned())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`channel`]: Channel addresses, records and values
//! - [`discovery`]: Wildcard query results
//! - [`client`]: Retrying device REST client
//! - [`retry`]: Retry policy and backoff
//! - [`scheduler`]: Bounded concurrency task group
//! - [`catalogue`]: Queried channels per module family
//! - [`policy`]: Publication policy
//! - [`metrics`]: Gauges and label sets
//! - [`prober`]: Probe orchestration
//! - [`request`]: Probe request parsing

// Modules
pub mod catalogue;
pub mod channel;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod prober;
pub mod request;
pub mod retry;
pub mod scheduler;

// Re-exports for convenient access
pub use catalogue::{ChannelSpec, ModuleFamily};
pub use channel::{ChannelRecord, ChannelValue};
pub use client::{build_http_client, DeviceClient};
pub use config::{
    BasicAuth, ProbeConfig, QueryMode, DEFAULT_PARALLEL, DEFAULT_PROBE_TIMEOUT, MAX_PROBE_TIMEOUT,
};
pub use discovery::DiscoveryResult;
pub use error::{ProbeError, Result};
pub use metrics::{LabelSet, LabelShape, Metric, ProbeMetrics};
pub use policy::Publication;
pub use prober::{ProbeReport, ProbeState, Prober};
pub use request::{ProbeRequest, ProbeTarget, SCRAPE_TIMEOUT_HEADER};
pub use retry::{with_retry, RetryPolicy};
pub use scheduler::{JoinSummary, Scheduler, SchedulerHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
