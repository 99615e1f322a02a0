// FENECON Exporter - probe endpoint
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! `/probe` handler.
//!
//! Every request gets a fresh registry and prober. The registry is rendered
//! after the probe, whatever subset of gauges the device delivered in time.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use fenecon_probe::{
    build_http_client, ProbeConfig, ProbeError, ProbeMetrics, ProbeReport, ProbeRequest, Prober,
    SCRAPE_TIMEOUT_HEADER,
};
use prometheus::Registry;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::metrics::{encode_registry, record_outcome, record_probe, ProbeOutcome};

/// Application state shared across handlers.
pub struct AppState {
    pub config: ProbeConfig,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ProbeConfig) -> fenecon_probe::Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self { config, http })
    }
}

/// Probe handler - probes one device and returns its gauges.
pub async fn probe_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let scrape_timeout = headers
        .get(SCRAPE_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok());

    let request = match ProbeRequest::from_query(&params, scrape_timeout) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected probe request");
            record_outcome(ProbeOutcome::Invalid);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match run_probe(&state, &request).await {
        Ok((body, report)) => {
            if report.deadline_exceeded {
                info!(device = %request.target.base_url, "probe deadline exceeded, serving partial result");
            }
            record_probe(&report);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(device = %request.target.base_url, error = %e, "probe failed");
            record_outcome(ProbeOutcome::Error);
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string()).into_response()
        }
    }
}

async fn run_probe(
    state: &AppState,
    request: &ProbeRequest,
) -> Result<(String, ProbeReport), ProbeError> {
    let registry = Registry::new();
    let metrics = Arc::new(ProbeMetrics::register(&registry)?);

    let deadline = request.deadline(Instant::now())?;
    let mut prober = Prober::new(state.http.clone(), state.config.clone(), metrics);
    let report = prober.run(&request.target, deadline).await;

    Ok((encode_registry(&registry.gather()), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(ProbeConfig::default()).unwrap())
    }

    fn params(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_target_is_bad_request() {
        let response = probe_handler(State(state()), params(&[]), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("target"));
    }

    #[tokio::test]
    async fn test_invalid_count_is_bad_request() {
        let response = probe_handler(
            State(state()),
            params(&[("target", "http://fems"), ("meter", "two")]),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("meter"));
    }

    #[tokio::test]
    async fn test_invalid_scrape_timeout_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-prometheus-scrape-timeout-seconds",
            HeaderValue::from_static("later"),
        );
        let response = probe_handler(
            State(state()),
            params(&[("target", "http://fems")]),
            headers,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_huge_timeout_is_bad_request() {
        for timeout in ["1e300", "1e19"] {
            let response = probe_handler(
                State(state()),
                params(&[("target", "http://fems"), ("timeout", timeout)]),
                HeaderMap::new(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{timeout}");
            assert!(body_text(response).await.contains("timeout"));
        }
    }

    #[tokio::test]
    async fn test_probe_renders_device_gauges() {
        let mut server = mockito::Server::new_async().await;
        let sum = server
            .mock("GET", "/rest/channel/_sum/.*")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"address": "_sum/EssSoc", "type": "INTEGER", "accessMode": "RO", "text": "", "unit": "%", "value": 55},
                    {"address": "_sum/GridActivePower", "type": "INTEGER", "accessMode": "RO", "text": "", "unit": "W", "value": -1200}
                ]"#,
            )
            .create_async()
            .await;

        let target = server.url();
        let response = probe_handler(
            State(state()),
            params(&[("target", target.as_str()), ("meter", "0"), ("ess", "0"), ("charger", "0")]),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));

        let body = body_text(response).await;
        assert!(body.contains(&format!(
            "fenecon_battery_charge_percent{{module=\"_sum\",target=\"{target}\"}} 55"
        )));
        assert!(body.contains(&format!(
            "fenecon_grid_power{{module=\"_sum\",target=\"{target}\"}} -1200"
        )));
        assert!(body.contains(&format!("fenecon_info{{target=\"{target}\"}} 1")));
        assert!(!body.contains("fenecon_meter_"));
        sum.assert_async().await;
    }
}
