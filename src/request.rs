//! Probe request parsing
//!
//! Turns the query parameters of a `/probe` call into a [`ProbeRequest`].
//! Everything here fails before any network I/O.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::catalogue::ModuleFamily;
use crate::config::{DEFAULT_PROBE_TIMEOUT, MAX_PROBE_TIMEOUT};
use crate::error::{ProbeError, Result};

/// Header Prometheus uses to announce its scrape timeout
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Device to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Base URL of the device (`http://192.168.1.50`)
    pub base_url: String,
    /// Number of meters, None when unknown
    pub meter_count: Option<u32>,
    /// Number of energy storage systems, None when unknown
    pub ess_count: Option<u32>,
    /// Number of chargers, None when unknown
    pub charger_count: Option<u32>,
}

impl ProbeTarget {
    /// Target with unknown module counts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            meter_count: None,
            ess_count: None,
            charger_count: None,
        }
    }

    /// Target with explicit module counts
    pub fn with_counts(base_url: impl Into<String>, meter: u32, ess: u32, charger: u32) -> Self {
        Self {
            base_url: base_url.into(),
            meter_count: Some(meter),
            ess_count: Some(ess),
            charger_count: Some(charger),
        }
    }

    /// Known number of modules of a family (`_sum` always has one)
    pub fn count(&self, family: ModuleFamily) -> Option<u32> {
        match family {
            ModuleFamily::Sum => Some(1),
            ModuleFamily::Ess => self.ess_count,
            ModuleFamily::Charger => self.charger_count,
            ModuleFamily::Meter => self.meter_count,
        }
    }

    /// Label value identifying the device
    pub fn label(&self) -> &str {
        &self.base_url
    }
}

/// One inbound probe request
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub target: ProbeTarget,
    /// Probe deadline, measured from the start of the probe
    pub timeout: Duration,
}

impl ProbeRequest {
    /// Parse query parameters and the optional scrape timeout header
    pub fn from_query(params: &HashMap<String, String>, scrape_timeout: Option<&str>) -> Result<Self> {
        let base_url = required(params, "target")?;
        validate_target(&base_url)?;

        let target = ProbeTarget {
            base_url,
            meter_count: optional_count(params, "meter")?,
            ess_count: optional_count(params, "ess")?,
            charger_count: optional_count(params, "charger")?,
        };

        let timeout = match scrape_timeout.or_else(|| params.get("timeout").map(String::as_str)) {
            Some(raw) => parse_timeout(raw)?,
            None => DEFAULT_PROBE_TIMEOUT,
        };

        Ok(Self { target, timeout })
    }

    /// Absolute deadline of a probe starting at `now`
    pub fn deadline(&self, now: Instant) -> Result<Instant> {
        now.checked_add(self.timeout.min(MAX_PROBE_TIMEOUT))
            .ok_or_else(|| ProbeError::InvalidParameter {
                name: "timeout".to_string(),
                reason: format!("deadline out of range: {:?}", self.timeout),
            })
    }
}

fn required(params: &HashMap<String, String>, name: &str) -> Result<String> {
    match params.get(name).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ProbeError::MissingParameter(name.to_string())),
    }
}

fn optional_count(params: &HashMap<String, String>, name: &str) -> Result<Option<u32>> {
    match params.get(name).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ProbeError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a non-negative integer, got {raw:?}"),
            }),
    }
}

/// Scrape timeout in seconds; zero means the default
fn parse_timeout(raw: &str) -> Result<Duration> {
    let invalid = |reason: &str| ProbeError::InvalidParameter {
        name: "timeout".to_string(),
        reason: format!("{reason}, got {raw:?}"),
    };

    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("expected seconds"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid("expected a non-negative number of seconds"));
    }
    if seconds == 0.0 {
        return Ok(DEFAULT_PROBE_TIMEOUT);
    }

    let timeout = Duration::try_from_secs_f64(seconds).map_err(|_| invalid("out of range"))?;
    if timeout > MAX_PROBE_TIMEOUT {
        return Err(invalid(&format!(
            "expected at most {} seconds",
            MAX_PROBE_TIMEOUT.as_secs()
        )));
    }
    Ok(timeout)
}

fn validate_target(target: &str) -> Result<()> {
    let url = reqwest::Url::parse(target).map_err(|_| ProbeError::InvalidTarget(target.to_string()))?;
    let supported = matches!(url.scheme(), "http" | "https");
    if !supported || url.host_str().is_none() {
        return Err(ProbeError::InvalidTarget(target.to_string()));
    }
    Ok(())
}
