//! Probe orchestrator
//!
//! One [`Prober`] runs one probe against one device:
//!
//! ```text
//! Idle -> Discovering -> Publishing -> Done
//! ```
//!
//! While discovering, channel queries run on a bounded [`Scheduler`]. In
//! [`QueryMode::Explicit`] every catalogued channel of every known module is
//! fetched by its own request. In [`QueryMode::Wildcard`] one request per
//! module family returns all of its channels; the module ids found in the
//! result each get a follow-up task that publishes from the fetched result.
//!
//! Channel values pass the catalogue's [`Publication`](crate::policy::Publication)
//! policy before reaching the gauges. A failing query only leaves its gauges
//! unset. Once the barrier is passed (or the deadline fires) the `info` gauge
//! is set, so every probe publishes at least that.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::catalogue::{ChannelSpec, ModuleFamily};
use crate::channel::{join_address, ChannelValue};
use crate::client::DeviceClient;
use crate::config::{ProbeConfig, QueryMode};
use crate::discovery::DiscoveryResult;
use crate::metrics::{LabelSet, Metric, ProbeMetrics};
use crate::request::ProbeTarget;
use crate::scheduler::{Scheduler, SchedulerHandle};

/// Lifecycle of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeState {
    #[default]
    Idle,
    /// Device queries in flight
    Discovering,
    /// Barrier passed, final gauges being written
    Publishing,
    Done,
}

/// Outcome of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub state: ProbeState,
    /// Tasks scheduled, queries and publish steps alike
    pub scheduled: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Whether the deadline cut the probe short
    pub deadline_exceeded: bool,
    pub elapsed: Duration,
}

/// State shared by every task of a probe
struct ProbeContext {
    client: DeviceClient,
    metrics: Arc<ProbeMetrics>,
    labels: LabelSet,
    deadline: Instant,
}

impl ProbeContext {
    fn publish(&self, module: &str, spec: &ChannelSpec, value: &ChannelValue) {
        let Some(value) = spec.policy.select(value) else {
            return;
        };
        let labels = self.labels.with_module(module).with_phase(spec.phase);
        self.metrics.set(spec.metric, &labels, value);
    }
}

/// Runs a single probe
pub struct Prober {
    http: reqwest::Client,
    config: ProbeConfig,
    metrics: Arc<ProbeMetrics>,
    state: ProbeState,
}

impl Prober {
    /// Create a prober writing into `metrics`
    pub fn new(http: reqwest::Client, config: ProbeConfig, metrics: Arc<ProbeMetrics>) -> Self {
        Self {
            http,
            config,
            metrics,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Probe `target`, publishing everything fetched before `deadline`
    pub async fn run(&mut self, target: &ProbeTarget, deadline: Instant) -> ProbeReport {
        let started = Instant::now();
        let context = Arc::new(ProbeContext {
            client: DeviceClient::new(self.http.clone(), &target.base_url, &self.config),
            metrics: Arc::clone(&self.metrics),
            labels: LabelSet::target(target.label()),
            deadline,
        });

        self.state = ProbeState::Discovering;
        let mut scheduler = Scheduler::new(self.config.effective_parallel());
        match self.config.mode {
            QueryMode::Explicit => schedule_explicit(&scheduler, &context, target),
            QueryMode::Wildcard => schedule_wildcard(&scheduler, &context, target),
        }
        let summary = scheduler.join_until(deadline).await;

        self.state = ProbeState::Publishing;
        self.metrics.set(Metric::Info, &context.labels, 1.0);

        self.state = ProbeState::Done;
        let report = ProbeReport {
            state: self.state,
            scheduled: summary.scheduled,
            failed: summary.failed,
            deadline_exceeded: !summary.completed,
            elapsed: started.elapsed(),
        };

        debug!(
            device = %target.base_url,
            mode = %self.config.mode,
            scheduled = report.scheduled,
            failed = report.failed,
            deadline_exceeded = report.deadline_exceeded,
            elapsed = ?report.elapsed,
            "probe finished"
        );
        report
    }
}

fn schedule_explicit(scheduler: &Scheduler, context: &Arc<ProbeContext>, target: &ProbeTarget) {
    for family in ModuleFamily::ALL {
        let count = target.count(family).unwrap_or(0);
        for index in 0..count {
            let module = family.module_name(index);
            for spec in family.channels() {
                let address = join_address(&[module.as_str(), spec.leaf]);
                let context = Arc::clone(context);
                let module = module.clone();

                scheduler.schedule(address.clone(), async move {
                    let record = context.client.get_channel(&address, context.deadline).await?;
                    context.publish(&module, spec, &record.value);
                    Ok(())
                });
            }
        }
    }
}

fn schedule_wildcard(scheduler: &Scheduler, context: &Arc<ProbeContext>, target: &ProbeTarget) {
    for family in ModuleFamily::ALL {
        let count = target.count(family);
        if count == Some(0) {
            debug!(family = family.prefix(), "module count is zero, skipping");
            continue;
        }

        let path = family.wildcard_path();
        let context = Arc::clone(context);
        let handle = scheduler.handle();

        scheduler.schedule(path.clone(), async move {
            let result = context.client.get_wildcard(&path, context.deadline).await?;
            let modules = accepted_modules(family, &result, count);
            debug!(path = %path, records = result.len(), modules = ?modules, "wildcard query done");

            schedule_publish(&handle, &context, family, modules, Arc::new(result));
            Ok(())
        });
    }
}

fn schedule_publish(
    handle: &SchedulerHandle,
    context: &Arc<ProbeContext>,
    family: ModuleFamily,
    modules: Vec<DiscoveredModule>,
    result: Arc<DiscoveryResult>,
) {
    for module in modules {
        let context = Arc::clone(context);
        let result = Arc::clone(&result);

        handle.schedule(format!("{}/*", module.name), async move {
            for spec in family.channels() {
                let record = result.lookup(&[module.id.as_str(), spec.leaf]);
                context.publish(&module.name, spec, &record.value);
            }
            Ok(())
        });
    }
}

/// A module found in a wildcard result
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiscoveredModule {
    /// Canonical module name, used as the `module` label
    name: String,
    /// Id as the device spells it, used for lookups
    id: String,
}

/// Modules of `family` found in a wildcard result, limited to indices
/// below `count` when the count is known. Sorted by index; ids differing
/// only in case or leading zeros are reported once.
fn accepted_modules(
    family: ModuleFamily,
    result: &DiscoveryResult,
    count: Option<u32>,
) -> Vec<DiscoveredModule> {
    let mut modules: Vec<(u32, String)> = result
        .distinct_segments(0)
        .into_iter()
        .filter_map(|id| {
            let index = family.module_index(&id)?;
            match count {
                Some(count) if index >= count => None,
                _ => Some((index, id)),
            }
        })
        .collect();
    modules.sort();
    modules.dedup_by_key(|(index, _)| *index);
    modules
        .into_iter()
        .map(|(index, id)| DiscoveredModule {
            name: family.module_name(index),
            id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelRecord;

    fn result(addresses: &[&str]) -> DiscoveryResult {
        addresses
            .iter()
            .map(|address| ChannelRecord::absent(address))
            .collect()
    }

    fn names(modules: Vec<DiscoveredModule>) -> Vec<String> {
        modules.into_iter().map(|module| module.name).collect()
    }

    #[test]
    fn test_accepted_modules_unknown_count() {
        let result = result(&["meter1/ActivePower", "meter0/ActivePower", "meter0/Voltage"]);
        assert_eq!(
            names(accepted_modules(ModuleFamily::Meter, &result, None)),
            vec!["meter0", "meter1"]
        );
    }

    #[test]
    fn test_accepted_modules_bounded_by_count() {
        let result = result(&["meter0/State", "meter1/State", "meter2/State"]);
        assert_eq!(
            names(accepted_modules(ModuleFamily::Meter, &result, Some(2))),
            vec!["meter0", "meter1"]
        );
    }

    #[test]
    fn test_accepted_modules_rejects_foreign_ids() {
        let result = result(&["essCluster0/Soc", "ess0/Soc", "meter0/State", "ess/Soc"]);
        assert_eq!(
            names(accepted_modules(ModuleFamily::Ess, &result, None)),
            vec!["ess0"]
        );
    }

    #[test]
    fn test_accepted_modules_deduplicated() {
        let result = result(&["Meter0/State", "meter0/State", "meter00/State"]);
        assert_eq!(
            accepted_modules(ModuleFamily::Meter, &result, None),
            vec![DiscoveredModule {
                name: "meter0".to_string(),
                id: "Meter0".to_string(),
            }]
        );
    }

    #[test]
    fn test_accepted_modules_sum() {
        let result = result(&["_sum/EssSoc", "_sum/GridMode"]);
        assert_eq!(
            names(accepted_modules(ModuleFamily::Sum, &result, Some(1))),
            vec!["_sum"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_device_still_publishes_info() {
        let registry = prometheus::Registry::new();
        let metrics = Arc::new(ProbeMetrics::register(&registry).unwrap());
        let mut config = ProbeConfig::with_mode(QueryMode::Explicit);
        config.retry = crate::retry::RetryPolicy::none(Duration::from_millis(200));
        let mut prober = Prober::new(reqwest::Client::new(), config, metrics);
        assert_eq!(prober.state(), ProbeState::Idle);

        // port 9 (discard) on localhost refuses connections
        let target = ProbeTarget::with_counts("http://127.0.0.1:9", 0, 0, 0);
        let report = prober
            .run(&target, Instant::now() + Duration::from_secs(5))
            .await;

        assert_eq!(report.state, ProbeState::Done);
        assert_eq!(prober.state(), ProbeState::Done);
        assert_eq!(report.scheduled, ModuleFamily::Sum.channels().len());

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "fenecon_info");
    }
}
