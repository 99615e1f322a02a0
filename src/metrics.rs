//! Prometheus gauges published by a probe.
//!
//! Every probe registers a fresh [`ProbeMetrics`] into its own
//! [`Registry`], so concurrent probes never share label sets. Gauge vectors
//! synchronize internally; callbacks running in parallel write into them
//! without an extra lock.

use std::collections::HashMap;

use prometheus::{GaugeVec, Opts, Registry};

use crate::error::Result;

/// Label keys carried by a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelShape {
    /// `{target}`
    Target,
    /// `{target, module}`
    Module,
    /// `{target, module, phase}`
    Phase,
}

impl LabelShape {
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            LabelShape::Target => &["target"],
            LabelShape::Module => &["target", "module"],
            LabelShape::Phase => &["target", "module", "phase"],
        }
    }
}

/// Label values joining a channel value to a time series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    pub target: String,
    pub module: Option<String>,
    pub phase: Option<String>,
}

impl LabelSet {
    /// Base label set of a target
    pub fn target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            module: None,
            phase: None,
        }
    }

    /// Same target, qualified by module
    pub fn with_module(&self, module: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            ..self.clone()
        }
    }

    /// Same target and module, qualified by phase
    pub fn with_phase(&self, phase: Option<&str>) -> Self {
        Self {
            phase: phase.map(str::to_string),
            ..self.clone()
        }
    }

    /// Values in the key order of `shape`. Keys without a value are
    /// published as an empty string so every series of a metric carries the
    /// same keys.
    pub fn values(&self, shape: LabelShape) -> Vec<&str> {
        let target = self.target.as_str();
        let module = self.module.as_deref().unwrap_or("");
        let phase = self.phase.as_deref().unwrap_or("");
        match shape {
            LabelShape::Target => vec![target],
            LabelShape::Module => vec![target, module],
            LabelShape::Phase => vec![target, module, phase],
        }
    }
}

/// Name, help and label shape of a metric
#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub shape: LabelShape,
}

/// Every gauge a probe can publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Info,
    Status,

    BatteryCharge,
    BatteryCapacity,
    BatteryPower,
    BatteryPowerPhase,
    BatteryPowerChargeTotal,
    BatteryPowerDischargeTotal,
    BatteryPowerDcChargeTotal,
    BatteryPowerDcDischargeTotal,

    GridMode,
    GridPower,
    GridPowerPhase,
    GridPowerBuyTotal,
    GridPowerSellTotal,

    ProductionPower,
    ProductionPowerPhase,
    ProductionPowerAc,
    ProductionPowerDc,
    ProductionPowerTotal,
    ProductionPowerAcTotal,
    ProductionPowerDcTotal,

    ConsumptionPower,
    ConsumptionPowerPhase,
    ConsumptionPowerTotal,

    EssState,
    EssGridMode,
    EssCharge,
    EssCapacity,
    EssPower,
    EssPowerChargeTotal,
    EssPowerDischargeTotal,
    EssAllowedChargePower,
    EssAllowedDischargePower,

    ChargerState,
    ChargerPower,
    ChargerPowerTotal,
    ChargerPowerMax,

    MeterState,
    MeterFrequency,
    MeterVoltage,
    MeterPower,
    MeterReactivePower,
    MeterCurrent,
    MeterPowerMin,
    MeterPowerMax,
    MeterProductionTotal,
    MeterConsumptionTotal,
}

impl Metric {
    pub const ALL: &'static [Metric] = &[
        Metric::Info,
        Metric::Status,
        Metric::BatteryCharge,
        Metric::BatteryCapacity,
        Metric::BatteryPower,
        Metric::BatteryPowerPhase,
        Metric::BatteryPowerChargeTotal,
        Metric::BatteryPowerDischargeTotal,
        Metric::BatteryPowerDcChargeTotal,
        Metric::BatteryPowerDcDischargeTotal,
        Metric::GridMode,
        Metric::GridPower,
        Metric::GridPowerPhase,
        Metric::GridPowerBuyTotal,
        Metric::GridPowerSellTotal,
        Metric::ProductionPower,
        Metric::ProductionPowerPhase,
        Metric::ProductionPowerAc,
        Metric::ProductionPowerDc,
        Metric::ProductionPowerTotal,
        Metric::ProductionPowerAcTotal,
        Metric::ProductionPowerDcTotal,
        Metric::ConsumptionPower,
        Metric::ConsumptionPowerPhase,
        Metric::ConsumptionPowerTotal,
        Metric::EssState,
        Metric::EssGridMode,
        Metric::EssCharge,
        Metric::EssCapacity,
        Metric::EssPower,
        Metric::EssPowerChargeTotal,
        Metric::EssPowerDischargeTotal,
        Metric::EssAllowedChargePower,
        Metric::EssAllowedDischargePower,
        Metric::ChargerState,
        Metric::ChargerPower,
        Metric::ChargerPowerTotal,
        Metric::ChargerPowerMax,
        Metric::MeterState,
        Metric::MeterFrequency,
        Metric::MeterVoltage,
        Metric::MeterPower,
        Metric::MeterReactivePower,
        Metric::MeterCurrent,
        Metric::MeterPowerMin,
        Metric::MeterPowerMax,
        Metric::MeterProductionTotal,
        Metric::MeterConsumptionTotal,
    ];

    pub fn def(&self) -> MetricDef {
        use LabelShape::{Module, Phase, Target};

        let (name, help, shape) = match self {
            // ============================================================
            // General
            // ============================================================
            Metric::Info => ("fenecon_info", "Fenecon info", Target),
            Metric::Status => (
                "fenecon_status",
                "Fenecon status (0=ok, 1=info, 2=warning, 3=error; State)",
                Module,
            ),

            // ============================================================
            // Battery (_sum)
            // ============================================================
            Metric::BatteryCharge => (
                "fenecon_battery_charge_percent",
                "Fenecon battery charge in percent (EssSoc)",
                Module,
            ),
            Metric::BatteryCapacity => (
                "fenecon_battery_capacity",
                "Fenecon battery capacity in Watthours (EssCapacity)",
                Module,
            ),
            Metric::BatteryPower => (
                "fenecon_battery_power",
                "Fenecon battery power load in Watts (EssActivePower)",
                Module,
            ),
            Metric::BatteryPowerPhase => (
                "fenecon_battery_power_phase",
                "Fenecon battery power load in Watts (EssActivePowerLx)",
                Phase,
            ),
            Metric::BatteryPowerChargeTotal => (
                "fenecon_battery_power_charge_total",
                "Fenecon battery power charge in Watthours (EssActiveChargeEnergy)",
                Module,
            ),
            Metric::BatteryPowerDischargeTotal => (
                "fenecon_battery_power_discharge_total",
                "Fenecon battery power discharge in Watthours (EssActiveDischargeEnergy)",
                Module,
            ),
            Metric::BatteryPowerDcChargeTotal => (
                "fenecon_battery_power_dc_charge_total",
                "Fenecon battery power dc charge in Watthours (EssDcChargeEnergy)",
                Module,
            ),
            Metric::BatteryPowerDcDischargeTotal => (
                "fenecon_battery_power_dc_discharge_total",
                "Fenecon battery power dc discharge in Watthours (EssDcDischargeEnergy)",
                Module,
            ),

            // ============================================================
            // Grid (_sum)
            // ============================================================
            Metric::GridMode => (
                "fenecon_grid_mode",
                "Fenecon grid mode (0=undefined, 1=On-Grid, 2=Off-Grid; GridMode)",
                Module,
            ),
            Metric::GridPower => (
                "fenecon_grid_power",
                "Fenecon grid power load in Watts (GridActivePower)",
                Module,
            ),
            Metric::GridPowerPhase => (
                "fenecon_grid_power_phase",
                "Fenecon grid power load in Watts (GridActivePowerLx)",
                Phase,
            ),
            Metric::GridPowerBuyTotal => (
                "fenecon_grid_power_buy_total",
                "Fenecon grid power buy in Watthours (GridBuyActiveEnergy)",
                Module,
            ),
            Metric::GridPowerSellTotal => (
                "fenecon_grid_power_sell_total",
                "Fenecon grid power sell in Watthours (GridSellActiveEnergy)",
                Module,
            ),

            // ============================================================
            // Production (_sum)
            // ============================================================
            Metric::ProductionPower => (
                "fenecon_production_power",
                "Fenecon production power load in Watts (ProductionActivePower)",
                Module,
            ),
            Metric::ProductionPowerPhase => (
                "fenecon_production_power_phase",
                "Fenecon production power load in Watts (ProductionAcActivePowerLx)",
                Phase,
            ),
            Metric::ProductionPowerAc => (
                "fenecon_production_power_ac",
                "Fenecon production power load in Watts (ProductionAcActivePower)",
                Module,
            ),
            Metric::ProductionPowerDc => (
                "fenecon_production_power_dc",
                "Fenecon production power load in Watts (ProductionDcActualPower)",
                Module,
            ),
            Metric::ProductionPowerTotal => (
                "fenecon_production_power_total",
                "Fenecon production in Watthours (ProductionActiveEnergy)",
                Module,
            ),
            Metric::ProductionPowerAcTotal => (
                "fenecon_production_power_ac_total",
                "Fenecon production in Watthours (ProductionAcActiveEnergy)",
                Module,
            ),
            Metric::ProductionPowerDcTotal => (
                "fenecon_production_power_dc_total",
                "Fenecon production in Watthours (ProductionDcActiveEnergy)",
                Module,
            ),

            // ============================================================
            // Consumption (_sum)
            // ============================================================
            Metric::ConsumptionPower => (
                "fenecon_consumption_power",
                "Fenecon consumption power load in Watts (ConsumptionActivePower)",
                Module,
            ),
            Metric::ConsumptionPowerPhase => (
                "fenecon_consumption_power_phase",
                "Fenecon consumption power load in Watts (ConsumptionActivePowerLx)",
                Phase,
            ),
            Metric::ConsumptionPowerTotal => (
                "fenecon_consumption_power_total",
                "Fenecon consumption in Watthours (ConsumptionActiveEnergy)",
                Module,
            ),

            // ============================================================
            // ESS modules (essN)
            // ============================================================
            Metric::EssState => (
                "fenecon_ess_status",
                "Fenecon ess status (0=ok, 1=info, 2=warning, 3=error; State)",
                Module,
            ),
            Metric::EssGridMode => (
                "fenecon_ess_grid_mode",
                "Fenecon ess grid mode (0=undefined, 1=On-Grid, 2=Off-Grid; GridMode)",
                Module,
            ),
            Metric::EssCharge => (
                "fenecon_ess_charge_percent",
                "Fenecon ess charge in percent (Soc)",
                Module,
            ),
            Metric::EssCapacity => (
                "fenecon_ess_capacity",
                "Fenecon ess capacity in Watthours (Capacity)",
                Module,
            ),
            Metric::EssPower => (
                "fenecon_ess_power",
                "Fenecon ess power load in Watts (ActivePower)",
                Module,
            ),
            Metric::EssPowerChargeTotal => (
                "fenecon_ess_power_charge_total",
                "Fenecon ess power charge in Watthours (ActiveChargeEnergy)",
                Module,
            ),
            Metric::EssPowerDischargeTotal => (
                "fenecon_ess_power_discharge_total",
                "Fenecon ess power discharge in Watthours (ActiveDischargeEnergy)",
                Module,
            ),
            Metric::EssAllowedChargePower => (
                "fenecon_ess_power_allowed_charge",
                "Fenecon ess allowed charge power in Watts (AllowedChargePower)",
                Module,
            ),
            Metric::EssAllowedDischargePower => (
                "fenecon_ess_power_allowed_discharge",
                "Fenecon ess allowed discharge power in Watts (AllowedDischargePower)",
                Module,
            ),

            // ============================================================
            // Charger modules (chargerN)
            // ============================================================
            Metric::ChargerState => (
                "fenecon_charger_status",
                "Fenecon charger status (0=ok, 1=info, 2=warning, 3=error; State)",
                Module,
            ),
            Metric::ChargerPower => (
                "fenecon_charger_power",
                "Fenecon charger power in Watts (ActualPower)",
                Module,
            ),
            Metric::ChargerPowerTotal => (
                "fenecon_charger_power_total",
                "Fenecon charger energy in Watthours (ActualEnergy)",
                Module,
            ),
            Metric::ChargerPowerMax => (
                "fenecon_charger_power_max",
                "Fenecon charger maximum power in Watts (MaxActualPower)",
                Module,
            ),

            // ============================================================
            // Meter modules (meterN)
            // ============================================================
            Metric::MeterState => (
                "fenecon_meter_status",
                "Fenecon meter status (0=ok, 1=info, 2=warning, 3=error; State)",
                Module,
            ),
            Metric::MeterFrequency => (
                "fenecon_meter_frequency",
                "Fenecon meter frequency in milliHertz (Frequency)",
                Module,
            ),
            Metric::MeterVoltage => (
                "fenecon_meter_voltage",
                "Fenecon meter voltage in milliVolts (Voltage, VoltageLx)",
                Phase,
            ),
            Metric::MeterPower => (
                "fenecon_meter_power",
                "Fenecon meter active power in Watts (ActivePower, ActivePowerLx)",
                Phase,
            ),
            Metric::MeterReactivePower => (
                "fenecon_meter_power_reactive",
                "Fenecon meter reactive power in var (ReactivePower, ReactivePowerLx)",
                Phase,
            ),
            Metric::MeterCurrent => (
                "fenecon_meter_current",
                "Fenecon meter current in milliAmpere (Current, CurrentLx)",
                Phase,
            ),
            Metric::MeterPowerMin => (
                "fenecon_meter_power_min",
                "Fenecon meter minimum active power in Watts (MinActivePower)",
                Module,
            ),
            Metric::MeterPowerMax => (
                "fenecon_meter_power_max",
                "Fenecon meter maximum active power in Watts (MaxActivePower)",
                Module,
            ),
            Metric::MeterProductionTotal => (
                "fenecon_meter_production_total",
                "Fenecon meter production in Watthours (ActiveProductionEnergy)",
                Module,
            ),
            Metric::MeterConsumptionTotal => (
                "fenecon_meter_consumption_total",
                "Fenecon meter consumption in Watthours (ActiveConsumptionEnergy)",
                Module,
            ),
        };

        MetricDef { name, help, shape }
    }
}

/// Gauges of one probe, registered into a caller-owned registry
pub struct ProbeMetrics {
    gauges: HashMap<Metric, (GaugeVec, LabelShape)>,
}

impl ProbeMetrics {
    /// Register every probe gauge into `registry`
    pub fn register(registry: &Registry) -> Result<Self> {
        let mut gauges = HashMap::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            let def = metric.def();
            let gauge = GaugeVec::new(Opts::new(def.name, def.help), def.shape.keys())?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.insert(*metric, (gauge, def.shape));
        }
        Ok(Self { gauges })
    }

    /// Set a gauge for the given labels
    pub fn set(&self, metric: Metric, labels: &LabelSet, value: f64) {
        if let Some((gauge, shape)) = self.gauges.get(&metric) {
            gauge.with_label_values(&labels.values(*shape)).set(value);
        }
    }
}
