//! Channel catalogue
//!
//! Which device channels are queried for each module family, which gauge
//! each one feeds and under which publication policy. Cumulative `*Energy`
//! channels use [`Publication::SuppressNonPositive`]; everything else is
//! published plain.

use crate::metrics::Metric;
use crate::policy::Publication;

/// One catalogued channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Leaf channel name below the module (`EssSoc`, `VoltageL1`)
    pub leaf: &'static str,
    /// Target gauge
    pub metric: Metric,
    /// Phase label value for per-phase channels
    pub phase: Option<&'static str>,
    /// Publication policy
    pub policy: Publication,
}

const fn plain(leaf: &'static str, metric: Metric) -> ChannelSpec {
    ChannelSpec {
        leaf,
        metric,
        phase: None,
        policy: Publication::Plain,
    }
}

const fn phase(leaf: &'static str, metric: Metric, phase: &'static str) -> ChannelSpec {
    ChannelSpec {
        leaf,
        metric,
        phase: Some(phase),
        policy: Publication::Plain,
    }
}

const fn counter(leaf: &'static str, metric: Metric) -> ChannelSpec {
    ChannelSpec {
        leaf,
        metric,
        phase: None,
        policy: Publication::SuppressNonPositive,
    }
}

const SUM_CHANNELS: &[ChannelSpec] = &[
    plain("State", Metric::Status),
    // battery
    plain("EssSoc", Metric::BatteryCharge),
    plain("EssCapacity", Metric::BatteryCapacity),
    plain("EssActivePower", Metric::BatteryPower),
    phase("EssActivePowerL1", Metric::BatteryPowerPhase, "1"),
    phase("EssActivePowerL2", Metric::BatteryPowerPhase, "2"),
    phase("EssActivePowerL3", Metric::BatteryPowerPhase, "3"),
    counter("EssActiveChargeEnergy", Metric::BatteryPowerChargeTotal),
    counter("EssActiveDischargeEnergy", Metric::BatteryPowerDischargeTotal),
    counter("EssDcChargeEnergy", Metric::BatteryPowerDcChargeTotal),
    counter("EssDcDischargeEnergy", Metric::BatteryPowerDcDischargeTotal),
    // grid
    plain("GridMode", Metric::GridMode),
    plain("GridActivePower", Metric::GridPower),
    phase("GridActivePowerL1", Metric::GridPowerPhase, "1"),
    phase("GridActivePowerL2", Metric::GridPowerPhase, "2"),
    phase("GridActivePowerL3", Metric::GridPowerPhase, "3"),
    counter("GridBuyActiveEnergy", Metric::GridPowerBuyTotal),
    counter("GridSellActiveEnergy", Metric::GridPowerSellTotal),
    // production
    plain("ProductionActivePower", Metric::ProductionPower),
    plain("ProductionAcActivePower", Metric::ProductionPowerAc),
    plain("ProductionDcActualPower", Metric::ProductionPowerDc),
    phase("ProductionAcActivePowerL1", Metric::ProductionPowerPhase, "1"),
    phase("ProductionAcActivePowerL2", Metric::ProductionPowerPhase, "2"),
    phase("ProductionAcActivePowerL3", Metric::ProductionPowerPhase, "3"),
    counter("ProductionActiveEnergy", Metric::ProductionPowerTotal),
    counter("ProductionAcActiveEnergy", Metric::ProductionPowerAcTotal),
    counter("ProductionDcActiveEnergy", Metric::ProductionPowerDcTotal),
    // consumption
    plain("ConsumptionActivePower", Metric::ConsumptionPower),
    phase("ConsumptionActivePowerL1", Metric::ConsumptionPowerPhase, "1"),
    phase("ConsumptionActivePowerL2", Metric::ConsumptionPowerPhase, "2"),
    phase("ConsumptionActivePowerL3", Metric::ConsumptionPowerPhase, "3"),
    counter("ConsumptionActiveEnergy", Metric::ConsumptionPowerTotal),
];

const ESS_CHANNELS: &[ChannelSpec] = &[
    plain("State", Metric::EssState),
    plain("GridMode", Metric::EssGridMode),
    plain("Soc", Metric::EssCharge),
    plain("Capacity", Metric::EssCapacity),
    plain("ActivePower", Metric::EssPower),
    counter("ActiveChargeEnergy", Metric::EssPowerChargeTotal),
    counter("ActiveDischargeEnergy", Metric::EssPowerDischargeTotal),
    plain("AllowedChargePower", Metric::EssAllowedChargePower),
    plain("AllowedDischargePower", Metric::EssAllowedDischargePower),
];

const CHARGER_CHANNELS: &[ChannelSpec] = &[
    plain("State", Metric::ChargerState),
    plain("ActualPower", Metric::ChargerPower),
    counter("ActualEnergy", Metric::ChargerPowerTotal),
    plain("MaxActualPower", Metric::ChargerPowerMax),
];

const METER_CHANNELS: &[ChannelSpec] = &[
    plain("State", Metric::MeterState),
    plain("Frequency", Metric::MeterFrequency),
    plain("Voltage", Metric::MeterVoltage),
    phase("VoltageL1", Metric::MeterVoltage, "1"),
    phase("VoltageL2", Metric::MeterVoltage, "2"),
    phase("VoltageL3", Metric::MeterVoltage, "3"),
    plain("ActivePower", Metric::MeterPower),
    phase("ActivePowerL1", Metric::MeterPower, "1"),
    phase("ActivePowerL2", Metric::MeterPower, "2"),
    phase("ActivePowerL3", Metric::MeterPower, "3"),
    plain("ReactivePower", Metric::MeterReactivePower),
    phase("ReactivePowerL1", Metric::MeterReactivePower, "1"),
    phase("ReactivePowerL2", Metric::MeterReactivePower, "2"),
    phase("ReactivePowerL3", Metric::MeterReactivePower, "3"),
    plain("Current", Metric::MeterCurrent),
    phase("CurrentL1", Metric::MeterCurrent, "1"),
    phase("CurrentL2", Metric::MeterCurrent, "2"),
    phase("CurrentL3", Metric::MeterCurrent, "3"),
    plain("MinActivePower", Metric::MeterPowerMin),
    plain("MaxActivePower", Metric::MeterPowerMax),
    counter("ActiveProductionEnergy", Metric::MeterProductionTotal),
    counter("ActiveConsumptionEnergy", Metric::MeterConsumptionTotal),
];

/// Module families of the device channel tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFamily {
    /// `_sum` aggregate module, always present
    Sum,
    /// Energy storage systems (`ess0`, `ess1`, ...)
    Ess,
    /// DC chargers (`charger0`, ...)
    Charger,
    /// Meters (`meter0`, ...)
    Meter,
}

impl ModuleFamily {
    pub const ALL: [ModuleFamily; 4] = [
        ModuleFamily::Sum,
        ModuleFamily::Ess,
        ModuleFamily::Charger,
        ModuleFamily::Meter,
    ];

    /// Module name (`_sum`) or prefix of indexed module names (`meter`)
    pub fn prefix(&self) -> &'static str {
        match self {
            ModuleFamily::Sum => "_sum",
            ModuleFamily::Ess => "ess",
            ModuleFamily::Charger => "charger",
            ModuleFamily::Meter => "meter",
        }
    }

    /// Whether modules of this family are numbered
    pub fn is_indexed(&self) -> bool {
        !matches!(self, ModuleFamily::Sum)
    }

    /// Wildcard query covering every channel of the family
    pub fn wildcard_path(&self) -> String {
        if self.is_indexed() {
            format!("{}.*/.*", self.prefix())
        } else {
            format!("{}/.*", self.prefix())
        }
    }

    /// Name of the module with the given index (`meter1`)
    pub fn module_name(&self, index: u32) -> String {
        if self.is_indexed() {
            format!("{}{}", self.prefix(), index)
        } else {
            self.prefix().to_string()
        }
    }

    /// Index of a discovered module belonging to this family.
    ///
    /// `meter3` → `Some(3)`; `meterCluster`, `ess0` (for meters) → `None`.
    /// The `_sum` module has index 0.
    pub fn module_index(&self, module: &str) -> Option<u32> {
        if !self.is_indexed() {
            return module.eq_ignore_ascii_case(self.prefix()).then_some(0);
        }

        let prefix = self.prefix();
        if module.len() <= prefix.len() || !module.is_char_boundary(prefix.len()) {
            return None;
        }
        let (head, digits) = module.split_at(prefix.len());
        if !head.eq_ignore_ascii_case(prefix) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Channels queried for every module of the family
    pub fn channels(&self) -> &'static [ChannelSpec] {
        match self {
            ModuleFamily::Sum => SUM_CHANNELS,
            ModuleFamily::Ess => ESS_CHANNELS,
            ModuleFamily::Charger => CHARGER_CHANNELS,
            ModuleFamily::Meter => METER_CHANNELS,
        }
    }
}
