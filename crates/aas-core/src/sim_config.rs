//! Simulation configuration: billing rates, kinematics and coordinates.
//!
//! Wire names keep their unit suffixes (`emissionFactor_g_per_kWh`,
//! `costPerMeter_EUR`, ...) so a configuration can be read back from
//! `GET /api/v1/config` and PATCHed unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named location of the AGV's home position.
pub const HOME: &str = "HOME";
/// Named location where the AGV docks at the engraver.
pub const ENGRAVER_DOCK: &str = "ENGRAVER_DOCK";
/// First job site.
pub const JOB_POS1: &str = "JOB_POS1";
/// Second job site.
pub const JOB_POS2: &str = "JOB_POS2";

/// Site name to `(x, y)` in meters.
pub type Coords = BTreeMap<String, (f64, f64)>;

/// Default coordinate system.
pub fn default_coords() -> Coords {
    let mut coords = Coords::new();
    coords.insert(HOME.to_string(), (0.0, 0.0));
    coords.insert(ENGRAVER_DOCK.to_string(), (5.0, 0.0));
    coords.insert(JOB_POS1.to_string(), (12.0, 8.0));
    coords.insert(JOB_POS2.to_string(), (15.0, -6.0));
    coords
}

/// Engraver energy and pricing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngraverConfig {
    #[serde(rename = "emissionFactor_g_per_kWh")]
    pub emission_factor_g_per_kwh: f64,
    #[serde(rename = "costPerEnergyUnit_EUR_per_kWh")]
    pub cost_per_energy_unit_eur_per_kwh: f64,
    /// Fixed energy per job, independent of runtime.
    #[serde(rename = "baseIdle_kWh")]
    pub base_idle_kwh: f64,
    /// Laser energy per second at power factor 1.0.
    #[serde(rename = "k_laser_kWh_per_sec_at_power1")]
    pub k_laser_kwh_per_sec_at_power1: f64,
    #[serde(rename = "default_powerPreset")]
    pub default_power_preset: String,
    pub seconds_per_letter: f64,
}

impl Default for EngraverConfig {
    fn default() -> Self {
        Self {
            emission_factor_g_per_kwh: 360.0,
            cost_per_energy_unit_eur_per_kwh: 0.40,
            base_idle_kwh: 0.02,
            k_laser_kwh_per_sec_at_power1: 0.002,
            default_power_preset: "Standard".to_string(),
            seconds_per_letter: 0.5,
        }
    }
}

/// AGV pricing and speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgvConfig {
    #[serde(rename = "costPerMeter_EUR")]
    pub cost_per_meter_eur: f64,
    pub speed_m_per_s: f64,
}

impl Default for AgvConfig {
    fn default() -> Self {
        Self {
            cost_per_meter_eur: 0.02,
            speed_m_per_s: 0.5,
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub engraver: EngraverConfig,
    #[serde(default)]
    pub agv: AgvConfig,
    /// Engraver progress increment per tick, in percent.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: f64,
}

pub(crate) fn default_currency() -> String {
    "EUR".to_string()
}

fn default_progress_step() -> u32 {
    5
}

fn default_poll_interval_s() -> f64 {
    0.05
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            engraver: EngraverConfig::default(),
            agv: AgvConfig::default(),
            progress_step: default_progress_step(),
            poll_interval_s: default_poll_interval_s(),
        }
    }
}

/// Partial engraver update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngraverConfigUpdate {
    #[serde(rename = "emissionFactor_g_per_kWh", default)]
    pub emission_factor_g_per_kwh: Option<f64>,
    #[serde(rename = "costPerEnergyUnit_EUR_per_kWh", default)]
    pub cost_per_energy_unit_eur_per_kwh: Option<f64>,
    #[serde(rename = "baseIdle_kWh", default)]
    pub base_idle_kwh: Option<f64>,
    #[serde(rename = "k_laser_kWh_per_sec_at_power1", default)]
    pub k_laser_kwh_per_sec_at_power1: Option<f64>,
    #[serde(rename = "default_powerPreset", default)]
    pub default_power_preset: Option<String>,
    #[serde(default)]
    pub seconds_per_letter: Option<f64>,
}

/// Partial AGV update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgvConfigUpdate {
    #[serde(rename = "costPerMeter_EUR", default)]
    pub cost_per_meter_eur: Option<f64>,
    #[serde(default)]
    pub speed_m_per_s: Option<f64>,
}

/// Body of `PATCH /api/v1/config`. Absent or null keys are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engraver: Option<EngraverConfigUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agv: Option<AgvConfigUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_s: Option<f64>,
}

impl ConfigUpdate {
    /// Update that restores every field of `config`.
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            currency: Some(config.currency.clone()),
            engraver: Some(EngraverConfigUpdate {
                emission_factor_g_per_kwh: Some(config.engraver.emission_factor_g_per_kwh),
                cost_per_energy_unit_eur_per_kwh: Some(
                    config.engraver.cost_per_energy_unit_eur_per_kwh,
                ),
                base_idle_kwh: Some(config.engraver.base_idle_kwh),
                k_laser_kwh_per_sec_at_power1: Some(config.engraver.k_laser_kwh_per_sec_at_power1),
                default_power_preset: Some(config.engraver.default_power_preset.clone()),
                seconds_per_letter: Some(config.engraver.seconds_per_letter),
            }),
            agv: Some(AgvConfigUpdate {
                cost_per_meter_eur: Some(config.agv.cost_per_meter_eur),
                speed_m_per_s: Some(config.agv.speed_m_per_s),
            }),
            progress_step: Some(config.progress_step),
            poll_interval_s: Some(config.poll_interval_s),
        }
    }
}

impl SimConfig {
    /// Apply a partial update in place. Empty currency strings are ignored.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(currency) = update.currency.as_ref().filter(|c| !c.is_empty()) {
            self.currency = currency.clone();
        }

        if let Some(eng) = &update.engraver {
            let cfg = &mut self.engraver;
            if let Some(v) = eng.emission_factor_g_per_kwh {
                cfg.emission_factor_g_per_kwh = v;
            }
            if let Some(v) = eng.cost_per_energy_unit_eur_per_kwh {
                cfg.cost_per_energy_unit_eur_per_kwh = v;
            }
            if let Some(v) = eng.base_idle_kwh {
                cfg.base_idle_kwh = v;
            }
            if let Some(v) = eng.k_laser_kwh_per_sec_at_power1 {
                cfg.k_laser_kwh_per_sec_at_power1 = v;
            }
            if let Some(v) = &eng.default_power_preset {
                cfg.default_power_preset = v.clone();
            }
            if let Some(v) = eng.seconds_per_letter {
                cfg.seconds_per_letter = v;
            }
        }

        if let Some(agv) = &update.agv {
            if let Some(v) = agv.cost_per_meter_eur {
                self.agv.cost_per_meter_eur = v;
            }
            if let Some(v) = agv.speed_m_per_s {
                self.agv.speed_m_per_s = v;
            }
        }

        if let Some(step) = update.progress_step {
            self.progress_step = step;
        }
        if let Some(interval) = update.poll_interval_s {
            self.poll_interval_s = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_wire_names() {
        let json = serde_json::to_value(SimConfig::default()).unwrap();
        assert_eq!(json["engraver"]["emissionFactor_g_per_kWh"], 360.0);
        assert_eq!(json["engraver"]["k_laser_kWh_per_sec_at_power1"], 0.002);
        assert_eq!(json["agv"]["costPerMeter_EUR"], 0.02);
        assert_eq!(json["progress_step"], 5);
    }

    #[test]
    fn test_partial_update_only_touches_present_keys() {
        let mut config = SimConfig::default();
        let update: ConfigUpdate = serde_json::from_str(
            r#"{"agv": {"costPerMeter_EUR": 0.05}, "engraver": {"seconds_per_letter": null}}"#,
        )
        .unwrap();

        config.apply(&update);

        assert_eq!(config.agv.cost_per_meter_eur, 0.05);
        assert_eq!(config.agv.speed_m_per_s, 0.5);
        assert_eq!(config.engraver.seconds_per_letter, 0.5);
        assert_eq!(config.currency, "EUR");
    }

    #[test]
    fn test_from_config_restores_everything() {
        let defaults = SimConfig::default();
        let mut config = SimConfig::default();
        config.progress_step = 50;
        config.engraver.base_idle_kwh = 1.0;
        config.currency = "USD".to_string();

        config.apply(&ConfigUpdate::from_config(&defaults));
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_default_coords_serialize_as_pairs() {
        let json = serde_json::to_value(default_coords()).unwrap();
        assert_eq!(json["JOB_POS1"], serde_json::json!([12.0, 8.0]));
        assert_eq!(json["JOB_POS2"], serde_json::json!([15.0, -6.0]));
    }
}
