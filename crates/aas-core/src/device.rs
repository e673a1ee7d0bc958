//! Asset Administration Shell submodels for the simulated devices.
//!
//! Field names follow the AAS submodel naming (`operationalData`,
//! `usageBilling`, ...) exactly; they are the wire contract consumed by the
//! dashboard and must not be renamed.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::sim_config::{default_currency, SimConfig};
use crate::time::now_iso;

/// Device id of the single simulated engraver.
pub const ENGRAVER_ID: &str = "engraver-001";
/// Device id of the single simulated AGV.
pub const AGV_ID: &str = "agv-001";

/// Device operation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationMode {
    #[default]
    Idle,
    Running,
    Error,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Kind of order a device is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    LaserEngraving,
    Transport,
}

/// Order lifecycle: Created -> InProcess -> Done | Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderState {
    #[default]
    Created,
    InProcess,
    Done,
    Error,
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::InProcess => write!(f, "InProcess"),
            Self::Done => write!(f, "Done"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Billing status of a usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BillingStatus {
    #[default]
    Open,
    Billed,
    Waived,
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Billed => write!(f, "Billed"),
            Self::Waived => write!(f, "Waived"),
        }
    }
}

/// Status submodel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusModel {
    /// Progress 0-100%.
    pub production_progress: u8,
    pub operation_mode: OperationMode,
    pub heartbeat_counter: u64,
    /// ISO8601 timestamp.
    pub heartbeat_timestamp: String,
}

/// Order submodel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderModel {
    pub order_no: String,
    pub order_type: OrderType,
    pub laser_text: Option<String>,
    pub transport_required: bool,
    pub order_state: OrderState,
    /// ISO8601 timestamp.
    pub last_change_at: String,
}

/// Pose submodel (meaningful for the AGV only).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoseModel {
    pub pos_x: f64,
    pub pos_y: f64,
    pub orientation: f64,
}

impl PoseModel {
    pub fn xy(&self) -> (f64, f64) {
        (self.pos_x, self.pos_y)
    }
}

/// Operational data submodel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationalData {
    pub status: StatusModel,
    pub order: OrderModel,
    pub pose: PoseModel,
}

impl OperationalData {
    fn new(order_type: OrderType, transport_required: bool) -> Self {
        Self {
            status: StatusModel {
                production_progress: 0,
                operation_mode: OperationMode::Idle,
                heartbeat_counter: 0,
                heartbeat_timestamp: now_iso(),
            },
            order: OrderModel {
                order_no: String::new(),
                order_type,
                laser_text: None,
                transport_required,
                order_state: OrderState::Created,
                last_change_at: now_iso(),
            },
            pose: PoseModel::default(),
        }
    }

    /// Increment heartbeat counter and refresh its timestamp.
    pub fn bump_heartbeat(&mut self) {
        self.status.heartbeat_counter += 1;
        self.status.heartbeat_timestamp = now_iso();
    }

    /// Set production progress, rounded and clamped to 0..=100.
    pub fn set_progress(&mut self, pct: f64) {
        self.status.production_progress = pct.round().clamp(0.0, 100.0) as u8;
    }
}

/// Usage billing submodel of the engraver (energy based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngraverBilling {
    pub currency: String,
    pub billing_status: BillingStatus,
    pub order_ref: Option<String>,
    pub last_billed_at: Option<String>,
    pub last_updated: String,
    /// kWh.
    pub energy_consumed: f64,
    /// gCO2e/kWh.
    pub emission_factor: f64,
    /// g.
    pub carbon_emissions: f64,
    /// EUR/kWh.
    pub cost_per_energy_unit: f64,
    /// EUR.
    pub usage_cost: f64,
}

impl Default for EngraverBilling {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            billing_status: BillingStatus::Open,
            order_ref: None,
            last_billed_at: None,
            last_updated: String::new(),
            energy_consumed: 0.0,
            emission_factor: 0.0,
            carbon_emissions: 0.0,
            cost_per_energy_unit: 0.0,
            usage_cost: 0.0,
        }
    }
}

impl EngraverBilling {
    /// Zero the accumulated usage, keeping rates and references.
    pub fn clear_usage(&mut self) {
        self.energy_consumed = 0.0;
        self.carbon_emissions = 0.0;
        self.usage_cost = 0.0;
    }
}

/// Usage billing submodel of the AGV (distance based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgvBilling {
    pub currency: String,
    pub billing_status: BillingStatus,
    pub order_ref: Option<String>,
    pub last_billed_at: Option<String>,
    pub last_updated: String,
    /// Meters, billed legs only.
    pub distance_traveled: f64,
    /// EUR/m.
    pub cost_per_meter: f64,
    /// EUR.
    pub usage_cost: f64,
}

impl Default for AgvBilling {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            billing_status: BillingStatus::Open,
            order_ref: None,
            last_billed_at: None,
            last_updated: String::new(),
            distance_traveled: 0.0,
            cost_per_meter: 0.0,
            usage_cost: 0.0,
        }
    }
}

impl AgvBilling {
    /// Zero the accumulated usage, keeping rates and references.
    pub fn clear_usage(&mut self) {
        self.distance_traveled = 0.0;
        self.usage_cost = 0.0;
    }
}

/// Laser engraver device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngraverDevice {
    pub device_id: String,
    /// Always `"Engraver"`.
    pub device_type: String,
    pub operational_data: OperationalData,
    pub usage_billing: EngraverBilling,
}

impl EngraverDevice {
    /// Create an idle engraver with billing rates taken from `config`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            device_id: ENGRAVER_ID.to_string(),
            device_type: "Engraver".to_string(),
            operational_data: OperationalData::new(OrderType::LaserEngraving, false),
            usage_billing: EngraverBilling {
                currency: config.currency.clone(),
                billing_status: BillingStatus::Open,
                order_ref: None,
                last_billed_at: None,
                last_updated: now_iso(),
                energy_consumed: 0.0,
                emission_factor: config.engraver.emission_factor_g_per_kwh,
                carbon_emissions: 0.0,
                cost_per_energy_unit: config.engraver.cost_per_energy_unit_eur_per_kwh,
                usage_cost: 0.0,
            },
        }
    }

    pub fn status(&self) -> &StatusModel {
        &self.operational_data.status
    }
}

/// Automated guided vehicle device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgvDevice {
    pub device_id: String,
    /// Always `"AGV"`.
    pub device_type: String,
    pub operational_data: OperationalData,
    pub usage_billing: AgvBilling,
}

impl AgvDevice {
    /// Create an idle AGV parked at the origin.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            device_id: AGV_ID.to_string(),
            device_type: "AGV".to_string(),
            operational_data: OperationalData::new(OrderType::Transport, true),
            usage_billing: AgvBilling {
                currency: config.currency.clone(),
                billing_status: BillingStatus::Open,
                order_ref: None,
                last_billed_at: None,
                last_updated: now_iso(),
                distance_traveled: 0.0,
                cost_per_meter: config.agv.cost_per_meter_eur,
                usage_cost: 0.0,
            },
        }
    }

    pub fn status(&self) -> &StatusModel {
        &self.operational_data.status
    }

    pub fn pose(&self) -> &PoseModel {
        &self.operational_data.pose
    }
}

/// Either simulated device, serialized as the device itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Device {
    Engraver(EngraverDevice),
    Agv(AgvDevice),
}

impl Device {
    pub fn operational_data(&self) -> &OperationalData {
        match self {
            Self::Engraver(d) => &d.operational_data,
            Self::Agv(d) => &d.operational_data,
        }
    }

    pub fn billing(&self) -> DeviceBilling {
        match self {
            Self::Engraver(d) => DeviceBilling::Engraver(d.usage_billing.clone()),
            Self::Agv(d) => DeviceBilling::Agv(d.usage_billing.clone()),
        }
    }
}

/// Usage billing submodel of either device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceBilling {
    Engraver(EngraverBilling),
    Agv(AgvBilling),
}

impl DeviceBilling {
    pub fn usage_cost(&self) -> f64 {
        match self {
            Self::Engraver(b) => b.usage_cost,
            Self::Agv(b) => b.usage_cost,
        }
    }

    pub fn order_ref(&self) -> Option<&str> {
        match self {
            Self::Engraver(b) => b.order_ref.as_deref(),
            Self::Agv(b) => b.order_ref.as_deref(),
        }
    }
}

// The submodels tolerate missing fields, so an untagged derive would accept
// any object as the first variant. Pick the variant from the payload instead.
impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let is_agv = value.get("deviceType").and_then(|v| v.as_str()) == Some("AGV");
        let device = if is_agv {
            serde_json::from_value(value).map(Self::Agv)
        } else {
            serde_json::from_value(value).map(Self::Engraver)
        };
        device.map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for DeviceBilling {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let is_agv = value.get("distanceTraveled").is_some() || value.get("costPerMeter").is_some();
        let billing = if is_agv {
            serde_json::from_value(value).map(Self::Agv)
        } else {
            serde_json::from_value(value).map(Self::Engraver)
        };
        billing.map_err(de::Error::custom)
    }
}

/// Device selector used in `/aas/{device}/...` paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Engraver,
    Agv,
}

impl DeviceKind {
    /// Short path name (`engraver` / `agv`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engraver => "engraver",
            Self::Agv => "agv",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = CoreError;

    /// Accepts the short name or the full device id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "engraver" | ENGRAVER_ID => Ok(Self::Engraver),
            "agv" | AGV_ID => Ok(Self::Agv),
            other => Err(CoreError::UnknownDevice(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engraver_wire_names() {
        let device = EngraverDevice::new(&SimConfig::default());
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["deviceType"], "Engraver");
        assert_eq!(json["operationalData"]["status"]["operationMode"], "Idle");
        assert_eq!(json["operationalData"]["order"]["orderType"], "LaserEngraving");
        assert_eq!(json["operationalData"]["pose"]["posX"], 0.0);
        assert_eq!(json["usageBilling"]["emissionFactor"], 360.0);
        assert_eq!(json["usageBilling"]["billingStatus"], "Open");
        assert!(json["usageBilling"]["orderRef"].is_null());
    }

    #[test]
    fn test_agv_defaults() {
        let device = AgvDevice::new(&SimConfig::default());
        assert_eq!(device.device_type, "AGV");
        assert!(device.operational_data.order.transport_required);
        assert_eq!(device.usage_billing.cost_per_meter, 0.02);
    }

    #[test]
    fn test_set_progress_clamps_and_rounds() {
        let mut od = OperationalData::new(OrderType::Transport, true);
        od.set_progress(104.0);
        assert_eq!(od.status.production_progress, 100);
        od.set_progress(-3.0);
        assert_eq!(od.status.production_progress, 0);
        od.set_progress(42.6);
        assert_eq!(od.status.production_progress, 43);
    }

    #[test]
    fn test_bump_heartbeat() {
        let mut od = OperationalData::new(OrderType::Transport, true);
        od.bump_heartbeat();
        od.bump_heartbeat();
        assert_eq!(od.status.heartbeat_counter, 2);
    }

    #[test]
    fn test_device_kind_parse() {
        assert_eq!("agv".parse::<DeviceKind>().unwrap(), DeviceKind::Agv);
        assert_eq!(
            "engraver-001".parse::<DeviceKind>().unwrap(),
            DeviceKind::Engraver
        );
        assert!("laser".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn test_partial_status_falls_back_to_defaults() {
        let status: StatusModel = serde_json::from_value(serde_json::json!({
            "productionProgress": 10,
            "operationMode": "Running"
        }))
        .unwrap();
        assert_eq!(status.production_progress, 10);
        assert_eq!(status.operation_mode, OperationMode::Running);
        assert_eq!(status.heartbeat_counter, 0);
        assert!(status.heartbeat_timestamp.is_empty());

        let billing: AgvBilling =
            serde_json::from_value(serde_json::json!({ "distanceTraveled": 3.5 })).unwrap();
        assert_eq!(billing.distance_traveled, 3.5);
        assert_eq!(billing.usage_cost, 0.0);
        assert_eq!(billing.currency, "EUR");
    }

    #[test]
    fn test_partial_device_keeps_its_kind() {
        let agv: Device = serde_json::from_value(serde_json::json!({
            "deviceId": "agv-001",
            "deviceType": "AGV"
        }))
        .unwrap();
        assert!(matches!(agv, Device::Agv(_)));

        let billing: DeviceBilling =
            serde_json::from_value(serde_json::json!({ "costPerMeter": 0.02 })).unwrap();
        assert!(matches!(billing, DeviceBilling::Agv(_)));
    }

    #[test]
    fn test_untagged_billing_picks_matching_variant() {
        let config = SimConfig::default();
        let agv = Device::Agv(AgvDevice::new(&config)).billing();
        let json = serde_json::to_string(&agv).unwrap();
        assert!(matches!(
            serde_json::from_str::<DeviceBilling>(&json).unwrap(),
            DeviceBilling::Agv(_)
        ));

        let engraver = Device::Engraver(EngraverDevice::new(&config)).billing();
        let json = serde_json::to_string(&engraver).unwrap();
        assert!(matches!(
            serde_json::from_str::<DeviceBilling>(&json).unwrap(),
            DeviceBilling::Engraver(_)
        ));
    }
}
