//! The declarative appliance configuration, as published per appliance model.
//!
//! Only `program` and `subPrograms` are mandatory. Every other capability group may be missing
//! for simpler appliances, and fields this model does not know about are ignored so that newer
//! configurations keep parsing.

use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the appliance configuration at {1:?}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("appliance configuration is not valid")]
    Json(#[source] serde_json::Error),
}

const fn visible() -> u8 {
    1
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceConfiguration {
    pub program: Program,
    pub sub_programs: Vec<Feature>,
    pub custom_sub_programs: Option<Vec<Feature>>,
    pub commands: Option<Vec<Feature>>,
    pub monitorings: Option<Vec<Feature>>,
    pub settings: Option<Vec<Feature>>,
    pub progress_variables: Option<Progress>,
    pub device_states: Option<DeviceStates>,
    pub device_sub_states: Option<DeviceSubStates>,
    pub remote_control: Option<RemoteControl>,
    pub device_warnings: Option<Warnings>,
    pub device_warnings_extra: Option<Warnings>,
    pub warnings: Option<Warnings>,
    pub consumable_settings: Option<ConsumableSettings>,
    pub clock: Option<Clock>,
    pub oven_meat_probe_accessory: Option<OvenMeatProbe>,
    pub download_cycle_settings_model: Option<DownloadSettings>,
}

/// The cloud API wraps the configuration together with other appliance contents.
#[derive(serde::Deserialize)]
struct ApplianceContents {
    config: ApplianceConfiguration,
}

impl ApplianceConfiguration {
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let value = serde_json::from_str::<serde_json::Value>(text).map_err(Error::Json)?;
        Self::from_value(value)
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, Error> {
        let value = serde_json::from_reader::<_, serde_json::Value>(reader).map_err(Error::Json)?;
        Self::from_value(value)
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path).map_err(|e| Error::Open(e, path.to_path_buf()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Accepts either the bare configuration or the `{"config": ...}` document the cloud API
    /// returns.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        let wrapped = value.get("program").is_none() && value.get("config").is_some();
        if wrapped {
            let contents = serde_json::from_value::<ApplianceContents>(value).map_err(Error::Json)?;
            Ok(contents.config)
        } else {
            serde_json::from_value(value).map_err(Error::Json)
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub str_key: String,
    pub is_switch: Option<u8>,
    pub values: Vec<ProgramOption>,
    pub wifi_array_index: u16,
    pub wfa_write_index: Option<u16>,
    #[serde(default = "visible")]
    pub is_visible: u8,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramOption {
    pub str_key: String,
    pub wifi_array_value: u8,
    pub sub_program_overrides: Option<Vec<SubprogramOverride>>,
    pub custom_sub_program_overrides: Option<Vec<SubprogramOverride>>,
    pub progress_variable_overrides: Option<Vec<ProgressFeatureOverride>>,
    pub is_downloadable_cycle: Option<bool>,
    #[serde(default = "visible")]
    pub is_visible: u8,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubprogramOverride {
    pub allowed_value_indices: Option<Vec<u16>>,
    pub is_disabled: Option<u8>,
    pub str_key_ref: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFeatureOverride {
    pub hour: SubprogramOverride,
    pub minute: Option<SubprogramOverride>,
    pub str_key_ref: String,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumOption {
    pub str_key: String,
    pub wifi_array_value: u8,
}

/// A linear range of values, `lowerLimit..=upperLimit` by `step`.
///
/// The telegram carries `value / factor`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundedOption {
    pub factor: f64,
    pub lower_limit: f64,
    pub step: f64,
    #[serde(default)]
    pub str_key: String,
    pub unit: Option<String>,
    pub upper_limit: f64,
}

impl BoundedOption {
    /// Every value in the range, lowest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let span = self.upper_limit - self.lower_limit;
        let count = if self.step > 0.0 && span >= 0.0 {
            // Tolerate the rounding error of fractional steps such as `0.1`.
            (span / self.step + 1e-9).floor() as usize + 1
        } else if span >= 0.0 {
            1
        } else {
            0
        };
        (0..count).map(move |i| self.lower_limit + i as f64 * self.step)
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub bounded_values: Option<Vec<BoundedOption>>,
    pub enum_values: Option<Vec<EnumOption>>,
    pub is_switch: Option<u8>,
    pub str_key: Option<String>,
    pub wifi_array_index: u16,
    pub wfa_write_index: Option<u16>,
    #[serde(default = "visible")]
    pub is_visible: u8,
}

impl Feature {
    pub fn write_index(&self) -> u16 {
        self.wfa_write_index.unwrap_or(self.wifi_array_index)
    }

    /// The single linear range of a purely numeric feature.
    pub fn numeric_bounds(&self) -> Option<&BoundedOption> {
        match (&self.enum_values, self.bounded_values.as_deref()) {
            (None, Some([bounds])) => Some(bounds),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFeature {
    pub hour: Feature,
    pub minute: Option<Feature>,
    pub str_key: String,
    pub is_expandable_by_switch: Option<u8>,
    pub wfa_index: Option<u16>,
    pub wfa_write_index: Option<u16>,
    pub is_calculated_to_start: Option<u8>,
    #[serde(default = "visible")]
    pub is_visible: u8,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub auto_off: Option<ProgressFeature>,
    pub auto_on: Option<ProgressFeature>,
    pub delay: Option<ProgressFeature>,
    pub duration: Option<ProgressFeature>,
    pub elapsed: Option<ProgressFeature>,
    pub fermentedremaining: Option<ProgressFeature>,
    pub remaining: Option<ProgressFeature>,
    pub remaining_or_elapsed: Option<ProgressFeature>,
}

impl Progress {
    /// All progress variables in their canonical order, present or not.
    pub fn features(&self) -> [(&'static str, Option<&ProgressFeature>); 8] {
        [
            ("autoOff", self.auto_off.as_ref()),
            ("autoOn", self.auto_on.as_ref()),
            ("delay", self.delay.as_ref()),
            ("duration", self.duration.as_ref()),
            ("elapsed", self.elapsed.as_ref()),
            ("fermentedremaining", self.fermentedremaining.as_ref()),
            ("remaining", self.remaining.as_ref()),
            ("remainingOrElapsed", self.remaining_or_elapsed.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInfo {
    pub necessity: Option<String>,
    pub priority: Option<String>,
    pub str_key: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOption {
    pub str_key: String,
    pub wifi_array_value: u8,
    pub allowed_transitions: Option<Vec<String>>,
    pub notification_info: Option<NotificationInfo>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStates {
    pub states: Vec<StateOption>,
    pub wfa_index: Option<u16>,
    pub wifi_array_write_index: Option<u16>,
    pub wifi_array_read_index: Option<u16>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSubStates {
    pub sub_states: Vec<EnumOption>,
    pub wifi_array_read_index: u16,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteControl {
    pub wifi_array_read_index: u16,
    pub wifi_array_value: u8,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warnings {
    pub wifi_array_byte_count: Option<u8>,
    pub warnings: Vec<WarningOption>,
    pub wifi_array_read_index: u16,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningOption {
    pub bit_index: u8,
    pub notification_info: Option<NotificationInfo>,
    pub reason_info: Option<WarningReason>,
    pub str_key: String,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningReason {
    pub values: Vec<EnumOption>,
    pub wifi_array_read_index: u16,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableSettings {
    pub consumables: Vec<Consumable>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumable {
    pub consumable_type: String,
    pub forms: Vec<ConsumableForm>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableForm {
    pub auto_dosing_amount_setting: Option<Feature>,
    pub consumable_form: String,
    pub last_cycle_consumption_amount_data_array_read_index: Option<u16>,
    pub warning_setting: Option<ConsumableWarningSetting>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableWarningSetting {
    pub bit_index: u8,
    pub wifi_array_read_index: u16,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clock {
    pub hour_wifi_array_index: u16,
    pub minute_wifi_array_index: u16,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OvenMeatProbe {
    pub meat_probe_programs: Vec<String>,
    pub meat_probe_subprograms: Vec<Feature>,
    pub meat_probe_plug: MeatProbePlug,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeatProbePlug {
    pub wifi_array_read_index: u16,
    pub wifi_array_value: u8,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSettings {
    pub str_key: String,
    pub wifi_array_read_index: u16,
}
