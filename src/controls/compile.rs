use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::{ApplianceConfiguration, DeviceStates, Feature, ProgressFeature, Warnings};
use crate::controls::options::{OptionTable, normalize_name};
use crate::controls::{
    BitmaskControl, CalculatedTimestampControl, ClimateControl, CompareControl, Control,
    DebugControl, EnumControl, HvacControl, NumericControl, SwingAxisControl, SwingControl,
    TimeControl, WriteEnumControl, WriteNumericControl,
};

const STATE_KEY: &str = "state";
const SUB_STATE_KEY: &str = "sub_state";
const REMOTE_CONTROL_KEY: &str = "remote_control";
const CLIMATE_KEY: &str = "ac";
const HVAC_KEY: &str = "hvac";
const SWING_KEY: &str = "swing";

const AC_PROGRAM: &str = "air_conditioner_program";
const AC_ROOM_TEMPERATURE: &str = "air_conditioner_room_temperature";
const AC_TARGET_TEMPERATURE: &str = "air_conditioner_target_temperature";
const AC_WIND_STRENGTH: &str = "air_conditioner_wind_strength";
const AC_HORIZONTAL_VANE: &str = "air_conditioner_left_right_vane_control";
const AC_VERTICAL_VANE: &str = "air_conditioner_up_down_vane_control";

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("air conditioner configuration has no {key} control")]
    MissingClimateControl { key: &'static str },
    #[error("{key} is a {actual} control rather than a {expected} one")]
    UnexpectedControlKind { key: String, actual: &'static str, expected: &'static str },
    #[error("write offset {offset} of {key} does not fit in a command")]
    WriteOffsetTooLarge { key: String, offset: u16 },
}

/// Compile an appliance configuration into its controls.
///
/// The result is ordered the way the configuration declares things, except that the climate
/// control of an air conditioner, if any, comes last.
pub fn compile(config: &ApplianceConfiguration) -> Result<Vec<Control>, CompileError> {
    let mut controls = primitives(config)?;
    infer_booleans(&mut controls);
    deduplicate_keys(&mut controls);
    if let Some(progress) = &config.progress_variables {
        if let Some(delay) = &progress.delay {
            synthesize_timestamp(&mut controls, delay, progress.remaining.as_ref());
        }
    }
    if controls.iter().any(|c| c.key() == AC_PROGRAM) {
        extract_climate(&mut controls)?;
    }
    Ok(controls)
}

/// One raw-byte control per telegram offset.
pub fn compile_debug(len: usize) -> Vec<Control> {
    (0..len)
        .map(|read_offset| {
            Control::Debug(DebugControl { key: format!("byte_{read_offset}"), read_offset })
        })
        .collect()
}

fn write_offset(key: &str, offset: u16) -> Result<u8, CompileError> {
    u8::try_from(offset)
        .map_err(|_| CompileError::WriteOffsetTooLarge { key: key.to_string(), offset })
}

fn primitives(config: &ApplianceConfiguration) -> Result<Vec<Control>, CompileError> {
    let mut controls: Vec<Option<Control>> = Vec::new();
    if let Some(states) = &config.device_states {
        controls.push(state_control(states)?);
    }

    let program = &config.program;
    let key = normalize_name(&program.str_key);
    controls.push(Some(Control::WriteEnum(WriteEnumControl {
        read_offset: usize::from(program.wifi_array_index),
        write_offset: write_offset(
            &key,
            program.wfa_write_index.unwrap_or(program.wifi_array_index),
        )?,
        options: OptionTable::from_enum_options(
            program.values.iter().map(|o| (o.wifi_array_value, o.str_key.as_str())),
        ),
        key,
    })));

    if let Some(sub_states) = &config.device_sub_states {
        controls.push(Some(Control::Enum(EnumControl {
            key: SUB_STATE_KEY.to_string(),
            read_offset: usize::from(sub_states.wifi_array_read_index),
            options: OptionTable::from_enum_options(
                sub_states.sub_states.iter().map(|o| (o.wifi_array_value, o.str_key.as_str())),
            ),
        })));
    }

    for feature in &config.sub_programs {
        controls.push(write_control(feature)?);
    }
    for feature in config.custom_sub_programs.iter().flatten() {
        controls.push(write_control(feature)?);
    }
    for feature in config.monitorings.iter().flatten() {
        controls.push(read_control(feature));
    }
    if let Some(progress) = &config.progress_variables {
        for (_, feature) in progress.features() {
            controls.push(feature.map(|f| Control::Time(time_control(f))));
        }
    }
    if let Some(remote) = &config.remote_control {
        controls.push(Some(Control::BooleanCompare(CompareControl {
            key: REMOTE_CONTROL_KEY.to_string(),
            read_offset: usize::from(remote.wifi_array_read_index),
            expected: remote.wifi_array_value,
        })));
    }
    for warnings in [&config.device_warnings, &config.device_warnings_extra, &config.warnings] {
        controls.extend(warnings.iter().flat_map(warning_controls).map(Some));
    }
    for feature in config.settings.iter().flatten() {
        controls.push(write_control(feature)?);
    }

    Ok(controls.into_iter().flatten().collect())
}

fn state_control(states: &DeviceStates) -> Result<Option<Control>, CompileError> {
    let Some(read_offset) = states.wifi_array_read_index.or(states.wfa_index) else {
        debug!("device states have no read offset");
        return Ok(None);
    };
    let options = OptionTable::from_enum_options(
        states.states.iter().map(|o| (o.wifi_array_value, o.str_key.as_str())),
    );
    let read_offset = usize::from(read_offset);
    let key = STATE_KEY.to_string();
    Ok(Some(match states.wifi_array_write_index.or(states.wfa_index) {
        Some(offset) => Control::WriteEnum(WriteEnumControl {
            write_offset: write_offset(&key, offset)?,
            key,
            read_offset,
            options,
        }),
        None => Control::Enum(EnumControl { key, read_offset, options }),
    }))
}

fn read_control(feature: &Feature) -> Option<Control> {
    let Some(key) = feature.str_key.as_deref().map(normalize_name) else {
        debug!(offset = feature.wifi_array_index, "skipping feature without a key");
        return None;
    };
    let read_offset = usize::from(feature.wifi_array_index);
    Some(match feature.numeric_bounds() {
        Some(bounds) => {
            Control::Numeric(NumericControl { key, read_offset, bounds: bounds.clone() })
        }
        None => Control::Enum(EnumControl {
            options: OptionTable::from_feature(&key, feature),
            key,
            read_offset,
        }),
    })
}

fn write_control(feature: &Feature) -> Result<Option<Control>, CompileError> {
    let Some(key) = feature.str_key.as_deref().map(normalize_name) else {
        debug!(offset = feature.wifi_array_index, "skipping feature without a key");
        return Ok(None);
    };
    let read_offset = usize::from(feature.wifi_array_index);
    let write_offset = write_offset(&key, feature.write_index())?;
    Ok(Some(match feature.numeric_bounds() {
        Some(bounds) => Control::WriteNumeric(WriteNumericControl {
            key,
            read_offset,
            write_offset,
            bounds: bounds.clone(),
        }),
        None => Control::WriteEnum(WriteEnumControl {
            options: OptionTable::from_feature(&key, feature),
            key,
            read_offset,
            write_offset,
        }),
    }))
}

fn time_control(feature: &ProgressFeature) -> TimeControl {
    TimeControl {
        key: normalize_name(&feature.str_key),
        hour_offset: usize::from(feature.hour.wifi_array_index),
        minute_offset: feature.minute.as_ref().map(|m| usize::from(m.wifi_array_index)),
    }
}

fn warning_controls(warnings: &Warnings) -> impl Iterator<Item = Control> + '_ {
    warnings.warnings.iter().map(|warning| {
        Control::BooleanBitmask(BitmaskControl {
            key: normalize_name(&warning.str_key),
            read_offset: usize::from(warnings.wifi_array_read_index),
            bit_index: warning.bit_index,
        })
    })
}

fn infer_booleans(controls: &mut [Control]) {
    for control in controls {
        let Control::WriteEnum(enumeration) = control else { continue };
        if let Some(boolean) = enumeration.as_boolean() {
            debug!(key = %boolean.key, on = boolean.on, off = boolean.off, "treating as a switch");
            *control = Control::WriteBoolean(boolean);
        }
    }
}

fn deduplicate_keys(controls: &mut [Control]) {
    let mut seen = BTreeSet::new();
    for control in controls {
        if seen.insert(control.key().to_string()) {
            continue;
        }
        let original = control.key().to_string();
        let renamed = (1..)
            .map(|n| format!("{original}#{n}"))
            .find(|candidate| !seen.contains(candidate))
            .unwrap_or_default();
        warn!(key = %original, %renamed, "configuration declares the same key more than once");
        seen.insert(renamed.clone());
        *control.key_mut() = renamed;
    }
}

fn position_of_time(controls: &[Control], time: &TimeControl) -> Option<usize> {
    controls.iter().position(|c| {
        matches!(c, Control::Time(t)
            if t.hour_offset == time.hour_offset && t.minute_offset == time.minute_offset)
    })
}

/// Replace the delay countdown with the instant it ends at.
///
/// Unless the delay counts down to the program start, the instant is the program end and the
/// remaining program time is added as well.
fn synthesize_timestamp(
    controls: &mut [Control],
    delay: &ProgressFeature,
    remaining: Option<&ProgressFeature>,
) {
    let to_start = delay.is_calculated_to_start == Some(1);
    let delay = time_control(delay);
    let Some(position) = position_of_time(controls, &delay) else { return };
    let key = controls[position].key().to_string();
    let mut sources = vec![TimeControl { key: key.clone(), ..delay }];
    let mut subscribers = Vec::new();
    if let Some(remaining) = remaining.filter(|_| !to_start).map(time_control) {
        match position_of_time(controls, &remaining).filter(|&index| index != position) {
            Some(index) => {
                let remaining_key = controls[index].key().to_string();
                subscribers.push(remaining_key.clone());
                sources.push(TimeControl { key: remaining_key, ..remaining });
            }
            None => sources.push(remaining),
        }
    }
    debug!(key = %key, sources = sources.len(), to_start, "synthesized countdown timestamp");
    controls[position] =
        Control::CalculatedTimestamp(CalculatedTimestampControl::new(key, sources, subscribers));
}

fn take_optional(controls: &mut Vec<Control>, key: &str) -> Option<Control> {
    let position = controls.iter().position(|c| c.key() == key)?;
    Some(controls.remove(position))
}

fn take(controls: &mut Vec<Control>, key: &'static str) -> Result<Control, CompileError> {
    take_optional(controls, key).ok_or(CompileError::MissingClimateControl { key })
}

fn unexpected(control: &Control, expected: &'static str) -> CompileError {
    CompileError::UnexpectedControlKind {
        key: control.key().to_string(),
        actual: control.kind(),
        expected,
    }
}

fn swing_axis(control: Option<Control>) -> Result<Option<SwingAxisControl>, CompileError> {
    match control {
        None => Ok(None),
        Some(Control::WriteBoolean(c)) => Ok(Some(SwingAxisControl::Boolean(c))),
        Some(Control::WriteEnum(c)) => Ok(Some(SwingAxisControl::Enum(c))),
        Some(other) => Err(unexpected(&other, "write_boolean or write_enum")),
    }
}

/// Fold the air conditioner primitives into one climate control appended at the end.
fn extract_climate(controls: &mut Vec<Control>) -> Result<(), CompileError> {
    let power = match take(controls, STATE_KEY)? {
        Control::WriteBoolean(c) => c,
        other => return Err(unexpected(&other, "write_boolean")),
    };
    let program = match take(controls, AC_PROGRAM)? {
        Control::WriteEnum(c) => c,
        other => return Err(unexpected(&other, "write_enum")),
    };
    let current_temperature = match take(controls, AC_ROOM_TEMPERATURE)? {
        Control::Numeric(c) => c,
        Control::WriteNumeric(c) => c.as_read_only(),
        other => return Err(unexpected(&other, "numeric")),
    };
    let target_temperature = match take(controls, AC_TARGET_TEMPERATURE)? {
        Control::WriteNumeric(c) => c,
        other => return Err(unexpected(&other, "write_numeric")),
    };
    let fan_mode = match take(controls, AC_WIND_STRENGTH)? {
        Control::WriteEnum(c) => c,
        other => return Err(unexpected(&other, "write_enum")),
    };
    let horizontal = swing_axis(take_optional(controls, AC_HORIZONTAL_VANE))?;
    let vertical = swing_axis(take_optional(controls, AC_VERTICAL_VANE))?;
    debug!(
        horizontal = horizontal.is_some(),
        vertical = vertical.is_some(),
        "extracted climate control"
    );
    controls.push(Control::Climate(ClimateControl {
        key: CLIMATE_KEY.to_string(),
        hvac: HvacControl::new(HVAC_KEY.to_string(), power, program),
        target_temperature,
        current_temperature,
        fan_mode,
        swing: SwingControl { key: SWING_KEY.to_string(), horizontal, vertical },
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::Telegram;

    fn config(json: &str) -> ApplianceConfiguration {
        ApplianceConfiguration::from_json(json).unwrap()
    }

    const DISHWASHER: &str = r#"{
        "program": {
            "strKey": "DISHWASHER_PROGRAM",
            "wifiArrayIndex": 10,
            "wfaWriteIndex": 11,
            "values": [
                {"strKey": "PROGRAM_ECO", "wifiArrayValue": 1},
                {"strKey": "PROGRAM_INTENSIVE", "wifiArrayValue": 2}
            ]
        },
        "subPrograms": [
            {
                "strKey": "DISHWASHER_HALF_LOAD",
                "wifiArrayIndex": 12,
                "enumValues": [
                    {"strKey": "HALF_LOAD_ON", "wifiArrayValue": 1},
                    {"strKey": "HALF_LOAD_OFF", "wifiArrayValue": 0}
                ]
            },
            {"wifiArrayIndex": 13, "enumValues": []},
            {
                "strKey": "DISHWASHER_DRYING",
                "wifiArrayIndex": 14,
                "boundedValues": [
                    {"factor": 1, "lowerLimit": 0, "upperLimit": 3, "step": 1}
                ]
            }
        ],
        "settings": [
            {
                "strKey": "DISHWASHER_HALF_LOAD",
                "wifiArrayIndex": 30,
                "enumValues": [{"strKey": "A", "wifiArrayValue": 0}]
            }
        ],
        "deviceStates": {
            "wfaIndex": 5,
            "states": [
                {"strKey": "DEVICE_STATE_ON", "wifiArrayValue": 10},
                {"strKey": "DEVICE_STATE_OFF", "wifiArrayValue": 20},
                {"strKey": "DEVICE_STATE_RUNNING", "wifiArrayValue": 30}
            ]
        },
        "deviceSubStates": {
            "wifiArrayReadIndex": 6,
            "subStates": [{"strKey": "DRYING", "wifiArrayValue": 3}]
        },
        "monitorings": [
            {
                "strKey": "WATER_HARDNESS",
                "wifiArrayIndex": 15,
                "enumValues": [{"strKey": "SOFT", "wifiArrayValue": 1}]
            }
        ],
        "progressVariables": {
            "remaining": {
                "strKey": "REMAINING",
                "hour": {"wifiArrayIndex": 18},
                "minute": {"wifiArrayIndex": 19}
            },
            "delay": {
                "strKey": "DELAY",
                "hour": {"wifiArrayIndex": 20},
                "minute": {"wifiArrayIndex": 21}
            },
            "duration": {
                "strKey": "DURATION",
                "hour": {"wifiArrayIndex": 16},
                "minute": {"wifiArrayIndex": 17}
            }
        },
        "remoteControl": {"wifiArrayReadIndex": 7, "wifiArrayValue": 1},
        "deviceWarnings": {
            "wifiArrayReadIndex": 22,
            "warnings": [
                {"strKey": "WARNING_SALT", "bitIndex": 0},
                {"strKey": "WARNING_RINSE_AID", "bitIndex": 1}
            ]
        }
    }"#;

    fn keys(controls: &[Control]) -> Vec<&str> {
        controls.iter().map(Control::key).collect()
    }

    #[test]
    fn primitives_follow_the_configuration_order() {
        let controls = compile(&config(DISHWASHER)).unwrap();
        assert_eq!(
            keys(&controls),
            [
                "state",
                "dishwasher_program",
                "sub_state",
                "dishwasher_half_load",
                "dishwasher_drying",
                "water_hardness",
                "delay",
                "duration",
                "remaining",
                "remote_control",
                "warning_salt",
                "warning_rinse_aid",
                "dishwasher_half_load#1",
            ]
        );
        assert_eq!(
            controls.iter().map(Control::kind).collect::<Vec<_>>(),
            [
                "write_enum",
                "write_enum",
                "enum",
                "write_boolean",
                "write_numeric",
                "enum",
                "calculated_timestamp",
                "time",
                "time",
                "boolean_compare",
                "boolean_bitmask",
                "boolean_bitmask",
                "write_enum",
            ]
        );
    }

    #[test]
    fn offsets_come_from_the_configuration() {
        let controls = compile(&config(DISHWASHER)).unwrap();
        let Control::WriteEnum(program) = &controls[1] else { panic!("{:?}", controls[1]) };
        assert_eq!((program.read_offset, program.write_offset), (10, 11));
        let Control::WriteEnum(state) = &controls[0] else { panic!("{:?}", controls[0]) };
        assert_eq!((state.read_offset, state.write_offset), (5, 5));
        let Control::WriteBoolean(half_load) = &controls[3] else { panic!("{:?}", controls[3]) };
        assert_eq!((half_load.on, half_load.off), (1, 0));
        assert_eq!(controls[11].read_offsets(), [22]);
    }

    #[test]
    fn delay_becomes_the_program_end() {
        let controls = compile(&config(DISHWASHER)).unwrap();
        let Control::CalculatedTimestamp(delay) = &controls[6] else { panic!("{:?}", controls[6]) };
        assert_eq!(delay.subscribers, ["remaining"]);
        assert_eq!(
            delay.sources.iter().map(|s| (s.key.as_str(), s.hour_offset)).collect::<Vec<_>>(),
            [("delay", 20), ("remaining", 18)]
        );

        let mut telegram = vec![0u8; 24];
        telegram[18] = 1;
        telegram[21] = 30;
        let now: jiff::Timestamp = "2024-05-01T08:00:10Z".parse().unwrap();
        let at = delay.get_at(&Telegram::new(telegram), now).unwrap();
        assert_eq!(at, Some("2024-05-01T09:30:00Z".parse().unwrap()));
    }

    #[test]
    fn delay_to_start_ignores_the_remaining_time() {
        let json = DISHWASHER.replace(
            r#""strKey": "DELAY","#,
            r#""strKey": "DELAY", "isCalculatedToStart": 1,"#,
        );
        let controls = compile(&config(&json)).unwrap();
        let Control::CalculatedTimestamp(delay) = &controls[6] else { panic!("{:?}", controls[6]) };
        assert_eq!(delay.sources.len(), 1);
        assert!(delay.subscribers.is_empty());
    }

    #[test]
    fn states_without_write_offset_are_read_only() {
        let json = DISHWASHER.replace(r#""wfaIndex": 5,"#, r#""wifiArrayReadIndex": 5,"#);
        let controls = compile(&config(&json)).unwrap();
        assert!(matches!(&controls[0], Control::Enum(state) if state.read_offset == 5));

        let json = DISHWASHER.replace(r#""wfaIndex": 5,"#, "");
        let controls = compile(&config(&json)).unwrap();
        assert_eq!(controls[0].key(), "dishwasher_program");
    }

    #[test]
    fn write_offsets_must_fit_a_byte() {
        let json = DISHWASHER.replace(r#""wfaWriteIndex": 11"#, r#""wfaWriteIndex": 300"#);
        assert!(matches!(
            compile(&config(&json)),
            Err(CompileError::WriteOffsetTooLarge { offset: 300, .. })
        ));
    }

    #[test]
    fn air_conditioner_needs_all_climate_parts() {
        let json = r#"{
            "program": {
                "strKey": "AIR_CONDITIONER_PROGRAM",
                "wifiArrayIndex": 34,
                "values": [{"strKey": "AIR_CONDITIONER_MODE_COOLING", "wifiArrayValue": 1}]
            },
            "subPrograms": [],
            "deviceStates": {
                "wfaIndex": 43,
                "states": [
                    {"strKey": "DEVICE_STATE_ON", "wifiArrayValue": 10},
                    {"strKey": "DEVICE_STATE_OFF", "wifiArrayValue": 20}
                ]
            }
        }"#;
        assert!(matches!(
            compile(&config(json)),
            Err(CompileError::MissingClimateControl { key: AC_ROOM_TEMPERATURE })
        ));

        let json = json.replace("DEVICE_STATE_OFF", "DEVICE_STATE_STANDBY");
        assert!(matches!(
            compile(&config(&json)),
            Err(CompileError::UnexpectedControlKind { expected: "write_boolean", .. })
        ));
    }

    #[test]
    fn debug_controls_cover_every_byte() {
        let controls = compile_debug(3);
        assert_eq!(keys(&controls), ["byte_0", "byte_1", "byte_2"]);
        let value = controls[2].read(&Telegram::new(vec![0, 0, 0x8c])).unwrap();
        assert_eq!(value, crate::controls::Value::Raw(0x8c));
    }
}
